//! Hot-stock scraper and concept analyzer.
//!
//! Every ranking is dumped twice (raw response and parsed rows) into the
//! hot-data directory; the analyzer and the snippet writer only read those
//! files back, so either can be rerun without touching the network.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use board_common::Config;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::{analyze_concepts, ConceptReport};
use crate::data::ths::{HotList, HotStock};
use crate::data::ThsClient;
use crate::render::{concepts_snippet, error_comment, save_json, save_text, stocks_snippet};

pub const ALL_STOCKS_FILE: &str = "all_hot_stocks.json";
pub const ANALYSIS_JSON: &str = "hot_concepts_analysis.json";
pub const ANALYSIS_MD: &str = "hot_concepts_analysis.md";
pub const CONCEPTS_SNIPPET: &str = "concepts_snippet.html";
pub const STOCKS_SNIPPET: &str = "stocks_snippet.html";

const NEW_STOCK_KEY: &str = "new_stock";

/// Rankings whose concepts feed the analysis.
pub const ANALYZED_LISTS: [HotList; 4] = [
    HotList::HourlyNormal,
    HotList::HourlySkyrocket,
    HotList::DailyValue,
    HotList::DailyTrend,
];

fn parsed_file(key: &str) -> String {
    format!("{key}_parsed.json")
}

/// Fetch every ranking and write the per-list dumps plus `all_hot_stocks.json`.
///
/// A ranking that fails is logged and left out; the combined file holds
/// whatever succeeded.
pub async fn scrape(ths: &ThsClient, dir: &Path) -> anyhow::Result<BTreeMap<String, Value>> {
    let mut results: BTreeMap<String, Value> = BTreeMap::new();

    for list in HotList::ALL {
        let key = list.key();
        match ths.hot_list(list).await {
            Ok((body, stocks)) => {
                save_json(&body, &dir.join(format!("{key}_response.json")))?;
                save_json(&stocks, &dir.join(parsed_file(key)))?;
                info!(list = key, stocks = stocks.len(), "Fetched hot list");
                results.insert(key.to_string(), serde_json::to_value(&stocks)?);
            }
            Err(e) => warn!(list = key, error = %e, "Failed to fetch hot list"),
        }
    }

    match ths.new_stocks().await {
        Ok((text, stocks)) => {
            save_text(&text, &dir.join(format!("{NEW_STOCK_KEY}_response.txt")))?;
            save_json(&stocks, &dir.join(parsed_file(NEW_STOCK_KEY)))?;
            info!(stocks = stocks.len(), "Fetched new-stock list");
            results.insert(NEW_STOCK_KEY.to_string(), serde_json::to_value(&stocks)?);
        }
        Err(e) => warn!(error = %e, "Failed to fetch new-stock list"),
    }

    save_json(&results, &dir.join(ALL_STOCKS_FILE))?;
    info!(lists = results.len(), "Saved combined hot lists");
    Ok(results)
}

fn load_stocks(path: &Path) -> anyhow::Result<Vec<HotStock>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Concept statistics over the analyzed rankings; writes the JSON and Markdown reports.
///
/// Missing or unreadable list files are skipped.
pub fn analyze(dir: &Path, top: usize, date: NaiveDate) -> anyhow::Result<ConceptReport> {
    let mut stocks = Vec::new();
    for list in ANALYZED_LISTS {
        let path = dir.join(parsed_file(list.key()));
        if !path.exists() {
            warn!(path = %path.display(), "Hot list file not found");
            continue;
        }
        match load_stocks(&path) {
            Ok(rows) => stocks.extend(rows),
            Err(e) => warn!(error = %e, "Skipping unreadable hot list"),
        }
    }

    let report = analyze_concepts(&stocks, top);
    info!(
        stocks = report.total_stocks,
        concepts = report.total_concepts,
        unique = report.unique_concepts,
        "Analyzed hot concepts"
    );
    for concept in report.hot_concepts.iter().take(20) {
        info!(rank = concept.rank, concept = %concept.concept, count = concept.count, "Hot concept");
    }

    save_json(&report, &dir.join(ANALYSIS_JSON))?;
    save_text(&report.to_markdown(date), &dir.join(ANALYSIS_MD))?;
    Ok(report)
}

/// Every row of `all_hot_stocks.json`, lists flattened in key order.
///
/// New-stock rows carry no concepts but still count as stocks.
pub fn load_all_stocks(dir: &Path) -> anyhow::Result<Vec<HotStock>> {
    let path = dir.join(ALL_STOCKS_FILE);
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let lists: BTreeMap<String, Value> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    let mut stocks = Vec::new();
    for (key, list) in lists {
        if !list.is_array() {
            continue;
        }
        let rows: Vec<HotStock> =
            serde_json::from_value(list).with_context(|| format!("reading list {key}"))?;
        stocks.extend(rows);
    }
    Ok(stocks)
}

/// The concept analysis saved by the last run, if any.
pub fn load_report(dir: &Path) -> anyhow::Result<ConceptReport> {
    let path = dir.join(ANALYSIS_JSON);
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Write the two dashboard snippets; a failed input leaves an HTML comment instead.
pub fn write_snippets(dir: &Path, config: &Config) -> anyhow::Result<()> {
    let concepts = match load_report(dir) {
        Ok(report) => concepts_snippet(&report, config.hot.snippet_concepts),
        Err(e) => {
            warn!(error = %e, "Concept snippet left empty");
            error_comment("concepts", &e)
        }
    };

    let stocks = match load_hot_list(dir, HotList::HourlyNormal) {
        Ok(rows) => stocks_snippet(&rows, config.hot.snippet_stocks),
        Err(e) => {
            warn!(error = %e, "Stock snippet left empty");
            error_comment("stocks", &e)
        }
    };

    save_text(&concepts, &dir.join(CONCEPTS_SNIPPET))?;
    save_text(&stocks, &dir.join(STOCKS_SNIPPET))?;
    Ok(())
}

/// One ranking out of `all_hot_stocks.json`.
fn load_hot_list(dir: &Path, list: HotList) -> anyhow::Result<Vec<HotStock>> {
    let path = dir.join(ALL_STOCKS_FILE);
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let mut lists: BTreeMap<String, Value> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    let rows = lists
        .remove(list.key())
        .with_context(|| format!("{} has no {} list", ALL_STOCKS_FILE, list.key()))?;
    Ok(serde_json::from_value(rows)?)
}

/// `market-board hot`: scrape, analyze, write snippets.
pub async fn run(config: &Config, ths: &ThsClient, today: NaiveDate) -> anyhow::Result<()> {
    let dir = config.output.hot_dir();
    info!(dir = %dir.display(), "Fetching 10jqka hot lists");

    scrape(ths, &dir).await?;
    analyze(&dir, config.hot.top_concepts, today)?;
    write_snippets(&dir, config)?;

    info!(
        files = %format!("{ALL_STOCKS_FILE}, {ANALYSIS_JSON}, {ANALYSIS_MD}, {CONCEPTS_SNIPPET}, {STOCKS_SNIPPET}"),
        "Hot list run complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, value: &Value) {
        std::fs::write(dir.join(name), serde_json::to_string(value).unwrap()).unwrap();
    }

    #[test]
    fn test_analyze_reads_only_analyzed_lists() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "hourly_normal_parsed.json",
            &json!([{"rank": 1, "name": "甲", "code": "000001", "concept": "人工智能 算力"}]),
        );
        write(
            dir.path(),
            "daily_tech_parsed.json",
            &json!([{"rank": 1, "name": "乙", "code": "000002", "concept": "人工智能"}]),
        );

        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let report = analyze(dir.path(), 30, date).unwrap();
        assert_eq!(report.total_stocks, 1);
        assert_eq!(report.total_concepts, 2);
        assert!(dir.path().join(ANALYSIS_JSON).exists());
        assert!(dir.path().join(ANALYSIS_MD).exists());
    }

    #[test]
    fn test_load_all_stocks_includes_new_stocks() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ALL_STOCKS_FILE,
            &json!({
                "hourly_normal": [{"rank": 1, "name": "甲", "code": "000001", "concept": "算力"}],
                "new_stock": [{"rank": 1, "name": "新股", "code": "301001", "pe": "30", "hot": "100", "market": "创业板"}]
            }),
        );
        let stocks = load_all_stocks(dir.path()).unwrap();
        assert_eq!(stocks.len(), 2);
        assert_eq!(stocks[1].name, "新股");
    }

    #[test]
    fn test_snippets_fall_back_to_comments() {
        let dir = TempDir::new().unwrap();
        write_snippets(dir.path(), &Config::default()).unwrap();

        let concepts = std::fs::read_to_string(dir.path().join(CONCEPTS_SNIPPET)).unwrap();
        let stocks = std::fs::read_to_string(dir.path().join(STOCKS_SNIPPET)).unwrap();
        assert!(concepts.starts_with("<!-- Error loading concepts"));
        assert!(stocks.starts_with("<!-- Error loading stocks"));
    }
}
