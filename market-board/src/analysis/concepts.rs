//! Concept-tag statistics over the hot-stock rankings.

use std::collections::HashMap;

use board_common::util::round_to;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::ths::HotStock;

/// Count occurrences, keeping first-seen order among equal counts.
fn tally<'a>(items: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in items {
        match index.get(item) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(item, counts.len());
                counts.push((item, 1));
            }
        }
    }
    // stable: ties keep insertion order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(c, n)| (c.to_string(), n))
        .collect()
}

fn share_pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(count as f64 / total as f64 * 100.0, 2)
    }
}

// ============================================================================
// Concept report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotConcept {
    pub rank: usize,
    pub concept: String,
    pub count: usize,
    /// Share of all analysed stocks, percent, 2 dp
    pub percentage: f64,
}

/// How many distinct concepts fall into each occurrence band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptDistribution {
    #[serde(rename = "1-5次")]
    pub one_to_five: usize,
    #[serde(rename = "6-10次")]
    pub six_to_ten: usize,
    #[serde(rename = "11-20次")]
    pub eleven_to_twenty: usize,
    #[serde(rename = "20次以上")]
    pub over_twenty: usize,
}

/// Content of `hot_concepts_analysis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptReport {
    pub total_stocks: usize,
    /// Tag occurrences, duplicates included
    pub total_concepts: usize,
    pub unique_concepts: usize,
    pub hot_concepts: Vec<HotConcept>,
    pub concept_distribution: ConceptDistribution,
}

/// Tally concept tags over all given stocks and keep the `top` most frequent.
pub fn analyze_concepts(stocks: &[HotStock], top: usize) -> ConceptReport {
    let total_stocks = stocks.len();
    let total_concepts = stocks.iter().map(|s| s.concepts().count()).sum();
    let counts = tally(stocks.iter().flat_map(HotStock::concepts));

    let mut distribution = ConceptDistribution::default();
    for (_, n) in &counts {
        match *n {
            1..=5 => distribution.one_to_five += 1,
            6..=10 => distribution.six_to_ten += 1,
            11..=20 => distribution.eleven_to_twenty += 1,
            _ => distribution.over_twenty += 1,
        }
    }

    let hot_concepts = counts
        .iter()
        .take(top)
        .enumerate()
        .map(|(i, (concept, count))| HotConcept {
            rank: i + 1,
            concept: concept.clone(),
            count: *count,
            percentage: share_pct(*count, total_stocks),
        })
        .collect();

    ConceptReport {
        total_stocks,
        total_concepts,
        unique_concepts: counts.len(),
        hot_concepts,
        concept_distribution: distribution,
    }
}

impl ConceptReport {
    /// Markdown rendition of the report.
    pub fn to_markdown(&self, date: NaiveDate) -> String {
        let d = &self.concept_distribution;
        let mut md = format!(
            "# 同花顺热榜热点概念分析报告\n\n\
             ## 分析时间\n{}\n\n\
             ## 数据概况\n\
             - **总股票数量**: {}\n\
             - **总概念数量**: {}\n\
             - **不同概念数量**: {}\n\n\
             ## 概念分布\n\
             - **1-5次**: {}个概念\n\
             - **6-10次**: {}个概念\n\
             - **11-20次**: {}个概念\n\
             - **20次以上**: {}个概念\n\n\
             ## 热点概念Top {}\n\n\
             | 排名 | 概念 | 出现次数 | 占比 |\n\
             |------|------|---------|------|\n",
            date.format("%Y年%-m月%-d日"),
            self.total_stocks,
            self.total_concepts,
            self.unique_concepts,
            d.one_to_five,
            d.six_to_ten,
            d.eleven_to_twenty,
            d.over_twenty,
            self.hot_concepts.len(),
        );

        for c in &self.hot_concepts {
            md.push_str(&format!(
                "| {} | {} | {} | {}% |\n",
                c.rank, c.concept, c.count, c.percentage
            ));
        }

        md.push_str("\n## 热门概念分析\n\n");
        if !self.hot_concepts.is_empty() {
            md.push_str("### 最热门的5个概念\n\n");
            for c in self.hot_concepts.iter().take(5) {
                md.push_str(&format!(
                    "{}. **{}**: {}次出现，占比{}%\n",
                    c.rank, c.concept, c.count, c.percentage
                ));
            }
        }

        md.push_str("\n### 投资建议\n\n");
        md.push_str("- 关注热点概念的持续性和基本面支撑\n");
        md.push_str("- 避免盲目追高，注意风险控制\n");
        md.push_str("- 关注概念叠加效应，寻找多概念共振的标的\n");
        md
    }
}

// ============================================================================
// Stocks grouped by concept
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptGroup {
    pub concept: String,
    pub stocks: Vec<HotStock>,
}

/// Dashboard view: every concept with its unique stocks, largest group first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StocksByConcept {
    pub total_stocks: usize,
    pub total_concepts: usize,
    pub sorted_concepts: Vec<ConceptGroup>,
}

/// Group stocks under each of their concepts, de-duplicated by code.
pub fn group_by_concept(stocks: &[HotStock]) -> StocksByConcept {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ConceptGroup> = Vec::new();

    for stock in stocks {
        for concept in stock.concepts() {
            let i = *index.entry(concept).or_insert_with(|| {
                groups.push(ConceptGroup {
                    concept: concept.to_string(),
                    stocks: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[i];
            if !group.stocks.iter().any(|s| s.code == stock.code) {
                group.stocks.push(stock.clone());
            }
        }
    }

    groups.sort_by(|a, b| b.stocks.len().cmp(&a.stocks.len()));

    StocksByConcept {
        total_stocks: stocks.len(),
        total_concepts: groups.len(),
        sorted_concepts: groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(code: &str, concept: &str) -> HotStock {
        HotStock {
            code: code.to_string(),
            name: format!("股票{code}"),
            concept: concept.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_analyze_counts_and_ranks() {
        let stocks = vec![
            stock("1", "机器人 AI"),
            stock("2", "AI 芯片"),
            stock("3", "AI  机器人"),
            stock("4", ""),
        ];
        let report = analyze_concepts(&stocks, 30);

        assert_eq!(report.total_stocks, 4);
        assert_eq!(report.total_concepts, 6);
        assert_eq!(report.unique_concepts, 3);
        assert_eq!(report.hot_concepts[0].concept, "AI");
        assert_eq!(report.hot_concepts[0].count, 3);
        assert_eq!(report.hot_concepts[0].percentage, 75.0);
        // 机器人 (2) ahead of 芯片 (1)
        assert_eq!(report.hot_concepts[1].concept, "机器人");
        assert_eq!(report.concept_distribution.one_to_five, 3);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let stocks = vec![stock("1", "乙 甲"), stock("2", "甲 乙")];
        let report = analyze_concepts(&stocks, 1);
        assert_eq!(report.hot_concepts.len(), 1);
        assert_eq!(report.hot_concepts[0].concept, "乙");
    }

    #[test]
    fn test_distribution_bands() {
        let stocks: Vec<_> = (0..21).map(|i| stock(&i.to_string(), "热")).collect();
        let report = analyze_concepts(&stocks, 30);
        assert_eq!(report.concept_distribution.over_twenty, 1);
        assert_eq!(report.concept_distribution.one_to_five, 0);
    }

    #[test]
    fn test_empty_input() {
        let report = analyze_concepts(&[], 30);
        assert_eq!(report.total_stocks, 0);
        assert!(report.hot_concepts.is_empty());
    }

    #[test]
    fn test_distribution_serializes_with_band_labels() {
        let json = serde_json::to_value(ConceptDistribution::default()).unwrap();
        assert!(json.get("1-5次").is_some());
        assert!(json.get("20次以上").is_some());
    }

    #[test]
    fn test_markdown_sections() {
        let report = analyze_concepts(&[stock("1", "AI"), stock("2", "AI")], 30);
        let date = NaiveDate::from_ymd_opt(2026, 1, 21).unwrap();
        let md = report.to_markdown(date);
        assert!(md.contains("2026年1月21日"));
        assert!(md.contains("| 1 | AI | 2 | 100% |"));
        assert!(md.contains("1. **AI**: 2次出现，占比100%"));
        assert!(md.contains("避免盲目追高"));
    }

    #[test]
    fn test_group_by_concept_dedups_by_code() {
        let stocks = vec![
            stock("1", "AI 芯片"),
            stock("1", "AI"),
            stock("2", "芯片"),
            stock("3", "芯片"),
        ];
        let grouped = group_by_concept(&stocks);
        assert_eq!(grouped.total_stocks, 4);
        assert_eq!(grouped.total_concepts, 2);
        assert_eq!(grouped.sorted_concepts[0].concept, "芯片");
        assert_eq!(grouped.sorted_concepts[0].stocks.len(), 3);
        assert_eq!(grouped.sorted_concepts[1].stocks.len(), 1);
    }
}
