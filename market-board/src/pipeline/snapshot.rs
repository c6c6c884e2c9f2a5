//! Market snapshot: quotes, basis charts and the `index.html` dashboard.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use board_common::config::{FuturesPairConfig, OutputConfig};
use board_common::Config;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::hot;
use super::MarketSources;
use crate::analysis::{compute_basis, group_by_concept, BasisRow};
use crate::data::{Adjust, Candle, Instrument, InstrumentKind, Quote, SourceError};
use crate::render::{
    basis_figure, candlestick_figure, file_name, latest_matching, read_or_empty, save_json,
    save_text, BasisChartView, Dashboard, DashboardContext, RecentSession,
};

/// Everything fetched for one snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotInputs {
    pub date: NaiveDate,
    pub stock: Quote,
    /// Main stock daily bars; empty when only the quote is known
    pub stock_candles: Vec<Candle>,
    pub indices: Vec<Quote>,
    /// One entry per configured futures pair, in config order
    pub basis: Vec<Option<Vec<BasisRow>>>,
}

fn stock_instrument(config: &Config) -> Instrument {
    Instrument::from_config(&config.snapshot.stock, InstrumentKind::Stock)
}

async fn fetch_basis(
    sources: &MarketSources,
    pair: &FuturesPairConfig,
    config: &Config,
) -> Result<Vec<BasisRow>, SourceError> {
    let future = sources.baidu.kline(&pair.future_code, true).await?;
    let spot = sources.baidu.kline(&pair.spot_code, false).await?;
    let rows = compute_basis(&spot, &future, &config.snapshot.indicators);
    if rows.is_empty() {
        return Err(SourceError::DataNotAvailable(format!(
            "{} spot and futures share no dates",
            pair.name
        )));
    }
    Ok(rows)
}

/// Fetch stage. Fails when the main stock or any index cannot be quoted.
pub async fn fetch(config: &Config, sources: &MarketSources, date: NaiveDate) -> anyhow::Result<SnapshotInputs> {
    let stock = stock_instrument(config);
    info!(code = %stock.code, name = %stock.name, "Fetching main stock");
    let stock_candles = sources
        .stock_history
        .daily(&stock, Adjust::None)
        .await
        .with_context(|| format!("核心股票数据获取失败: {}", stock.name))?;
    let quote = Quote::from_history(&stock, &stock_candles)
        .with_context(|| format!("核心股票数据获取失败: {}", stock.name))?;
    info!(price = quote.price, change_pct = quote.change_pct, "Main stock quoted");

    let mut indices = Vec::with_capacity(config.snapshot.indices.len());
    for index in &config.snapshot.indices {
        let instrument = Instrument::from_config(index, InstrumentKind::Index);
        let quote = sources
            .index_quotes
            .quote(&instrument)
            .await
            .with_context(|| format!("指数 {} 数据获取失败", index.name))?;
        debug!(code = %quote.symbol, price = quote.price, "Index quoted");
        indices.push(quote);
    }

    let mut basis = Vec::with_capacity(config.snapshot.futures.len());
    for pair in &config.snapshot.futures {
        info!(pair = %pair.name, "Fetching basis data");
        match fetch_basis(sources, pair, config).await {
            Ok(rows) => basis.push(Some(rows)),
            Err(e) => {
                warn!(pair = %pair.name, error = %e, "Basis data unavailable");
                basis.push(None);
            }
        }
    }

    Ok(SnapshotInputs {
        date,
        stock: quote,
        stock_candles,
        indices,
        basis,
    })
}

/// Write a fresh chart for the pair, or fall back to the embed file of an
/// earlier run. `None` when neither exists.
fn basis_chart(
    pair: &FuturesPairConfig,
    rows: Option<&[BasisRow]>,
    config: &Config,
) -> Option<String> {
    let path = config.output.path(&pair.chart_file);
    let snapshot = &config.snapshot;

    let fresh = rows
        .filter(|rows| rows.len() >= snapshot.indicators.bollinger_window)
        .and_then(|rows| {
            let figure = basis_figure(
                &pair.name,
                rows,
                snapshot.indicators.ma_window,
                snapshot.chart_width,
                snapshot.chart_height,
            );
            let html = figure
                .to_embed_html(&format!("{}-basis", pair.key))
                .and_then(|html| save_text(&html, &path).map(|()| html));
            match html {
                Ok(html) => {
                    info!(pair = %pair.name, path = %path.display(), "Basis chart written");
                    Some(html)
                }
                Err(e) => {
                    warn!(pair = %pair.name, error = %e, "Basis chart failed");
                    None
                }
            }
        });
    if fresh.is_some() {
        return fresh;
    }

    let previous = read_or_empty(&path);
    if previous.is_empty() {
        return None;
    }
    warn!(pair = %pair.name, path = %path.display(), "Reusing previous basis chart");
    Some(previous)
}

/// `price.json`: date, quotes and one `has_<key>_chart` flag per pair.
pub fn price_json(date: NaiveDate, stock: &Quote, indices: &[Quote], charts: &[BasisChartView]) -> Value {
    let mut map = Map::new();
    map.insert("date".into(), json!(date.format("%Y-%m-%d").to_string()));
    map.insert("stock".into(), json!(stock));
    map.insert("indices".into(), json!(indices));
    for chart in charts {
        map.insert(format!("has_{}_chart", chart.key), Value::Bool(true));
    }
    Value::Object(map)
}

fn stock_kline_html(instrument: &Instrument, candles: &[Candle], config: &Config) -> String {
    if candles.is_empty() {
        return String::new();
    }
    let start = candles.len().saturating_sub(config.snapshot.kline_days);
    let figure = candlestick_figure(
        instrument,
        &candles[start..],
        config.snapshot.chart_width,
        config.snapshot.chart_height,
    );
    figure.to_embed_html("stock-kline").unwrap_or_else(|e| {
        warn!(error = %e, "Stock kline chart failed");
        String::new()
    })
}

fn recent_sessions(candles: &[Candle], days: usize) -> Option<Vec<RecentSession>> {
    if candles.is_empty() {
        return None;
    }
    let start = candles.len().saturating_sub(days);
    Some(candles[start..].iter().map(RecentSession::from).collect())
}

fn strategy_chart(output: &OutputConfig) -> Option<String> {
    let chart = latest_matching(&output.base_dir(), &output.strategy_chart_glob);
    match &chart {
        Some(path) => debug!(path = %path.display(), "Latest strategy chart"),
        None => debug!(pattern = %output.strategy_chart_glob, "No strategy chart yet"),
    }
    chart.as_deref().map(file_name)
}

/// Render stage: basis embeds, `price.json` and `index.html`.
///
/// Fails when a futures pair ends up with no chart at all.
pub fn publish(config: &Config, inputs: &SnapshotInputs) -> anyhow::Result<PathBuf> {
    let output = &config.output;

    let mut basis_charts = Vec::with_capacity(config.snapshot.futures.len());
    for (i, pair) in config.snapshot.futures.iter().enumerate() {
        let rows = inputs.basis.get(i).and_then(Option::as_deref);
        let Some(html) = basis_chart(pair, rows, config) else {
            bail!("基差图表获取失败: {}", pair.name);
        };
        basis_charts.push(BasisChartView {
            key: pair.key.clone(),
            name: pair.name.clone(),
            html,
        });
    }

    let price = price_json(inputs.date, &inputs.stock, &inputs.indices, &basis_charts);
    save_json(&price, &output.path(&output.price_json))?;

    let hot_dir = output.hot_dir();
    let hot_concepts = load_optional("hot concepts", &hot_dir, hot::load_report);
    let stocks_by_concept =
        load_optional("hot stocks", &hot_dir, hot::load_all_stocks).map(|s| group_by_concept(&s));

    let stock = stock_instrument(config);
    let context = DashboardContext {
        date: inputs.date.format("%Y-%m-%d").to_string(),
        stock: inputs.stock.clone(),
        indices: inputs.indices.clone(),
        basis_charts,
        strategy_chart: strategy_chart(output),
        strategy_html: read_or_empty(&output.path(&output.strategy_fragment)),
        hot_concepts,
        stocks_by_concept,
        recent_trading_data: recent_sessions(&inputs.stock_candles, config.snapshot.recent_days),
        stock_kline_html: stock_kline_html(&stock, &inputs.stock_candles, config),
    };

    let template_dir = output.template_dir();
    let html = Dashboard::new(template_dir.as_deref())?.render(&context)?;
    let path = output.path(&output.index_html);
    save_text(&html, &path)?;
    Ok(path)
}

fn load_optional<T>(
    what: &str,
    dir: &Path,
    load: impl FnOnce(&Path) -> anyhow::Result<T>,
) -> Option<T> {
    match load(dir) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(what, error = %e, "Section omitted");
            None
        }
    }
}

/// `market-board snapshot`.
pub async fn run(config: &Config, sources: &MarketSources, date: NaiveDate) -> anyhow::Result<()> {
    info!("Updating market snapshot");
    let inputs = fetch(config, sources, date).await?;
    let path = publish(config, &inputs)?;
    info!(path = %path.display(), "Snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PricePoint;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.dir = dir.to_string_lossy().into_owned();
        config
    }

    fn quote(code: &str, price: f64, prev: f64) -> Quote {
        Quote::from_prices(&Instrument::new(code, code, InstrumentKind::Index), price, prev)
    }

    fn basis_rows(config: &Config, n: usize) -> Vec<BasisRow> {
        let day = |i: usize| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64);
        let spot: Vec<PricePoint> = (0..n).map(|i| PricePoint { date: day(i), close: 3000.0 + i as f64 }).collect();
        let future: Vec<PricePoint> = (0..n)
            .map(|i| PricePoint { date: day(i), close: 3005.0 + i as f64 + (i % 7) as f64 })
            .collect();
        compute_basis(&spot, &future, &config.snapshot.indicators)
    }

    fn inputs(basis: Vec<Option<Vec<BasisRow>>>) -> SnapshotInputs {
        SnapshotInputs {
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            stock: quote("600900", 26.8, 26.5),
            stock_candles: Vec::new(),
            indices: vec![quote("000001", 3050.25, 3020.80)],
            basis,
        }
    }

    #[test]
    fn test_publish_writes_price_json_flags() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let rows = basis_rows(&config, 80);
        let inputs = inputs(vec![Some(rows.clone()), Some(rows)]);

        let index = publish(&config, &inputs).unwrap();
        assert!(index.exists());

        let price: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("price.json")).unwrap()).unwrap();
        assert_eq!(price["date"], "2024-06-03");
        assert_eq!(price["has_hs300_chart"], true);
        assert_eq!(price["has_zz1000_chart"], true);
        assert_eq!(price["stock"]["price"], 26.8);
        assert!(dir.path().join("hs300_basis_embed.html").exists());
    }

    #[test]
    fn test_missing_pair_reuses_previous_embed() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        std::fs::write(dir.path().join("zz1000_basis_embed.html"), "<div>old</div>").unwrap();
        let inputs = inputs(vec![Some(basis_rows(&config, 80)), None]);

        publish(&config, &inputs).unwrap();
        let html = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(html.contains("<div>old</div>"));
    }

    #[test]
    fn test_pair_without_any_chart_aborts() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let inputs = inputs(vec![Some(basis_rows(&config, 80)), None]);

        let err = publish(&config, &inputs).unwrap_err();
        assert!(err.to_string().contains("中证1000"));
        assert!(!dir.path().join("index.html").exists());
    }

    #[test]
    fn test_recent_sessions_keep_last_days() {
        let candles: Vec<Candle> = (1..=25)
            .map(|d| Candle {
                date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume: 100.0,
                amount: 1000.0,
            })
            .collect();
        let sessions = recent_sessions(&candles, 20).unwrap();
        assert_eq!(sessions.len(), 20);
        assert_eq!(sessions[0].date, "2024-05-06");
        assert!(recent_sessions(&[], 20).is_none());
    }
}
