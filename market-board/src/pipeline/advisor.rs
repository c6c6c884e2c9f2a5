//! Dividend-ETF daily advisor.
//!
//! Joins the ETF and benchmark closes, tracks the trailing-return
//! differential, replays the three strategies over the whole history and
//! classifies the latest session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use board_common::config::AdvisorConfig;
use board_common::Config;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{error, info, warn};

use super::MarketSources;
use crate::analysis::{inner_join, return_differential, rolling_mean, JoinedRow};
use crate::data::{Adjust, Candle, Instrument, InstrumentKind, PricePoint, SourceError, TradingCalendar};
use crate::notification::{ChartImage, EmailNotifier, CHART_CID};
use crate::render::{
    email_body, file_name, render_index_kline, render_strategy_chart, save_text,
    strategy_fragment, AdvisorReport, IndexSummary, RecentRow,
};
use crate::strategy::{classify, simulate, DailyInput, GradientRules, Signal, Simulation, SimulationParams, TradeEvent};

/// Sessions echoed to the log after a run.
const LOGGED_ROWS: usize = 10;

/// The strategy replayed over one joined history.
#[derive(Debug, Clone)]
pub struct AdvisorRun {
    pub rows: Vec<JoinedRow>,
    pub diff: Vec<Option<f64>>,
    pub diff_ma: Vec<Option<f64>>,
    pub simulation: Simulation,
    pub signal: Signal,
}

impl AdvisorRun {
    pub fn latest(&self) -> Option<&JoinedRow> {
        self.rows.last()
    }

    pub fn latest_diff(&self) -> Option<f64> {
        self.diff.last().copied().flatten()
    }
}

fn etf(config: &AdvisorConfig) -> Instrument {
    Instrument::from_config(&config.etf, InstrumentKind::Etf)
}

fn benchmark(config: &AdvisorConfig) -> Instrument {
    Instrument::from_config(&config.benchmark, InstrumentKind::Index)
}

/// Forward-adjusted ETF closes joined with the benchmark closes.
pub async fn fetch_history(config: &AdvisorConfig, sources: &MarketSources) -> anyhow::Result<Vec<JoinedRow>> {
    let etf = etf(config);
    let benchmark = benchmark(config);

    let etf_candles = sources
        .stock_history
        .daily(&etf, Adjust::Forward)
        .await
        .with_context(|| format!("fetching {} history", etf.name))?;
    let bench_candles = sources
        .index_history
        .daily(&benchmark, Adjust::None)
        .await
        .with_context(|| format!("fetching {} history", benchmark.name))?;

    let etf_points: Vec<PricePoint> = etf_candles.iter().map(PricePoint::from).collect();
    let bench_points: Vec<PricePoint> = bench_candles.iter().map(PricePoint::from).collect();
    let rows = inner_join(&etf_points, &bench_points);
    info!(
        etf_rows = etf_points.len(),
        benchmark_rows = bench_points.len(),
        joined = rows.len(),
        "Merged advisor history"
    );
    if rows.is_empty() {
        anyhow::bail!("{} and {} share no trading dates", etf.name, benchmark.name);
    }
    Ok(rows)
}

/// Latest ETF price from sina and benchmark price through its eastmoney quote page.
pub async fn realtime_prices(config: &AdvisorConfig, sources: &MarketSources) -> Result<(f64, f64), SourceError> {
    let etf_price = sources.sina.fetch(&etf(config)).await?.price;
    let bench_price = sources.eastmoney.page_price(&benchmark(config)).await?;
    if etf_price <= 0.0 || bench_price <= 0.0 {
        return Err(SourceError::DataNotAvailable(format!(
            "realtime prices not positive: {etf_price} / {bench_price}"
        )));
    }
    Ok((etf_price, bench_price))
}

/// Append today's realtime row when the history stops before `today`.
pub async fn complete_today(
    rows: &mut Vec<JoinedRow>,
    config: &AdvisorConfig,
    sources: &MarketSources,
    today: NaiveDate,
) {
    let latest = rows.last().map(|r| r.date);
    info!(?latest, %today, "Checking history for today's session");
    if latest.map_or(false, |d| d >= today) {
        return;
    }

    match realtime_prices(config, sources).await {
        Ok((etf_price, bench_price)) => {
            rows.push(JoinedRow {
                date: today,
                left: etf_price,
                right: bench_price,
            });
            info!(etf = etf_price, benchmark = bench_price, "Appended realtime prices for today");
        }
        Err(e) => warn!(error = %e, "Realtime prices unavailable, today not appended"),
    }
}

/// Differential, its moving average, the simulation and today's signal.
pub fn analyze(rows: Vec<JoinedRow>, config: &AdvisorConfig, rules: &GradientRules) -> AdvisorRun {
    let etf_closes: Vec<f64> = rows.iter().map(|r| r.left).collect();
    let bench_closes: Vec<f64> = rows.iter().map(|r| r.right).collect();
    let diff = return_differential(&etf_closes, &bench_closes, config.return_window);
    let diff_ma = rolling_mean(&diff, config.ma_window);

    let inputs: Vec<DailyInput> = rows
        .iter()
        .zip(&diff)
        .map(|(row, diff)| DailyInput {
            date: row.date,
            close: row.left,
            diff: *diff,
        })
        .collect();
    let simulation = simulate(&inputs, rules, &SimulationParams::from(config));
    let signal = classify(
        diff.last().copied().flatten(),
        rules,
        config.daily_base_invest,
        config.return_window,
    );

    AdvisorRun {
        rows,
        diff,
        diff_ma,
        simulation,
        signal,
    }
}

/// `红利ETF_三种策略_梯度买卖_40天_240天_20240603.svg`
pub fn chart_file_name(config: &AdvisorConfig, date: NaiveDate) -> String {
    format!(
        "{}_三种策略_梯度买卖_{}天_{}天_{}.svg",
        config.etf.name,
        config.return_window,
        config.ma_window,
        date.format("%Y%m%d")
    )
}

fn log_run(run: &AdvisorRun, config: &AdvisorConfig) {
    let Some(latest) = run.latest() else {
        return;
    };
    let window = config.return_window;
    let n = run.rows.len();
    let trailing = |i: usize, f: fn(&JoinedRow) -> f64| {
        let base = f(run.rows.get(i.checked_sub(window)?)?);
        (base != 0.0).then(|| (f(&run.rows[i]) / base - 1.0) * 100.0)
    };

    info!(
        date = %latest.date,
        etf_close = %format!("{:.3}", latest.left),
        benchmark_close = %format!("{:.3}", latest.right),
        etf_return_pct = ?trailing(n - 1, |r| r.left),
        benchmark_return_pct = ?trailing(n - 1, |r| r.right),
        diff_pct = ?run.latest_diff().map(|d| d * 100.0),
        diff_ma_pct = ?run.diff_ma.last().copied().flatten().map(|d| d * 100.0),
        "{} signal ({}-day differential, {}-day MA)",
        config.etf.name,
        window,
        config.ma_window
    );
    info!(status = %run.signal.status, operation = %run.signal.operation, "Signal");

    let summary = &run.simulation.summary;
    info!(
        a_asset = %format!("{:.2}", summary.a_asset),
        a_return = %format!("{:.2}%", summary.a_return),
        b_asset = %format!("{:.2}", summary.b_asset),
        b_invested = %format!("{:.2}", summary.b_invested),
        b_return = %format!("{:.2}%", summary.b_return),
        c_asset = %format!("{:.2}", summary.c_asset),
        c_invested = %format!("{:.2}", summary.c_invested),
        c_return = %format!("{:.2}%", summary.c_return),
        c_base_shares = %format!("{:.2}", summary.c_base_shares),
        c_extra_shares = %format!("{:.2}", summary.c_extra_shares),
        c_cash = %format!("{:.2}", summary.c_cash),
        buy_hold_return = %format!("{:.2}%", summary.buy_hold_return),
        "Strategy summary"
    );

    let start = run.simulation.rows.len().saturating_sub(LOGGED_ROWS);
    for row in &run.simulation.rows[start..] {
        info!(
            date = %row.date,
            diff_pct = ?row.diff.map(|d| (d * 10_000.0).round() / 100.0),
            a_return = %format!("{:.2}", row.a_return),
            b_return = %format!("{:.2}", row.b_return),
            c_return = %format!("{:.2}", row.c_return),
            "Recent session"
        );
    }

    for event in &run.simulation.events {
        match event {
            TradeEvent::TimingBuy { date, diff, price } => {
                info!(%date, diff_pct = diff * 100.0, price, "A: bought with all cash");
            }
            TradeEvent::TimingSell { date, diff, price, total_return } => {
                info!(%date, diff_pct = diff * 100.0, price, total_return, "A: sold everything");
            }
            TradeEvent::GradientBuy { date, diff, threshold, amount, shares, extra_shares, extra_invested } => {
                info!(
                    %date,
                    diff_pct = diff * 100.0,
                    threshold_pct = threshold * 100.0,
                    amount,
                    shares,
                    extra_shares,
                    extra_invested,
                    "C: extra buy"
                );
            }
            TradeEvent::GradientSell { date, diff, threshold, sale } => {
                info!(
                    %date,
                    diff_pct = diff * 100.0,
                    threshold_pct = threshold * 100.0,
                    ratio = sale.ratio,
                    shares = sale.shares,
                    proceeds = sale.proceeds,
                    recovered = sale.recovered,
                    realized_return = sale.realized_return,
                    extra_shares_left = sale.extra_shares_left,
                    "C: sold part of extra position"
                );
            }
        }
    }
}

/// Kline charts and latest move for each major index; indices whose
/// history cannot be fetched are left out.
pub async fn index_summaries(config: &Config, sources: &MarketSources) -> Vec<IndexSummary> {
    let advisor = &config.advisor;
    let mut summaries = Vec::with_capacity(advisor.major_indices.len());

    for index in &advisor.major_indices {
        let instrument = Instrument::from_config(index, InstrumentKind::Index);
        let candles = match sources.index_history.daily(&instrument, Adjust::None).await {
            Ok(candles) if candles.len() >= 2 => candles,
            Ok(_) => {
                warn!(code = %index.code, "Not enough history for index chart");
                continue;
            }
            Err(e) => {
                warn!(code = %index.code, error = %e, "Index history unavailable");
                continue;
            }
        };
        let path = config.output.path(format!("kline_{}.svg", index.code));
        let chart = match render_index_kline(&path, &instrument, &candles, advisor.index_chart_days) {
            Ok(()) => Some(file_name(&path)),
            Err(e) => {
                warn!(code = %index.code, error = %e, "Index chart failed");
                None
            }
        };
        if let Some(summary) = index_summary(&instrument, &candles, chart) {
            summaries.push(summary);
        }
    }
    summaries
}

/// Last close and its change as a ratio of the previous close.
pub fn index_summary(
    instrument: &Instrument,
    candles: &[Candle],
    chart: Option<String>,
) -> Option<IndexSummary> {
    let [.., prev, last] = candles else {
        return None;
    };
    let change = if prev.close != 0.0 {
        last.close / prev.close - 1.0
    } else {
        0.0
    };
    Some(IndexSummary {
        name: instrument.name.clone(),
        code: instrument.code.clone(),
        close: last.close,
        change,
        chart,
    })
}

/// The fragment/email model for a finished run.
pub fn build_report(
    run: &AdvisorRun,
    config: &AdvisorConfig,
    chart_file: Option<String>,
    indices: Vec<IndexSummary>,
) -> Option<AdvisorReport> {
    let latest = run.latest()?;
    let start = run.rows.len().saturating_sub(config.recent_rows);
    let recent = run.rows[start..]
        .iter()
        .zip(&run.diff[start..])
        .map(|(row, diff)| RecentRow {
            date: row.date,
            etf_close: row.left,
            benchmark_close: row.right,
            diff: *diff,
        })
        .collect();

    Some(AdvisorReport {
        date: latest.date,
        etf_name: config.etf.name.clone(),
        benchmark_name: config.benchmark.name.clone(),
        return_window: config.return_window,
        diff: run.latest_diff(),
        etf_close: latest.left,
        benchmark_close: latest.right,
        signal: run.signal.clone(),
        chart_file,
        recent,
        indices,
    })
}

/// Render the strategy chart; `None` (logged) when it cannot be drawn.
pub fn write_strategy_chart(run: &AdvisorRun, config: &Config, rules: &GradientRules) -> Option<PathBuf> {
    let latest = run.latest()?;
    let path = config.output.path(chart_file_name(&config.advisor, latest.date));
    match render_strategy_chart(&path, &run.simulation.rows, &run.diff_ma, rules, &config.advisor) {
        Ok(()) => {
            info!(path = %path.display(), "Strategy chart written");
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "Strategy chart skipped");
            None
        }
    }
}

/// Write `strategy_fragment.html`.
pub fn write_fragment(report: &AdvisorReport, config: &Config) -> anyhow::Result<PathBuf> {
    let path = config.output.path(&config.output.strategy_fragment);
    save_text(&strategy_fragment(report), &path)?;
    info!(path = %path.display(), "Strategy fragment written");
    Ok(path)
}

async fn send_email(report: &AdvisorReport, chart: Option<&Path>, config: &Config, today: NaiveDate) -> anyhow::Result<()> {
    let notifier = EmailNotifier::new(config.email.clone());
    if !notifier.is_configured() {
        warn!("Email requested but sender, receivers or auth code are missing");
        return Ok(());
    }

    let chart = match chart {
        Some(path) => {
            let filename = format!(
                "{}策略图_{}.svg",
                config.advisor.etf.name,
                report.date.format("%Y-%m-%d")
            );
            match ChartImage::load(path, filename) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "Chart not attached");
                    None
                }
            }
        }
        None => None,
    };

    let subject = format!("{}策略建议_{}", config.advisor.etf.name, today.format("%Y%m%d"));
    let message = notifier.build_message(&subject, email_body(report, CHART_CID), chart.as_ref())?;
    notifier.send(message).await?;
    Ok(())
}

/// `market-board advise`.
pub async fn run(
    config: &Config,
    sources: &MarketSources,
    now: NaiveDateTime,
    force: bool,
    email: bool,
) -> anyhow::Result<()> {
    let today = now.date();
    if !force {
        let calendar = TradingCalendar::new(Arc::clone(&sources.index_history));
        if !calendar.is_trading_day(now).await {
            info!(%today, "Not a trading day, skipping");
            return Ok(());
        }
    }

    let advisor = &config.advisor;
    let rules = GradientRules::standard();

    let mut rows = fetch_history(advisor, sources).await?;
    complete_today(&mut rows, advisor, sources, today).await;

    let run = analyze(rows, advisor, &rules);
    log_run(&run, advisor);

    let chart = write_strategy_chart(&run, config, &rules);
    let indices = index_summaries(config, sources).await;

    let Some(report) = build_report(&run, advisor, chart.as_deref().map(file_name), indices) else {
        anyhow::bail!("no joined sessions to report");
    };
    write_fragment(&report, config)?;

    if config.email.enabled || email {
        if let Err(e) = send_email(&report, chart.as_deref(), config, today).await {
            error!(error = %e, "Failed to send advice email");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SignalLevel;

    fn rows(n: usize, etf: impl Fn(usize) -> f64, bench: impl Fn(usize) -> f64) -> Vec<JoinedRow> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| JoinedRow {
                date: start + chrono::Duration::days(i as i64),
                left: etf(i),
                right: bench(i),
            })
            .collect()
    }

    #[test]
    fn test_chart_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(
            chart_file_name(&AdvisorConfig::default(), date),
            "红利ETF_三种策略_梯度买卖_40天_240天_20240603.svg"
        );
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let run = analyze(rows(30, |_| 1.0, |_| 4000.0), &AdvisorConfig::default(), &GradientRules::standard());
        assert_eq!(run.signal.level, SignalLevel::InsufficientData);
        assert!(run.diff.iter().all(Option::is_none));
        assert_eq!(run.simulation.rows.len(), 30);
    }

    #[test]
    fn test_underperforming_etf_is_green() {
        // ETF flat, benchmark up 5% over the window
        let run = analyze(
            rows(60, |_| 1.0, |i| 4000.0 * (1.0 + 0.05 * (i as f64 / 40.0))),
            &AdvisorConfig::default(),
            &GradientRules::standard(),
        );
        assert_eq!(run.signal.level, SignalLevel::Green);
        assert!(run.latest_diff().unwrap() < -0.01);
    }

    #[test]
    fn test_zero_close_keeps_simulation_aligned() {
        let run = analyze(
            rows(300, |i| if i == 5 { 0.0 } else { 1.0 + i as f64 / 1000.0 }, |_| 4000.0),
            &AdvisorConfig::default(),
            &GradientRules::standard(),
        );
        assert_eq!(run.simulation.rows.len(), run.rows.len());
        assert_eq!(run.diff_ma.len(), run.rows.len());
        for (sim, joined) in run.simulation.rows.iter().zip(&run.rows) {
            assert_eq!(sim.date, joined.date);
        }
    }

    #[test]
    fn test_report_keeps_recent_rows() {
        let config = AdvisorConfig::default();
        let run = analyze(rows(50, |i| 1.0 + i as f64 / 100.0, |_| 4000.0), &config, &GradientRules::standard());
        let report = build_report(&run, &config, None, Vec::new()).unwrap();
        assert_eq!(report.recent.len(), 20);
        assert_eq!(report.date, run.rows[49].date);
        assert_eq!(report.etf_close, run.rows[49].left);
        assert!(report.recent[0].diff.is_none());
        assert!(report.recent[19].diff.is_some());
    }

    #[test]
    fn test_index_summary_change_ratio() {
        let inst = Instrument::new("000001", "上证指数", InstrumentKind::Index);
        let candle = |close: f64| Candle {
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            amount: 0.0,
        };
        let summary = index_summary(&inst, &[candle(3000.0), candle(3030.0)], None).unwrap();
        assert!((summary.change - 0.01).abs() < 1e-12);
        assert!(index_summary(&inst, &[candle(3000.0)], None).is_none());
    }
}
