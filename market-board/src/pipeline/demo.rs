//! Offline demo: fabricated data through the real rendering path.
//!
//! Every series comes from a seeded generator, so two runs on the same day
//! produce identical files.

use std::f64::consts::PI;

use board_common::Config;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::advisor;
use super::snapshot::{self, SnapshotInputs};
use crate::analysis::{compute_basis, BasisRow, JoinedRow};
use crate::data::{Candle, Instrument, InstrumentKind, PricePoint, Quote};
use crate::render::{file_name, render_index_kline};
use crate::strategy::GradientRules;

pub const SEED: u64 = 42;

/// Sessions of fabricated advisor history; enough for the 240-day average.
const ADVISOR_SESSIONS: usize = 500;
const STOCK_SESSIONS: usize = 200;
const INDEX_SESSIONS: usize = 120;

/// Index prices shown by the demo, `(price, previous close)`.
fn mock_index_prices(code: &str) -> (f64, f64) {
    match code {
        "000001" => (3050.25, 3020.80),
        "399006" => (1850.75, 1880.30),
        "000688" => (950.30, 945.20),
        "000985" => (4750.80, 4720.50),
        "399001" => (9420.60, 9388.10),
        _ => (1000.0, 1000.0),
    }
}

/// Standard normal draw (Box-Muller).
pub fn normal(rng: &mut impl Rng, mean: f64, std: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    mean + std * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// The last `n` weekdays up to and including `end`, oldest first.
pub fn weekdays_until(end: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut day = end;
    while days.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day -= Duration::days(1);
    }
    days.reverse();
    days
}

/// Spot random walk around 3000 with a noisy futures premium.
pub fn mock_basis(rng: &mut StdRng, days: &[NaiveDate], config: &Config) -> Vec<BasisRow> {
    let mut spot_price = 3000.0;
    let mut spot = Vec::with_capacity(days.len());
    let mut future = Vec::with_capacity(days.len());
    for &date in days {
        spot_price += normal(rng, 0.0, 10.0);
        spot.push(PricePoint { date, close: spot_price });
        future.push(PricePoint {
            date,
            close: spot_price + normal(rng, 5.0, 15.0),
        });
    }
    compute_basis(&spot, &future, &config.snapshot.indicators)
}

/// Daily bars from a multiplicative random walk.
pub fn mock_candles(rng: &mut StdRng, days: &[NaiveDate], start_price: f64, volatility: f64) -> Vec<Candle> {
    let mut close = start_price;
    days.iter()
        .map(|&date| {
            let open = close * (1.0 + normal(rng, 0.0, volatility / 2.0));
            close = open * (1.0 + normal(rng, 0.0, volatility));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..volatility));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..volatility));
            let volume = rng.gen_range(2.0e5..8.0e5f64).round();
            Candle {
                date,
                open,
                high,
                low,
                close,
                volume,
                amount: volume * close * 100.0,
            }
        })
        .collect()
}

/// ETF cycling around a slow uptrend against a steadily drifting benchmark,
/// so the differential swings through both buy and sell zones.
pub fn mock_advisor_rows(rng: &mut StdRng, days: &[NaiveDate]) -> Vec<JoinedRow> {
    let mut bench = 4000.0;
    days.iter()
        .enumerate()
        .map(|(i, &date)| {
            let t = i as f64;
            bench *= 1.0 + normal(rng, 0.0002, 0.008);
            let cycle = 0.12 * (2.0 * PI * t / 160.0).sin();
            let etf = 1.0 * (1.0 + 0.0003 * t) * (1.0 + cycle) * (bench / 4000.0).powf(0.5);
            JoinedRow {
                date,
                left: etf,
                right: bench,
            }
        })
        .collect()
}

/// `market-board demo`.
pub fn run(config: &Config, today: NaiveDate) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(SEED);
    info!(dir = %config.output.base_dir().display(), seed = SEED, "Running offline demo");

    // Advisor first, so the snapshot embeds its fragment and chart.
    let rules = GradientRules::standard();
    let rows = mock_advisor_rows(&mut rng, &weekdays_until(today, ADVISOR_SESSIONS));
    let run = advisor::analyze(rows, &config.advisor, &rules);
    let chart = advisor::write_strategy_chart(&run, config, &rules);

    let index_days = weekdays_until(today, INDEX_SESSIONS);
    let mut indices = Vec::new();
    for index in &config.advisor.major_indices {
        let instrument = Instrument::from_config(index, InstrumentKind::Index);
        let (price, _) = mock_index_prices(&index.code);
        let candles = mock_candles(&mut rng, &index_days, price, 0.01);
        let path = config.output.path(format!("kline_{}.svg", index.code));
        render_index_kline(&path, &instrument, &candles, config.advisor.index_chart_days)?;
        indices.extend(advisor::index_summary(&instrument, &candles, Some(file_name(&path))));
    }

    let Some(report) =
        advisor::build_report(&run, &config.advisor, chart.as_deref().map(file_name), indices)
    else {
        anyhow::bail!("demo history is empty");
    };
    advisor::write_fragment(&report, config)?;
    info!(status = %report.signal.status, operation = %report.signal.operation, "Demo signal");

    let stock = Instrument::from_config(&config.snapshot.stock, InstrumentKind::Stock);
    let stock_candles = mock_candles(
        &mut rng,
        &weekdays_until(today, STOCK_SESSIONS),
        config.snapshot.default_stock_price,
        0.012,
    );

    let basis_days = weekdays_until(today, 300);
    let basis = config
        .snapshot
        .futures
        .iter()
        .map(|_| Some(mock_basis(&mut rng, &basis_days, config)))
        .collect();

    let inputs = SnapshotInputs {
        date: today,
        stock: Quote::from_prices(&stock, 23.56, 23.20),
        stock_candles,
        indices: config
            .snapshot
            .indices
            .iter()
            .map(|index| {
                let (price, prev) = mock_index_prices(&index.code);
                Quote::from_prices(&Instrument::from_config(index, InstrumentKind::Index), price, prev)
            })
            .collect(),
        basis,
    };
    let path = snapshot::publish(config, &inputs)?;
    info!(path = %path.display(), "Demo dashboard written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_weekdays_until_skips_weekends() {
        let sunday = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        let days = weekdays_until(sunday, 6);
        assert_eq!(days.len(), 6);
        assert_eq!(days[5], NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());
        assert!(days.iter().all(|d| d.weekday() != Weekday::Sat && d.weekday() != Weekday::Sun));
    }

    #[test]
    fn test_seeded_basis_is_repeatable() {
        let config = Config::default();
        let days = weekdays_until(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(), 50);
        let a = mock_basis(&mut StdRng::seed_from_u64(SEED), &days, &config);
        let b = mock_basis(&mut StdRng::seed_from_u64(SEED), &days, &config);
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_demo_writes_dashboard() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.dir = dir.path().to_string_lossy().into_owned();
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();

        run(&config, today).unwrap();

        let index = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(index.contains("长江电力"));
        assert!(index.contains("strategy-card"));
        assert!(dir.path().join("price.json").exists());
        assert!(dir.path().join("红利ETF_三种策略_梯度买卖_40天_240天_20240607.svg").exists());
        assert!(dir.path().join("kline_000001.svg").exists());
    }
}
