//! Futures basis with a moving average and Bollinger bands.

use board_common::config::IndicatorConfig;
use chrono::NaiveDate;
use serde::Serialize;
use std::ops::Range;

use super::{inner_join, rolling_mean, rolling_std};
use crate::data::PricePoint;

/// One session of the basis table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasisRow {
    pub date: NaiveDate,
    pub spot: f64,
    pub future: f64,
    /// future - spot
    pub basis: f64,
    pub ma: Option<f64>,
    pub mid: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

/// Join spot and futures closes on date and derive the indicator columns.
pub fn compute_basis(
    spot: &[PricePoint],
    future: &[PricePoint],
    indicators: &IndicatorConfig,
) -> Vec<BasisRow> {
    let joined = inner_join(future, spot);
    let basis: Vec<Option<f64>> = joined.iter().map(|r| Some(r.left - r.right)).collect();

    let ma = rolling_mean(&basis, indicators.ma_window);
    let mid = rolling_mean(&basis, indicators.bollinger_window);
    let std = rolling_std(&basis, indicators.bollinger_window);
    let k = indicators.std_multiplier;

    joined
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let band = mid[i].zip(std[i]);
            BasisRow {
                date: row.date,
                spot: row.right,
                future: row.left,
                basis: row.left - row.right,
                ma: ma[i],
                mid: mid[i],
                upper: band.map(|(m, s)| m + k * s),
                lower: band.map(|(m, s)| m - k * s),
            }
        })
        .collect()
}

/// Which band a breakout crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakout {
    Upper,
    Lower,
}

/// Maximal runs of consecutive rows whose basis sits outside the band.
pub fn breakout_segments(rows: &[BasisRow], side: Breakout) -> Vec<Range<usize>> {
    let outside = |row: &BasisRow| match side {
        Breakout::Upper => row.upper.map_or(false, |u| row.basis > u),
        Breakout::Lower => row.lower.map_or(false, |l| row.basis < l),
    };

    let mut segments = Vec::new();
    let mut start = None;
    for (i, row) in rows.iter().enumerate() {
        match (outside(row), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                segments.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        segments.push(s..rows.len());
    }
    segments
}
