//! Series arithmetic over daily data.
//!
//! Derived columns are `Option<f64>`: `None` marks a row where the window is
//! not yet full or an input was missing, and it propagates through every
//! later computation that touches it.

pub mod basis;
pub mod concepts;

pub use basis::{breakout_segments, compute_basis, BasisRow, Breakout};
pub use concepts::{analyze_concepts, group_by_concept, ConceptReport, StocksByConcept};

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::data::PricePoint;

/// Mean of each trailing `window` values; `None` until the window is full
/// or while it holds a missing value.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Sample standard deviation (n - 1 denominator) of each trailing `window`.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }
    rolling(values, window, |w| {
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    })
}

fn rolling(
    values: &[Option<f64>],
    window: usize,
    f: impl Fn(&[f64]) -> f64,
) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    let mut buf = Vec::with_capacity(window);
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            buf.clear();
            for v in &values[i + 1 - window..=i] {
                buf.push((*v)?);
            }
            Some(f(&buf))
        })
        .collect()
}

/// `v[i] / v[i - n] - 1`; `None` for the first `n` rows or a zero base.
pub fn trailing_return(values: &[f64], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let base = *values.get(i.checked_sub(n)?)?;
            (base != 0.0).then(|| values[i] / base - 1.0)
        })
        .collect()
}

/// Difference of the two instruments' trailing `n`-day returns.
pub fn return_differential(left: &[f64], right: &[f64], n: usize) -> Vec<Option<f64>> {
    trailing_return(left, n)
        .into_iter()
        .zip(trailing_return(right, n))
        .map(|(l, r)| Some(l? - r?))
        .collect()
}

/// A date present in both inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRow {
    pub date: NaiveDate,
    pub left: f64,
    pub right: f64,
}

/// Inner join on date, sorted ascending; the first row wins for a repeated date.
pub fn inner_join(left: &[PricePoint], right: &[PricePoint]) -> Vec<JoinedRow> {
    let index = |points: &[PricePoint]| {
        let mut map = BTreeMap::new();
        for p in points {
            map.entry(p.date).or_insert(p.close);
        }
        map
    };
    let left = index(left);
    let right = index(right);

    left.into_iter()
        .filter_map(|(date, l)| {
            right.get(&date).map(|&r| JoinedRow {
                date,
                left: l,
                right: r,
            })
        })
        .collect()
}
