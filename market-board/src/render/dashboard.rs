//! The `index.html` dashboard.
//!
//! The page is a handlebars template. A built-in copy is compiled into the
//! binary; an `index.hbs` in the configured template directory replaces it.

use std::path::Path;

use board_common::util::round_to;
use board_common::{Error, Result};
use handlebars::{handlebars_helper, Handlebars};
use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::{ConceptReport, StocksByConcept};
use crate::data::{Candle, Quote};

const TEMPLATE_NAME: &str = "index";
const TEMPLATE_FILE: &str = "index.hbs";
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/index.hbs");

handlebars_helper!(fixed: |value: f64, dp: u64| format!("{:.*}", dp as usize, value));
handlebars_helper!(change_class: |value: f64| {
    if value > 0.0 {
        "text-red"
    } else if value < 0.0 {
        "text-green"
    } else {
        ""
    }
});
handlebars_helper!(len: |value: Json| value.as_array().map_or(0, |items| items.len()));
handlebars_helper!(signed: |value: f64| {
    if value > 0.0 {
        format!("+{value:.2}")
    } else {
        format!("{value:.2}")
    }
});

/// One session of the main stock's recent-trading table.
///
/// `change` is measured against the session's own open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSession {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub volume: f64,
    pub amount: f64,
}

impl From<&Candle> for RecentSession {
    fn from(c: &Candle) -> Self {
        let open = round_to(c.open, 2);
        let close = round_to(c.close, 2);
        let change = round_to(close - open, 2);
        let change_pct = if open != 0.0 {
            round_to(change / open * 100.0, 2)
        } else {
            0.0
        };
        Self {
            date: c.date.format("%Y-%m-%d").to_string(),
            open,
            high: round_to(c.high, 2),
            low: round_to(c.low, 2),
            close,
            change,
            change_pct,
            volume: c.volume.round(),
            amount: round_to(c.amount, 2),
        }
    }
}

/// A rendered basis chart section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasisChartView {
    pub key: String,
    pub name: String,
    pub html: String,
}

/// Template variables.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardContext {
    pub date: String,
    pub stock: Quote,
    pub indices: Vec<Quote>,
    pub basis_charts: Vec<BasisChartView>,
    /// Newest advisor chart, relative to the page
    pub strategy_chart: Option<String>,
    pub strategy_html: String,
    pub hot_concepts: Option<ConceptReport>,
    pub stocks_by_concept: Option<StocksByConcept>,
    pub recent_trading_data: Option<Vec<RecentSession>>,
    pub stock_kline_html: String,
}

/// Compiled dashboard template.
pub struct Dashboard {
    registry: Handlebars<'static>,
}

impl Dashboard {
    /// Use `<template_dir>/index.hbs` when present, the built-in template otherwise.
    pub fn new(template_dir: Option<&Path>) -> Result<Self> {
        let override_path = template_dir
            .map(|dir| dir.join(TEMPLATE_FILE))
            .filter(|path| path.is_file());

        let source = match &override_path {
            Some(path) => {
                info!(path = %path.display(), "Using dashboard template override");
                std::fs::read_to_string(path)?
            }
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Self::from_source(&source)
    }

    pub fn from_source(source: &str) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_helper("fixed", Box::new(fixed));
        registry.register_helper("change_class", Box::new(change_class));
        registry.register_helper("signed", Box::new(signed));
        registry.register_helper("len", Box::new(len));
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .map_err(|e| Error::Template(e.to_string()))?;
        Ok(Self { registry })
    }

    pub fn render(&self, context: &DashboardContext) -> Result<String> {
        let html = self
            .registry
            .render(TEMPLATE_NAME, context)
            .map_err(|e| Error::Template(e.to_string()))?;
        debug!(bytes = html.len(), "Rendered dashboard");
        Ok(html)
    }
}
