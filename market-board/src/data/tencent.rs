//! Tencent `fqkline` daily history.
//!
//! Response shape: `{"code":0,"data":{"sh000985":{"day":[["2024-01-02","4000.1","4010.2","4020.0","3990.5","123456"],...]}}}`.
//! Rows are date, open, close, high, low, volume; adjusted stock series use
//! `qfqday` instead of `day`, and some rows carry a trailing dividend object.

use async_trait::async_trait;
use board_common::config::HttpConfig;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use super::http::{build_client, get_json, parse_f64};
use super::source::{Adjust, HistorySource, Source, SourceError};
use super::{Candle, Instrument};

const TENCENT_KLINE_URL: &str = "https://web.ifzq.gtimg.cn/appstock/app/fqkline/get";

/// Largest row count the endpoint serves in one call.
const MAX_ROWS: usize = 2000;

/// Tencent daily kline client.
pub struct TencentClient {
    client: reqwest::Client,
    url: String,
    priority: u8,
}

impl TencentClient {
    pub fn new(http: &HttpConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(http)?,
            url: TENCENT_KLINE_URL.into(),
            priority: 0,
        })
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Pull the candle rows for `symbol` out of a decoded response.
fn parse_rows(body: &Value, symbol: &str) -> Result<Vec<Candle>, SourceError> {
    let series = body
        .get("data")
        .and_then(|d| d.get(symbol))
        .ok_or_else(|| SourceError::DataNotAvailable(format!("tencent has no data for {symbol}")))?;

    let rows = series
        .get("qfqday")
        .or_else(|| series.get("day"))
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse(format!("tencent series for {symbol} has no day rows")))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let cols: Vec<&str> = row
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if cols.len() < 6 {
            continue;
        }
        let date = NaiveDate::parse_from_str(cols[0], "%Y-%m-%d")
            .map_err(|e| SourceError::Parse(format!("Failed to parse date '{}': {e}", cols[0])))?;
        candles.push(Candle {
            date,
            open: parse_f64(cols[1], "open")?,
            close: parse_f64(cols[2], "close")?,
            high: parse_f64(cols[3], "high")?,
            low: parse_f64(cols[4], "low")?,
            volume: parse_f64(cols[5], "volume")?,
            amount: 0.0,
        });
    }

    candles.sort_by_key(|c| c.date);
    Ok(candles)
}

impl Source for TencentClient {
    fn name(&self) -> &'static str {
        "tencent"
    }

    fn priority(&self) -> u8 {
        self.priority
    }
}

#[async_trait]
impl HistorySource for TencentClient {
    async fn daily(
        &self,
        instrument: &Instrument,
        adjust: Adjust,
    ) -> Result<Vec<Candle>, SourceError> {
        let symbol = instrument.prefixed_symbol();
        let fq = match adjust {
            Adjust::None => "",
            Adjust::Forward => "qfq",
        };
        let param = format!("{symbol},day,,,{MAX_ROWS},{fq}");

        debug!(symbol = %symbol, "Fetching kline from tencent");

        let body: Value = get_json(self.client.get(&self.url).query(&[("param", param)])).await?;
        if body.get("code").and_then(Value::as_i64).unwrap_or(0) != 0 {
            return Err(SourceError::Parse(format!(
                "tencent kline code={}",
                body["code"]
            )));
        }
        parse_rows(&body, &symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rows_accepts_day_and_dividend_columns() {
        let body = json!({
            "code": 0,
            "data": {"sh000985": {"day": [
                ["2024-01-03", "4010.0", "4025.5", "4030.0", "4001.0", "99999"],
                ["2024-01-02", "4000.1", "4010.2", "4020.0", "3990.5", "123456", {"nd": "2024"}],
                ["short"]
            ]}}
        });
        let candles = parse_rows(&body, "sh000985").unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(candles[1].close, 4025.5);
    }

    #[test]
    fn test_parse_rows_prefers_qfqday() {
        let body = json!({
            "data": {"sh600900": {
                "qfqday": [["2024-01-02", "20.0", "20.5", "20.6", "19.9", "100"]],
                "day": [["2024-01-02", "25.0", "25.5", "25.6", "24.9", "100"]]
            }}
        });
        let candles = parse_rows(&body, "sh600900").unwrap();
        assert_eq!(candles[0].close, 20.5);
    }

    #[test]
    fn test_missing_symbol_is_not_available() {
        let body = json!({"code": 0, "data": {}});
        let err = parse_rows(&body, "sz399001").unwrap_err();
        assert!(matches!(err, SourceError::DataNotAvailable(_)));
    }
}
