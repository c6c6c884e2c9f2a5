//! Baidu finance kline for spot indices and futures main contracts.
//!
//! The quotation endpoint returns a column list in `Result.newMarketData.keys`
//! and the rows packed into one string (`;` between rows, `,` between
//! columns) in `Result.newMarketData.marketData`.

use board_common::config::HttpConfig;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, warn};

use super::http::{build_client, get_json};
use super::source::SourceError;
use super::PricePoint;

const BAIDU_QUOTATION_URL: &str = "https://finance.pae.baidu.com/selfselect/getstockquotation";

#[derive(Debug, Deserialize)]
struct QuotationResponse {
    #[serde(rename = "Result")]
    result: Option<QuotationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotationResult {
    new_market_data: Option<NewMarketData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMarketData {
    keys: Vec<String>,
    market_data: String,
}

/// Baidu quotation client.
pub struct BaiduClient {
    client: reqwest::Client,
    url: String,
    referer: String,
}

impl BaiduClient {
    pub fn new(http: &HttpConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(http)?,
            url: BAIDU_QUOTATION_URL.into(),
            referer: http.referer.clone(),
        })
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Daily closes for a spot index (`is_futures = false`) or a futures
    /// main contract such as `IF888`.
    pub async fn kline(&self, code: &str, is_futures: bool) -> Result<Vec<PricePoint>, SourceError> {
        let is_index = if is_futures { "False" } else { "True" };
        let is_futures_flag = if is_futures { "true" } else { "false" };

        debug!(code, is_futures, "Fetching kline from baidu");

        let request = self
            .client
            .get(&self.url)
            .header("Referer", self.referer.as_str())
            .query(&[
                ("all", "1"),
                ("code", code),
                ("isIndex", is_index),
                ("isBk", "false"),
                ("isBlock", "false"),
                ("isFutures", is_futures_flag),
                ("isStock", "false"),
                ("newFormat", "1"),
                ("ktype", "1"),
                ("market_type", "ab"),
                ("group", "quotation_futures_kline"),
                ("finClientType", "pc"),
            ]);
        let resp: QuotationResponse = get_json(request).await?;

        let data = resp
            .result
            .and_then(|r| r.new_market_data)
            .ok_or_else(|| SourceError::DataNotAvailable(format!("baidu has no kline for {code}")))?;
        parse_market_data(&data.keys, &data.market_data)
    }
}

/// Keep the time and close columns of the packed rows.
///
/// Rows with an unparseable close are dropped, matching a numeric coercion
/// that turns them into missing values.
fn parse_market_data(keys: &[String], raw: &str) -> Result<Vec<PricePoint>, SourceError> {
    let col = |name: &str| {
        keys.iter()
            .position(|k| k == name)
            .ok_or_else(|| SourceError::Parse(format!("baidu kline has no '{name}' column")))
    };
    let time_idx = col("time")?;
    let close_idx = col("close")?;

    let mut points = Vec::new();
    for line in raw.split(';').filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split(',').collect();
        let (Some(time), Some(close)) = (fields.get(time_idx), fields.get(close_idx)) else {
            warn!(line, "Short baidu kline row, skipping");
            continue;
        };
        let Some(date) = parse_time(time) else {
            warn!(time, "Unrecognised baidu time, skipping");
            continue;
        };
        if let Ok(close) = close.trim().parse::<f64>() {
            points.push(PricePoint { date, close });
        }
    }
    Ok(points)
}

/// Accepts `2024-01-02`, `2024-01-02 15:00:00`, `20240102` and unix seconds.
fn parse_time(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(day) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            return Some(date);
        }
    }
    if raw.len() == 8 {
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y%m%d") {
            return Some(date);
        }
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs + 8 * 3600, 0))
        .map(|dt| dt.date_naive())
}
