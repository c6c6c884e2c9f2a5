//! Eastmoney client: daily klines, realtime quotes and the index page secid.
//!
//! # Endpoints
//! - Daily K-line: `push2his.eastmoney.com/api/qt/stock/kline/get`
//! - Realtime quote: `push2.eastmoney.com/api/qt/stock/get`
//! - Index page: `quote.eastmoney.com/zs<code>.html` (embeds the secid)

use async_trait::async_trait;
use board_common::config::HttpConfig;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::http::{build_client, get_json, get_text, parse_f64};
use super::source::{Adjust, HistorySource, QuoteSource, Source, SourceError};
use super::{Candle, Instrument, Quote};

/// Token the public quote page sends with every push2 request.
const QUOTE_UT: &str = "fa5fd1943c7b386f172d6893dbfba10b";

/// Rows requested when the caller wants "all" history.
const FULL_HISTORY_LIMIT: usize = 5000;

// ============================================================================
// Endpoints
// ============================================================================

/// Base URLs, overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct EastmoneyEndpoints {
    pub kline: String,
    pub quote: String,
    pub page: String,
}

impl Default for EastmoneyEndpoints {
    fn default() -> Self {
        Self {
            kline: "https://push2his.eastmoney.com/api/qt/stock/kline/get".into(),
            quote: "https://push2.eastmoney.com/api/qt/stock/get".into(),
            page: "https://quote.eastmoney.com".into(),
        }
    }
}

impl EastmoneyEndpoints {
    /// All three endpoints on one host, using the production paths.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            kline: format!("{base}/api/qt/stock/kline/get"),
            quote: format!("{base}/api/qt/stock/get"),
            page: base.to_string(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct KlineResponse {
    rc: i32,
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    klines: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    rc: i32,
    data: Option<QuoteData>,
}

/// Prices come back as integers scaled by `10^f59`; a halted or
/// pre-open instrument reports `"-"` instead of a number.
#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    f43: Value,
    #[serde(default)]
    f59: Value,
    #[serde(default)]
    f60: Value,
}

/// Latest price and previous close, unrounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawQuote {
    pub price: f64,
    pub prev_close: f64,
}

// ============================================================================
// Client
// ============================================================================

/// Eastmoney market data client.
pub struct EastmoneyClient {
    client: reqwest::Client,
    endpoints: EastmoneyEndpoints,
    quote_priority: u8,
    history_priority: u8,
}

impl EastmoneyClient {
    pub fn new(http: &HttpConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(http)?,
            endpoints: EastmoneyEndpoints::default(),
            quote_priority: 0,
            history_priority: 1,
        })
    }

    pub fn with_endpoints(mut self, endpoints: EastmoneyEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Priorities when used in a quote chain and a history chain.
    pub fn with_priorities(mut self, quote: u8, history: u8) -> Self {
        self.quote_priority = quote;
        self.history_priority = history;
        self
    }

    /// Daily candles, oldest first, at most `limit` of the most recent.
    pub async fn klines(
        &self,
        instrument: &Instrument,
        adjust: Adjust,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let secid = instrument.secid();
        let fqt = match adjust {
            Adjust::None => "0",
            Adjust::Forward => "1",
        };
        let limit = limit.to_string();

        debug!(secid = %secid, fqt, "Fetching kline from eastmoney");

        let request = self.client.get(&self.endpoints.kline).query(&[
            ("secid", secid.as_str()),
            ("klt", "101"),
            ("fqt", fqt),
            ("beg", "0"),
            ("end", "20500101"),
            ("lmt", limit.as_str()),
            ("fields1", "f1,f2,f3,f4,f5,f6"),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61"),
        ]);
        let data: KlineResponse = get_json(request).await?;

        if data.rc != 0 {
            return Err(SourceError::Parse(format!("eastmoney kline rc={}", data.rc)));
        }

        let klines = data.data.and_then(|d| d.klines).unwrap_or_default();
        if klines.is_empty() {
            return Err(SourceError::DataNotAvailable(format!(
                "eastmoney has no klines for {secid}"
            )));
        }
        parse_klines(&klines)
    }

    /// Latest price and previous close for a secid.
    pub async fn raw_quote(&self, secid: &str) -> Result<RawQuote, SourceError> {
        let request = self.client.get(&self.endpoints.quote).query(&[
            ("secid", secid),
            ("fields", "f43,f57,f58,f59,f60,f169,f170"),
            ("ut", QUOTE_UT),
        ]);
        let resp: QuoteResponse = get_json(request).await?;

        if resp.rc != 0 {
            return Err(SourceError::Parse(format!("eastmoney quote rc={}", resp.rc)));
        }
        let data = resp.data.ok_or_else(|| {
            SourceError::DataNotAvailable(format!("eastmoney has no quote for {secid}"))
        })?;

        let precision = data.f59.as_i64().unwrap_or(2) as i32;
        let scale = 10f64.powi(precision);
        let price = data
            .f43
            .as_f64()
            .ok_or_else(|| SourceError::DataNotAvailable(format!("{secid} has no last price")))?;
        let prev_close = data.f60.as_f64().unwrap_or(price);

        Ok(RawQuote {
            price: price / scale,
            prev_close: prev_close / scale,
        })
    }

    /// Read the secid the index quote page is wired to.
    ///
    /// Falls back to the code-derived secid when the page is unreachable or
    /// no longer embeds one.
    pub async fn page_secid(&self, instrument: &Instrument) -> String {
        let fallback = instrument.secid();
        let url = format!("{}/zs{}.html", self.endpoints.page, instrument.code);

        let html = match get_text(self.client.get(&url)).await {
            Ok(html) => html,
            Err(e) => {
                warn!(code = %instrument.code, error = %e, "Index page unavailable, using derived secid");
                return fallback;
            }
        };
        extract_secid(&html).unwrap_or(fallback)
    }

    /// Realtime price of an index resolved through its quote page.
    pub async fn page_price(&self, instrument: &Instrument) -> Result<f64, SourceError> {
        let secid = self.page_secid(instrument).await;
        Ok(self.raw_quote(&secid).await?.price)
    }
}

/// Find `var secid = "1.000985"` in a quote page.
fn extract_secid(html: &str) -> Option<String> {
    let re = Regex::new(r#"var\s+secid\s*=\s*"(\d+\.\d+)""#).ok()?;
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse "date,open,close,high,low,volume,amount,..." lines.
fn parse_klines(klines: &[String]) -> Result<Vec<Candle>, SourceError> {
    let mut candles = Vec::with_capacity(klines.len());

    for line in klines {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 7 {
            warn!(line = %line, "Invalid kline format, skipping");
            continue;
        }

        let date = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d")
            .map_err(|e| SourceError::Parse(format!("Failed to parse date '{}': {e}", parts[0])))?;

        candles.push(Candle {
            date,
            open: parse_f64(parts[1], "open")?,
            close: parse_f64(parts[2], "close")?,
            high: parse_f64(parts[3], "high")?,
            low: parse_f64(parts[4], "low")?,
            volume: parse_f64(parts[5], "volume")?,
            amount: parse_f64(parts[6], "amount")?,
        });
    }

    candles.sort_by_key(|c| c.date);
    Ok(candles)
}

// ============================================================================
// Source Implementations
// ============================================================================

impl Source for EastmoneyClient {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    fn priority(&self) -> u8 {
        self.quote_priority
    }
}

#[async_trait]
impl QuoteSource for EastmoneyClient {
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, SourceError> {
        let raw = self.raw_quote(&instrument.secid()).await?;
        Ok(Quote::from_prices(instrument, raw.price, raw.prev_close))
    }
}

/// History view of the client with its own chain priority.
pub struct EastmoneyHistory(pub std::sync::Arc<EastmoneyClient>);

impl Source for EastmoneyHistory {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    fn priority(&self) -> u8 {
        self.0.history_priority
    }
}

#[async_trait]
impl HistorySource for EastmoneyHistory {
    async fn daily(
        &self,
        instrument: &Instrument,
        adjust: Adjust,
    ) -> Result<Vec<Candle>, SourceError> {
        self.0.klines(instrument, adjust, FULL_HISTORY_LIMIT).await
    }
}
