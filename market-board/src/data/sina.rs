//! Sina `hq.sinajs.cn` realtime quotes.
//!
//! The endpoint answers with JavaScript assignments such as
//! `var hq_str_sh000001="上证指数,3040.1,3035.2,3051.9,...";` and refuses
//! requests without a sina Referer.

use async_trait::async_trait;
use board_common::config::HttpConfig;

use super::http::{build_client, get_text, parse_f64};
use super::source::{QuoteSource, Source, SourceError};
use super::{Instrument, Quote};

const SINA_QUOTE_URL: &str = "https://hq.sinajs.cn";
const SINA_REFERER: &str = "https://finance.sina.com.cn";

/// Fields of one quote line that the board uses.
#[derive(Debug, Clone, PartialEq)]
pub struct SinaQuote {
    pub name: String,
    pub open: f64,
    pub prev_close: f64,
    pub price: f64,
}

/// Sina realtime quote client.
pub struct SinaClient {
    client: reqwest::Client,
    base_url: String,
    priority: u8,
}

impl SinaClient {
    pub fn new(http: &HttpConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(http)?,
            base_url: SINA_QUOTE_URL.into(),
            priority: 1,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Fetch and parse the quote line for an instrument.
    pub async fn fetch(&self, instrument: &Instrument) -> Result<SinaQuote, SourceError> {
        let symbol = instrument.prefixed_symbol();
        let url = format!("{}/list={}", self.base_url, symbol);
        let body = get_text(self.client.get(&url).header("Referer", SINA_REFERER)).await?;
        parse_quote_line(&body, &symbol)
    }
}

/// Parse the quoted, comma-separated payload of a `hq_str_` assignment.
///
/// Field 0 is the name, 1 the open, 2 the previous close, 3 the last price.
pub fn parse_quote_line(body: &str, symbol: &str) -> Result<SinaQuote, SourceError> {
    let marker = format!("hq_str_{symbol}=\"");
    let start = body
        .find(&marker)
        .map(|i| i + marker.len())
        .ok_or_else(|| SourceError::Parse(format!("no sina quote line for {symbol}")))?;
    let payload = body[start..]
        .split('"')
        .next()
        .unwrap_or_default();

    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < 4 {
        return Err(SourceError::DataNotAvailable(format!(
            "sina returned an empty quote for {symbol}"
        )));
    }

    Ok(SinaQuote {
        name: fields[0].to_string(),
        open: parse_f64(fields[1], "open")?,
        prev_close: parse_f64(fields[2], "prev_close")?,
        price: parse_f64(fields[3], "price")?,
    })
}

impl Source for SinaClient {
    fn name(&self) -> &'static str {
        "sina"
    }

    fn priority(&self) -> u8 {
        self.priority
    }
}

#[async_trait]
impl QuoteSource for SinaClient {
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, SourceError> {
        let q = self.fetch(instrument).await?;
        if q.price <= 0.0 {
            return Err(SourceError::DataNotAvailable(format!(
                "sina has no trade yet for {}",
                instrument.code
            )));
        }
        Ok(Quote::from_prices(instrument, q.price, q.prev_close))
    }
}
