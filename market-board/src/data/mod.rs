//! Market data for the board tools.
//!
//! Every upstream is a free public endpoint with no contract, so each vendor
//! lives behind the [`QuoteSource`] / [`HistorySource`] traits and callers
//! chain several of them through a [`SourceChain`].
//!
//! # Data Sources
//! - **eastmoney**: daily klines (push2his), realtime quotes (push2), index page secid
//! - **sina**: `hq.sinajs.cn` realtime quotes
//! - **tencent**: `fqkline` daily klines for indices
//! - **baidu**: spot and futures-main-contract klines for the basis chart
//! - **ths**: 10jqka hot-stock rankings

pub mod baidu;
pub mod calendar;
pub mod eastmoney;
mod http;
mod router;
pub mod sina;
mod source;
pub mod tencent;
pub mod ths;

pub use baidu::BaiduClient;
pub use calendar::TradingCalendar;
pub use eastmoney::EastmoneyClient;
pub use router::SourceChain;
pub use sina::SinaClient;
pub use source::{Adjust, HistoryQuote, HistorySource, QuoteSource, Source, SourceError};
pub use tencent::TencentClient;
pub use ths::ThsClient;

use board_common::config::InstrumentConfig;
use board_common::util::round_to;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// What kind of security a code refers to. Determines exchange routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Stock,
    Etf,
    Index,
    Future,
}

/// A tradable or quoted code with its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub code: String,
    pub name: String,
    pub kind: InstrumentKind,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: InstrumentKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn from_config(config: &InstrumentConfig, kind: InstrumentKind) -> Self {
        Self::new(&config.code, &config.name, kind)
    }

    /// Whether the code trades (or is published) on the Shanghai side.
    ///
    /// Index codes starting with 399 are Shenzhen; every other index code
    /// (SSE 000xxx and CSI series) is published under the Shanghai market.
    pub fn is_shanghai(&self) -> bool {
        let code = self.code.as_str();
        match self.kind {
            InstrumentKind::Index => !code.starts_with("399"),
            InstrumentKind::Stock => code.starts_with('6') || code.starts_with('9'),
            InstrumentKind::Etf => code.starts_with('5'),
            InstrumentKind::Future => false,
        }
    }

    /// Eastmoney `secid`: `1.<code>` for Shanghai, `0.<code>` for Shenzhen.
    pub fn secid(&self) -> String {
        let market = if self.is_shanghai() { "1" } else { "0" };
        format!("{}.{}", market, self.code)
    }

    /// Exchange-prefixed symbol used by sina and tencent: `sh000001`, `sz399006`.
    pub fn prefixed_symbol(&self) -> String {
        let prefix = if self.is_shanghai() { "sh" } else { "sz" };
        format!("{}{}", prefix, self.code)
    }
}

/// One daily bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

/// A (date, close) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl From<&Candle> for PricePoint {
    fn from(c: &Candle) -> Self {
        Self {
            date: c.date,
            close: c.close,
        }
    }
}

/// Latest price with its change against the previous close.
///
/// Serialized field names are the ones the dashboard and `price.json` use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub prev_price: f64,
    pub change: f64,
    pub change_pct: f64,
}

impl Quote {
    /// Build a quote from a current and previous price; both are rounded to 2 dp first.
    pub fn from_prices(instrument: &Instrument, price: f64, prev_price: f64) -> Self {
        let price = round_to(price, 2);
        let prev_price = round_to(prev_price, 2);
        let (change, change_pct) = price_change(price, prev_price);
        Self {
            name: instrument.name.clone(),
            symbol: instrument.code.clone(),
            price,
            prev_price,
            change,
            change_pct,
        }
    }

    /// Quote from the last two closes of a daily history.
    pub fn from_history(instrument: &Instrument, candles: &[Candle]) -> Result<Self, SourceError> {
        match candles {
            [.., prev, last] => Ok(Self::from_prices(instrument, last.close, prev.close)),
            _ => Err(SourceError::DataNotAvailable(format!(
                "{} needs two sessions of history, got {}",
                instrument.code,
                candles.len()
            ))),
        }
    }
}

/// Absolute and percentage change, both rounded to 2 dp.
///
/// The percentage is 0 when the previous price is 0.
pub fn price_change(current: f64, previous: f64) -> (f64, f64) {
    let change = round_to(current - previous, 2);
    let pct = if previous != 0.0 {
        round_to(change / previous * 100.0, 2)
    } else {
        0.0
    };
    (change, pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(date: &str, close: f64) -> Candle {
        Candle {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            amount: 0.0,
        }
    }

    #[test]
    fn test_price_change() {
        assert_eq!(price_change(26.80, 26.50), (0.3, 1.13));
        assert_eq!(price_change(10.0, 0.0), (10.0, 0.0));
        assert_eq!(price_change(9.5, 10.0), (-0.5, -5.0));
    }

    #[test]
    fn test_secid_routing() {
        let cases = [
            ("000001", InstrumentKind::Index, "1.000001", "sh000001"),
            ("399006", InstrumentKind::Index, "0.399006", "sz399006"),
            ("000985", InstrumentKind::Index, "1.000985", "sh000985"),
            ("600900", InstrumentKind::Stock, "1.600900", "sh600900"),
            ("000858", InstrumentKind::Stock, "0.000858", "sz000858"),
            ("515180", InstrumentKind::Etf, "1.515180", "sh515180"),
            ("159915", InstrumentKind::Etf, "0.159915", "sz159915"),
        ];
        for (code, kind, secid, prefixed) in cases {
            let inst = Instrument::new(code, "", kind);
            assert_eq!(inst.secid(), secid, "{code}");
            assert_eq!(inst.prefixed_symbol(), prefixed, "{code}");
        }
    }

    #[test]
    fn test_quote_from_history_uses_last_two_closes() {
        let inst = Instrument::new("600900", "长江电力", InstrumentKind::Stock);
        let candles = vec![
            candle("2024-05-06", 27.0),
            candle("2024-05-07", 26.5),
            candle("2024-05-08", 26.8),
        ];
        let quote = Quote::from_history(&inst, &candles).unwrap();
        assert_eq!(quote.price, 26.8);
        assert_eq!(quote.prev_price, 26.5);
        assert_eq!(quote.change, 0.3);
        assert_eq!(quote.symbol, "600900");

        assert!(Quote::from_history(&inst, &candles[..1]).is_err());
    }
}
