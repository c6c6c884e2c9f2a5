//! The three board jobs and the offline demo.
//!
//! Each job is split into a fetch stage that talks to [`MarketSources`] and
//! a pure stage that turns fetched series into files, so the pure stage can
//! run against fabricated data.

pub mod advisor;
pub mod demo;
pub mod hot;
pub mod snapshot;

use std::sync::Arc;

use board_common::config::HttpConfig;
use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

use crate::data::eastmoney::EastmoneyHistory;
use crate::data::{
    BaiduClient, EastmoneyClient, HistoryQuote, HistorySource, QuoteSource, SinaClient,
    SourceChain, SourceError, TencentClient, ThsClient,
};

/// Current wall-clock time in China (UTC+8), which decides trading days
/// and report dates regardless of the host time zone.
pub fn china_now() -> NaiveDateTime {
    let offset = FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset).naive_local()
}

/// Every vendor client and the failover chains built from them.
pub struct MarketSources {
    pub eastmoney: Arc<EastmoneyClient>,
    pub sina: Arc<SinaClient>,
    pub baidu: BaiduClient,
    pub ths: ThsClient,
    /// eastmoney → sina → tencent history
    pub index_quotes: SourceChain<dyn QuoteSource>,
    /// Stock and ETF daily bars
    pub stock_history: SourceChain<dyn HistorySource>,
    /// Index daily bars: tencent → eastmoney
    pub index_history: Arc<SourceChain<dyn HistorySource>>,
}

impl MarketSources {
    pub fn new(http: &HttpConfig) -> Result<Self, SourceError> {
        let eastmoney = Arc::new(EastmoneyClient::new(http)?.with_priorities(0, 1));
        let sina = Arc::new(SinaClient::new(http)?.with_priority(1));
        let tencent: Arc<dyn HistorySource> = Arc::new(TencentClient::new(http)?.with_priority(0));
        let eastmoney_history: Arc<dyn HistorySource> =
            Arc::new(EastmoneyHistory(Arc::clone(&eastmoney)));

        let index_quotes = SourceChain::<dyn QuoteSource>::new()
            .with(Arc::clone(&eastmoney) as Arc<dyn QuoteSource>)
            .with(Arc::clone(&sina) as Arc<dyn QuoteSource>)
            .with(Arc::new(HistoryQuote::new(Arc::clone(&tencent), 2)));

        let stock_history = SourceChain::<dyn HistorySource>::new().with(Arc::clone(&eastmoney_history));

        let index_history = SourceChain::<dyn HistorySource>::new()
            .with(tencent)
            .with(eastmoney_history);

        Ok(Self {
            eastmoney,
            sina,
            baidu: BaiduClient::new(http)?,
            ths: ThsClient::new(http)?,
            index_quotes,
            stock_history,
            index_history: Arc::new(index_history),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_order() {
        let sources = MarketSources::new(&HttpConfig::default()).unwrap();
        assert_eq!(sources.index_quotes.names(), vec!["eastmoney", "sina", "tencent"]);
        assert_eq!(sources.index_history.names(), vec!["tencent", "eastmoney"]);
        assert_eq!(sources.stock_history.names(), vec!["eastmoney"]);
    }
}
