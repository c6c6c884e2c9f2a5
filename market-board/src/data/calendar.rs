//! Trading-day check.
//!
//! A session counts as open today when the SSE composite already has a
//! daily bar dated today. Before the 09:30 open, or when the check cannot
//! reach any source, the Monday-to-Friday rule decides.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::sync::Arc;
use tracing::{debug, warn};

use super::source::{Adjust, HistorySource};
use super::{Instrument, InstrumentKind, SourceChain};

/// Decides whether the A-share market trades on a given day.
pub struct TradingCalendar {
    history: Arc<SourceChain<dyn HistorySource>>,
    reference: Instrument,
}

impl TradingCalendar {
    pub fn new(history: Arc<SourceChain<dyn HistorySource>>) -> Self {
        Self {
            history,
            reference: Instrument::new("000001", "上证指数", InstrumentKind::Index),
        }
    }

    /// Whether `now` (China local time) falls on a trading day.
    pub async fn is_trading_day(&self, now: NaiveDateTime) -> bool {
        let today = now.date();
        let before_open = NaiveTime::from_hms_opt(9, 30, 0).map_or(false, |open| now.time() < open);
        if before_open {
            return is_weekday(today);
        }

        match self.history.daily(&self.reference, Adjust::None).await {
            Ok(candles) => {
                let latest = candles.last().map(|c| c.date);
                debug!(?latest, %today, "Checked latest SSE session");
                latest == Some(today)
            }
            Err(e) => {
                warn!(error = %e, "Trading calendar unavailable, falling back to weekday rule");
                is_weekday(today)
            }
        }
    }
}

/// Monday to Friday.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
