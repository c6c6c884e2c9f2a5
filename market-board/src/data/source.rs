//! Source abstraction shared by every vendor client.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::{Candle, Instrument, Quote};

// ============================================================================
// Source Error
// ============================================================================

/// Errors specific to upstream data sources.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// Connection failed, timed out, or a non-success HTTP status
    Network(String),
    /// The upstream answered 429
    RateLimited { retry_after_secs: Option<u64> },
    /// The body did not have the expected shape
    Parse(String),
    /// The upstream answered but had nothing for this instrument
    DataNotAvailable(String),
    /// No source in a chain could serve the request
    Unavailable(String),
    /// The request itself is malformed; other sources would reject it too
    InvalidRequest(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::Parse(msg) => write!(f, "Unexpected response: {}", msg),
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Whether the next source in a chain is worth trying.
    pub fn should_failover(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Source Traits
// ============================================================================

/// Price adjustment applied to a daily history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjust {
    /// Raw traded prices
    #[default]
    None,
    /// Forward-adjusted for dividends and splits
    Forward,
}

/// Common identity of a source inside a [`super::SourceChain`].
pub trait Source: Send + Sync {
    /// Short name used in logs (e.g., "eastmoney", "sina")
    fn name(&self) -> &'static str;

    /// Position in a chain (lower = tried first)
    fn priority(&self) -> u8;
}

/// A source of realtime (or latest-session) quotes.
#[async_trait]
pub trait QuoteSource: Source {
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, SourceError>;
}

/// A source of daily candles, oldest first.
#[async_trait]
pub trait HistorySource: Source {
    async fn daily(
        &self,
        instrument: &Instrument,
        adjust: Adjust,
    ) -> Result<Vec<Candle>, SourceError>;
}

// ============================================================================
// History-backed quote
// ============================================================================

/// Serves quotes from the last two closes of a daily history.
///
/// Used as the last resort of a quote chain when every realtime source fails.
pub struct HistoryQuote {
    history: Arc<dyn HistorySource>,
    priority: u8,
}

impl HistoryQuote {
    pub fn new(history: Arc<dyn HistorySource>, priority: u8) -> Self {
        Self { history, priority }
    }
}

impl Source for HistoryQuote {
    fn name(&self) -> &'static str {
        self.history.name()
    }

    fn priority(&self) -> u8 {
        self.priority
    }
}

#[async_trait]
impl QuoteSource for HistoryQuote {
    async fn quote(&self, instrument: &Instrument) -> Result<Quote, SourceError> {
        let candles = self.history.daily(instrument, Adjust::None).await?;
        Quote::from_history(instrument, &candles)
    }
}
