//! Priority failover across interchangeable sources.
//!
//! Sources are tried one at a time in priority order. The first success
//! wins; every failure is logged and the next source is tried. There is no
//! retry of the same source.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::source::{Adjust, HistorySource, QuoteSource, Source, SourceError};
use super::{Candle, Instrument, Quote};

/// An ordered list of sources serving the same kind of request.
pub struct SourceChain<S: Source + ?Sized> {
    sources: Vec<Arc<S>>,
}

impl<S: Source + ?Sized> Default for SourceChain<S> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
}

impl<S: Source + ?Sized> SourceChain<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; the chain stays sorted by priority (lower first).
    pub fn register(&mut self, source: Arc<S>) {
        debug!(source = source.name(), priority = source.priority(), "Registered source");
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.priority());
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, source: Arc<S>) -> Self {
        self.register(source);
        self
    }

    /// Names in the order they will be tried.
    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run `request_fn` against each source until one succeeds.
    pub async fn execute<T, F, Fut>(&self, what: &str, request_fn: F) -> Result<T, SourceError>
    where
        F: Fn(Arc<S>) -> Fut,
        Fut: std::future::Future<Output = Result<T, SourceError>>,
    {
        if self.sources.is_empty() {
            return Err(SourceError::Unavailable(format!(
                "no sources registered for {what}"
            )));
        }

        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let name = source.name();
            debug!(source = name, what, "Routing request to source");

            match request_fn(Arc::clone(source)).await {
                Ok(result) => {
                    if !failures.is_empty() {
                        info!(source = name, what, "Served by fallback source");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!(source = name, what, error = %e, "Source failed");
                    if !e.should_failover() {
                        return Err(e);
                    }
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        Err(SourceError::Unavailable(format!(
            "all sources failed for {what} [{}]",
            failures.join("; ")
        )))
    }
}

impl SourceChain<dyn QuoteSource> {
    /// Latest quote from the first source that answers.
    pub async fn quote(&self, instrument: &Instrument) -> Result<Quote, SourceError> {
        let what = format!("quote {}({})", instrument.name, instrument.code);
        self.execute(&what, |source| async move { source.quote(instrument).await })
            .await
    }
}

impl SourceChain<dyn HistorySource> {
    /// Daily history from the first source that answers with at least one row.
    pub async fn daily(
        &self,
        instrument: &Instrument,
        adjust: Adjust,
    ) -> Result<Vec<Candle>, SourceError> {
        let what = format!("daily {}({})", instrument.name, instrument.code);
        self.execute(&what, |source| async move {
            let candles = source.daily(instrument, adjust).await?;
            if candles.is_empty() {
                return Err(SourceError::DataNotAvailable(format!(
                    "{} returned no rows",
                    source.name()
                )));
            }
            Ok(candles)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InstrumentKind;
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        priority: u8,
        result: Result<f64, SourceError>,
    }

    impl Source for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn priority(&self) -> u8 {
            self.priority
        }
    }

    #[async_trait]
    impl QuoteSource for Fixed {
        async fn quote(&self, instrument: &Instrument) -> Result<Quote, SourceError> {
            let price = self.result.clone()?;
            Ok(Quote::from_prices(instrument, price, price))
        }
    }

    fn index() -> Instrument {
        Instrument::new("000001", "上证指数", InstrumentKind::Index)
    }

    #[tokio::test]
    async fn test_sorted_by_priority() {
        let chain = SourceChain::<dyn QuoteSource>::new()
            .with(Arc::new(Fixed { name: "b", priority: 2, result: Ok(2.0) }))
            .with(Arc::new(Fixed { name: "a", priority: 0, result: Ok(1.0) }));
        assert_eq!(chain.names(), vec!["a", "b"]);

        let quote = chain.quote(&index()).await.unwrap();
        assert_eq!(quote.price, 1.0);
    }

    #[tokio::test]
    async fn test_invalid_request_stops_chain() {
        let chain = SourceChain::<dyn QuoteSource>::new()
            .with(Arc::new(Fixed {
                name: "a",
                priority: 0,
                result: Err(SourceError::InvalidRequest("bad code".into())),
            }))
            .with(Arc::new(Fixed { name: "b", priority: 1, result: Ok(2.0) }));

        let err = chain.quote(&index()).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_empty_chain_is_unavailable() {
        let chain = SourceChain::<dyn QuoteSource>::new();
        assert!(chain.names().is_empty());
        let err = chain.quote(&index()).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
