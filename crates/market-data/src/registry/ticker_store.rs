//! Ordered-fallback orchestration over the configured sources.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use log::{debug, info, warn};

use super::FetchDiagnostics;
use crate::config::{ExhaustionPolicy, TickerStoreConfig};
use crate::errors::{SourceError, TickerStoreError};
use crate::models::{
    default_fetch_order, FetchOrder, InstrumentRequest, Interval, NormalizedSeries, SourceId,
    Ticker,
};
use crate::provider::{NseAdapter, SourceAdapter, UpstoxAdapter};

/// Entry point for historical price retrieval.
///
/// Sources are tried one at a time in the current fetch order. The first
/// source that answers (even with an empty series) wins; failures are logged
/// and the next source is tried. What happens once every source failed is
/// governed by [`ExhaustionPolicy`].
pub struct TickerStore {
    sources: HashMap<SourceId, Arc<dyn SourceAdapter>>,
    fetch_order: RwLock<FetchOrder>,
    on_exhaustion: ExhaustionPolicy,
}

impl TickerStore {
    /// Build the store with the default brokerage and exchange sources.
    pub fn new(config: &TickerStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });

        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(UpstoxAdapter::new(config, client.clone())),
            Arc::new(NseAdapter::new(config, client)),
        ];

        let store = Self::with_sources(adapters, config.on_exhaustion);
        store.set_fetch_order(config.fetch_order.clone());
        store
    }

    /// Build the store around caller-supplied adapters.
    ///
    /// A later adapter with the same id replaces an earlier one. The fetch
    /// order starts as the default `[UPSTOX, NSE]`.
    pub fn with_sources(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        on_exhaustion: ExhaustionPolicy,
    ) -> Self {
        let sources = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();

        Self {
            sources,
            fetch_order: RwLock::new(default_fetch_order()),
            on_exhaustion,
        }
    }

    /// Replace the fetch order. Takes effect on the next call.
    pub fn set_fetch_order(&self, order: FetchOrder) {
        debug!("Fetch order set to {:?}", order);
        match self.fetch_order.write() {
            Ok(mut guard) => *guard = order,
            Err(poisoned) => *poisoned.into_inner() = order,
        }
    }

    pub fn fetch_order(&self) -> FetchOrder {
        match self.fetch_order.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn on_exhaustion(&self) -> ExhaustionPolicy {
        self.on_exhaustion
    }

    /// Fetch `[start_date, end_date]` bars for `ticker` (`EXCHANGE:SYMBOL`).
    pub async fn historical_data(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        interval: Interval,
    ) -> Result<NormalizedSeries, TickerStoreError> {
        let request = InstrumentRequest::new(Ticker::parse(ticker)?, start_date, end_date, interval)?;
        self.historical_data_request(&request).await
    }

    pub async fn historical_data_request(
        &self,
        request: &InstrumentRequest,
    ) -> Result<NormalizedSeries, TickerStoreError> {
        let (result, diagnostics) = self.historical_data_with_diagnostics(request).await;
        debug!("Fetch chain for {}: {}", request.ticker, diagnostics.summary());
        result
    }

    /// Like [`historical_data_request`](Self::historical_data_request), also
    /// returning the per-source attempt record.
    pub async fn historical_data_with_diagnostics(
        &self,
        request: &InstrumentRequest,
    ) -> (Result<NormalizedSeries, TickerStoreError>, FetchDiagnostics) {
        let order = self.fetch_order();
        let mut diagnostics = FetchDiagnostics::new();

        for source_id in order {
            let Some(adapter) = self.sources.get(&source_id) else {
                let error = SourceError::NotConfigured {
                    source_id,
                    message: "no adapter registered".to_string(),
                };
                warn!("Skipping {}: {}", source_id, error);
                diagnostics.record_error(source_id, error.to_string());
                continue;
            };

            debug!(
                "Trying {} for {} {}..{} ({})",
                source_id, request.ticker, request.start_date, request.end_date, request.interval
            );

            match adapter.fetch(request).await {
                Ok(series) => {
                    info!(
                        "{} returned {} rows for {} ({})",
                        source_id,
                        series.len(),
                        request.ticker,
                        request.interval
                    );
                    diagnostics.record_success(source_id);
                    return (Ok(series), diagnostics);
                }
                Err(e) => {
                    warn!("{}", e);
                    diagnostics.record_error(source_id, e.to_string());
                }
            }
        }

        let result = match self.on_exhaustion {
            ExhaustionPolicy::Fail => Err(TickerStoreError::NoSourceProvidedData {
                interval: request.interval,
                attempts: diagnostics.attempts.clone(),
            }),
            ExhaustionPolicy::ReturnEmpty => {
                warn!(
                    "No source provided data for {} ({}), returning an empty series",
                    request.ticker, request.interval
                );
                Ok(NormalizedSeries::empty())
            }
        };
        (result, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeriesRow;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Outcome {
        Rows(usize),
        Fail,
    }

    struct MockAdapter {
        id: SourceId,
        intervals: &'static [Interval],
        outcome: Outcome,
        call_count: AtomicUsize,
    }

    impl MockAdapter {
        fn new(id: SourceId, intervals: &'static [Interval], outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                id,
                intervals,
                outcome,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for MockAdapter {
        fn id(&self) -> SourceId {
            self.id
        }

        fn supported_intervals(&self) -> &'static [Interval] {
            self.intervals
        }

        async fn fetch(
            &self,
            request: &InstrumentRequest,
        ) -> Result<NormalizedSeries, SourceError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if !self.supports(request.interval) {
                return Err(SourceError::UnsupportedInterval {
                    source_id: self.id,
                    interval: request.interval,
                });
            }
            match self.outcome {
                Outcome::Rows(count) => Ok(NormalizedSeries::from_rows(
                    (0..count)
                        .map(|day| SeriesRow {
                            timestamp: Utc
                                .with_ymd_and_hms(2018, 12, 1 + day as u32, 0, 0, 0)
                                .unwrap(),
                            open: 1.0,
                            high: 2.0,
                            low: 0.5,
                            close: 1.5,
                            volume: 10,
                            symbol: request.ticker.to_string(),
                        })
                        .collect(),
                )),
                Outcome::Fail => Err(SourceError::Transport {
                    source_id: self.id,
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    const DAILY: &[Interval] = &[Interval::Day1];

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 12, d).unwrap()
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Rows(3));
        let nse = MockAdapter::new(SourceId::Nse, DAILY, Outcome::Rows(2));
        let store = TickerStore::with_sources(
            vec![upstox.clone(), nse.clone()],
            ExhaustionPolicy::Fail,
        );

        let series = store
            .historical_data("NSE:RELIANCE", day(1), day(3), Interval::Day1)
            .await
            .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(upstox.calls(), 1);
        assert_eq!(nse.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_after_failure() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Fail);
        let nse = MockAdapter::new(SourceId::Nse, DAILY, Outcome::Rows(2));
        let store = TickerStore::with_sources(
            vec![upstox.clone(), nse.clone()],
            ExhaustionPolicy::Fail,
        );

        let request =
            InstrumentRequest::parse("NSE:RELIANCE", "01/12/2018", "03/12/2018", Interval::Day1)
                .unwrap();
        let (result, diagnostics) = store.historical_data_with_diagnostics(&request).await;

        assert_eq!(result.unwrap().len(), 2);
        assert_eq!(upstox.calls(), 1);
        assert_eq!(nse.calls(), 1);
        assert!(diagnostics.summary().starts_with("UPSTOX: ERROR"));
        assert!(diagnostics.summary().ends_with("NSE: SUCCESS"));
    }

    #[tokio::test]
    async fn test_exhaustion_fails_with_attempts() {
        let nse = MockAdapter::new(SourceId::Nse, DAILY, Outcome::Rows(2));
        let store = TickerStore::with_sources(vec![nse.clone()], ExhaustionPolicy::Fail);
        store.set_fetch_order(vec![SourceId::Nse]);

        let err = store
            .historical_data("NSE:RELIANCE", day(1), day(3), Interval::Minute5)
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .contains("no source provided data for the requested interval"));
        match err {
            TickerStoreError::NoSourceProvidedData { interval, attempts } => {
                assert_eq!(interval, Interval::Minute5);
                assert_eq!(attempts.len(), 1);
                assert!(attempts[0]
                    .error
                    .as_deref()
                    .unwrap()
                    .contains("not available for requested time interval"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_can_return_empty() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Fail);
        let store = TickerStore::with_sources(vec![upstox], ExhaustionPolicy::ReturnEmpty);
        store.set_fetch_order(vec![SourceId::Upstox]);

        let series = store
            .historical_data("NSE:RELIANCE", day(1), day(3), Interval::Day1)
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_empty_fallback_keeps_failures_in_diagnostics() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Fail);
        let nse = MockAdapter::new(SourceId::Nse, &[Interval::Day1], Outcome::Fail);
        let store = TickerStore::with_sources(vec![upstox, nse], ExhaustionPolicy::ReturnEmpty);
        assert_eq!(store.on_exhaustion(), ExhaustionPolicy::ReturnEmpty);

        let request =
            InstrumentRequest::parse("NSE:RELIANCE", "01/12/2018", "03/12/2018", Interval::Day1)
                .unwrap();
        let (result, diagnostics) = store.historical_data_with_diagnostics(&request).await;

        assert!(result.unwrap().is_empty());
        assert!(!diagnostics.has_success());
        let failed: Vec<SourceId> = diagnostics.errors().into_iter().map(|(s, _)| s).collect();
        assert_eq!(failed, vec![SourceId::Upstox, SourceId::Nse]);
        assert!(diagnostics.errors()[0].1.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_success_is_terminal() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Rows(0));
        let nse = MockAdapter::new(SourceId::Nse, DAILY, Outcome::Rows(2));
        let store = TickerStore::with_sources(
            vec![upstox.clone(), nse.clone()],
            ExhaustionPolicy::Fail,
        );

        let series = store
            .historical_data("NSE:RELIANCE", day(1), day(2), Interval::Day1)
            .await
            .unwrap();
        assert!(series.is_empty());
        assert_eq!(nse.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_source_is_recorded() {
        let nse = MockAdapter::new(SourceId::Nse, DAILY, Outcome::Rows(1));
        let store = TickerStore::with_sources(vec![nse], ExhaustionPolicy::Fail);

        let request =
            InstrumentRequest::parse("RELIANCE", "01/12/2018", "01/12/2018", Interval::Day1)
                .unwrap();
        let (result, diagnostics) = store.historical_data_with_diagnostics(&request).await;

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(diagnostics.attempts.len(), 2);
        assert!(diagnostics.attempts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("not configured"));
    }

    #[tokio::test]
    async fn test_duplicate_sources_are_tried_twice() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Fail);
        let store = TickerStore::with_sources(vec![upstox.clone()], ExhaustionPolicy::Fail);
        store.set_fetch_order(vec![SourceId::Upstox, SourceId::Upstox]);

        let result = store
            .historical_data("NSE:RELIANCE", day(1), day(3), Interval::Day1)
            .await;
        assert!(result.is_err());
        assert_eq!(upstox.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_order_round_trips() {
        let store = TickerStore::with_sources(Vec::new(), ExhaustionPolicy::Fail);
        assert_eq!(store.fetch_order(), vec![SourceId::Upstox, SourceId::Nse]);

        store.set_fetch_order(vec![SourceId::Nse]);
        assert_eq!(store.fetch_order(), vec![SourceId::Nse]);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_sources() {
        let upstox = MockAdapter::new(SourceId::Upstox, &Interval::ALL, Outcome::Rows(1));
        let store = TickerStore::with_sources(vec![upstox.clone()], ExhaustionPolicy::Fail);

        let err = store
            .historical_data("NSE:RELIANCE", day(3), day(1), Interval::Day1)
            .await
            .unwrap_err();
        assert!(matches!(err, TickerStoreError::InvalidRequest(_)));

        let err = store
            .historical_data("  ", day(1), day(3), Interval::Day1)
            .await
            .unwrap_err();
        assert!(matches!(err, TickerStoreError::InvalidRequest(_)));
        assert_eq!(upstox.calls(), 0);
    }
}
