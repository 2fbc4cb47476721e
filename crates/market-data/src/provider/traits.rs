//! Source adapter trait definitions.

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::models::{InstrumentRequest, Interval, NormalizedSeries, SourceId};

/// A single upstream source of historical prices.
///
/// Adapters translate a canonical [`InstrumentRequest`] into the vendor's
/// native call and hand the vendor response to the normalizer. Every failure
/// leaves the adapter as a [`SourceError`] so the orchestrator can move on to
/// the next source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Identifier used in the fetch order.
    fn id(&self) -> SourceId;

    /// Bar granularities this source can serve.
    fn supported_intervals(&self) -> &'static [Interval];

    fn supports(&self, interval: Interval) -> bool {
        self.supported_intervals().contains(&interval)
    }

    /// Fetch and normalize the requested range.
    ///
    /// An empty series is a valid answer (e.g. a range without trading days)
    /// and stops the fallback chain.
    async fn fetch(&self, request: &InstrumentRequest) -> Result<NormalizedSeries, SourceError>;
}
