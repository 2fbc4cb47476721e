//! NSE public exchange source.
//!
//! Only daily bars are published, and only for the NSE equity segment. The
//! site expects a session cookie from its landing page before it answers API
//! calls; the cookie is cached per adapter and dropped when rejected.

mod models;

use std::sync::RwLock;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header;

use crate::config::TickerStoreConfig;
use crate::errors::SourceError;
use crate::models::{
    InstrumentRequest, Interval, NormalizedSeries, RawTable, SourceId, TimestampFormat,
};
use crate::normalize::normalize;
use crate::provider::{check_status, read_json, SourceAdapter, USER_AGENT, VENDOR_DATE_FORMAT};

use models::{NseHistoricalResponse, NseHistoricalRow};

const SOURCE: SourceId = SourceId::Nse;
const SUPPORTED_INTERVALS: [Interval; 1] = [Interval::Day1];
const EQUITY_SERIES: &str = "[\"EQ\"]";

/// Public exchange adapter, daily bars only.
pub struct NseAdapter {
    client: reqwest::Client,
    base_url: String,
    cookie: RwLock<Option<String>>,
}

impl NseAdapter {
    pub fn new(config: &TickerStoreConfig, client: reqwest::Client) -> Self {
        Self::with_base_url(&config.nse_base_url, client)
    }

    pub fn with_base_url(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie: RwLock::new(None),
        }
    }

    fn cached_cookie(&self) -> Option<String> {
        match self.cookie.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_cookie(&self, cookie: Option<String>) {
        match self.cookie.write() {
            Ok(mut guard) => *guard = cookie,
            Err(poisoned) => *poisoned.into_inner() = cookie,
        }
    }

    /// Return the cached session cookie, visiting the landing page if needed.
    async fn ensure_cookie(&self) -> Result<String, SourceError> {
        if let Some(cookie) = self.cached_cookie() {
            return Ok(cookie);
        }

        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, response).await?;

        let cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        debug!("Obtained NSE session ({} cookie bytes)", cookie.len());

        self.store_cookie(Some(cookie.clone()));
        Ok(cookie)
    }

    async fn fetch_rows(
        &self,
        request: &InstrumentRequest,
    ) -> Result<Vec<NseHistoricalRow>, SourceError> {
        let cookie = self.ensure_cookie().await?;
        let from = request.start_date.format(VENDOR_DATE_FORMAT).to_string();
        let to = request.end_date.format(VENDOR_DATE_FORMAT).to_string();

        let mut builder = self
            .client
            .get(format!("{}/api/historical/cm/equity", self.base_url))
            .query(&[
                ("symbol", request.ticker.symbol()),
                ("series", EQUITY_SERIES),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .header(header::REFERER, format!("{}/", self.base_url));
        if !cookie.is_empty() {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = match check_status(SOURCE, response).await {
            Err(error @ SourceError::Unauthorized { .. }) => {
                warn!("NSE rejected the session cookie, dropping it");
                self.store_cookie(None);
                return Err(error);
            }
            other => other?,
        };

        let body: NseHistoricalResponse = read_json(SOURCE, response).await?;
        Ok(body.data)
    }
}

#[async_trait]
impl SourceAdapter for NseAdapter {
    fn id(&self) -> SourceId {
        SOURCE
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        &SUPPORTED_INTERVALS
    }

    async fn fetch(&self, request: &InstrumentRequest) -> Result<NormalizedSeries, SourceError> {
        if !self.supports(request.interval) {
            return Err(SourceError::UnsupportedInterval {
                source_id: SOURCE,
                interval: request.interval,
            });
        }
        if request.ticker.exchange() != "NSE" {
            return Err(SourceError::SymbolNotFound {
                source_id: SOURCE,
                symbol: request.ticker.to_string(),
            });
        }

        let rows = self.fetch_rows(request).await?;
        debug!("Received {} daily rows for {}", rows.len(), request.ticker);

        let mut raw = RawTable::new(
            NseHistoricalRow::COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            TimestampFormat::CalendarDate {
                column: "Date".to_string(),
            },
        );
        for row in rows {
            raw.push_row(row.into_row());
        }

        normalize(&raw, request.ticker.as_str(), SOURCE)
    }
}
