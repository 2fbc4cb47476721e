//! Upstox brokerage source.
//!
//! Serves every interval, from tick data up to monthly bars. Each call needs
//! a same-day access token: a stored token is reused until the local
//! calendar day rolls over, after which the interactive authorizer is asked
//! for a fresh one.

mod models;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use log::{debug, info, warn};
use reqwest::header;
use urlencoding::encode;

use crate::config::{TickerStoreConfig, UpstoxConfig};
use crate::credentials::{
    Authorizer, Credential, CredentialStore, UpstoxAuthorizer, UpstoxTokenExchange,
};
use crate::errors::SourceError;
use crate::models::{
    InstrumentRequest, Interval, NormalizedSeries, RawTable, SourceId, TimestampFormat,
};
use crate::normalize::normalize;
use crate::provider::{check_status, read_json, SourceAdapter, USER_AGENT, VENDOR_DATE_FORMAT};

use models::{ContractEntry, MasterContractData, UpstoxCandle, UpstoxEnvelope};

const SOURCE: SourceId = SourceId::Upstox;

/// Vendor name of an interval in the historical endpoint path.
fn interval_code(interval: Interval) -> &'static str {
    match interval {
        Interval::Tick => "TICK",
        Interval::Minute1 => "1MINUTE",
        Interval::Minute5 => "5MINUTE",
        Interval::Minute10 => "10MINUTE",
        Interval::Minute30 => "30MINUTE",
        Interval::Minute60 => "60MINUTE",
        Interval::Day1 => "1DAY",
        Interval::Week1 => "1WEEK",
        Interval::Month1 => "1MONTH",
    }
}

/// Vendor segment for an exchange code. Unknown exchanges pass through.
fn vendor_exchange(exchange: &str) -> String {
    match exchange {
        "NSE" => "NSE_EQ".to_string(),
        "BSE" => "BSE_EQ".to_string(),
        other => other.to_string(),
    }
}

/// Authenticated brokerage adapter.
pub struct UpstoxAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    store: Arc<CredentialStore>,
    authorizer: Option<Arc<dyn Authorizer>>,
}

impl UpstoxAdapter {
    /// Build the adapter with the interactive authorizer from configuration.
    ///
    /// Without an API key every fetch fails with `NotConfigured`; without an
    /// API secret a stored same-day token still works but no new one can be
    /// obtained.
    pub fn new(config: &TickerStoreConfig, client: reqwest::Client) -> Self {
        let upstox = &config.upstox;
        let authorizer = match (&upstox.api_key, &upstox.api_secret) {
            (Some(key), Some(secret)) => {
                let exchange = UpstoxTokenExchange::new(client.clone(), upstox, key, secret);
                Some(Arc::new(UpstoxAuthorizer::new(
                    upstox,
                    key,
                    Arc::new(exchange),
                    config.auth_timeout,
                )) as Arc<dyn Authorizer>)
            }
            _ => None,
        };

        Self {
            client,
            base_url: upstox.base_url.clone(),
            api_key: upstox.api_key.clone(),
            store: Arc::new(CredentialStore::new(&config.access_token_file_path)),
            authorizer,
        }
    }

    /// Build the adapter around an explicit credential store and authorizer.
    pub fn with_authorizer(
        config: &UpstoxConfig,
        client: reqwest::Client,
        store: Arc<CredentialStore>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            store,
            authorizer: Some(authorizer),
        }
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured {
                source_id: SOURCE,
                message: "UPSTOX_API_KEY is not set".to_string(),
            })
    }

    /// Return a same-day token, authorizing interactively when needed.
    async fn access_token(&self) -> Result<String, SourceError> {
        if let Some(credential) = self.store.load() {
            if !self.store.is_stale(&credential, Local::now()) {
                debug!("Using stored access token {}", credential.masked());
                return Ok(credential.token);
            }
            info!("Stored access token {} is stale", credential.masked());
        }

        let authorizer = self
            .authorizer
            .as_ref()
            .ok_or_else(|| SourceError::NotConfigured {
                source_id: SOURCE,
                message: "UPSTOX_API_SECRET is not set, cannot authorize".to_string(),
            })?;

        let token = authorizer
            .authorize()
            .await
            .map_err(|cause| SourceError::Authorization {
                source_id: SOURCE,
                cause,
            })?;

        let credential = Credential::issued_now(token);
        if let Err(e) = self.store.save(&credential) {
            warn!(
                "Failed to persist access token to {}: {}",
                self.store.path().display(),
                e
            );
        }
        Ok(credential.token)
    }

    fn get(&self, url: &str, api_key: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("x-api-key", api_key)
            .header(header::USER_AGENT, USER_AGENT)
            .bearer_auth(token)
    }

    /// Look the symbol up in the exchange's master contract.
    async fn resolve_symbol(
        &self,
        api_key: &str,
        token: &str,
        exchange: &str,
        symbol: &str,
    ) -> Result<Option<ContractEntry>, SourceError> {
        let url = format!("{}/index/masterContract/{}", self.base_url, encode(exchange));
        debug!("Fetching master contract for {}", exchange);

        let response = self
            .get(&url, api_key, token)
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, response).await?;
        let envelope: UpstoxEnvelope<MasterContractData> = read_json(SOURCE, response).await?;

        let text = envelope.data.map(MasterContractData::into_csv).ok_or_else(|| {
            SourceError::parse(
                SOURCE,
                format!(
                    "master contract for {} has no data: {}",
                    exchange,
                    envelope.message.unwrap_or_default()
                ),
            )
        })?;

        find_contract(&text, symbol)
    }

    async fn fetch_candles(
        &self,
        api_key: &str,
        token: &str,
        contract: &ContractEntry,
        request: &InstrumentRequest,
    ) -> Result<Vec<UpstoxCandle>, SourceError> {
        let url = format!(
            "{}/historical/{}/{}/{}",
            self.base_url,
            encode(&contract.exchange),
            encode(&contract.symbol.to_lowercase()),
            interval_code(request.interval)
        );
        let start = request.start_date.format(VENDOR_DATE_FORMAT).to_string();
        let end = request.end_date.format(VENDOR_DATE_FORMAT).to_string();

        let response = self
            .get(&url, api_key, token)
            .query(&[
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, response).await?;
        let envelope: UpstoxEnvelope<Vec<UpstoxCandle>> = read_json(SOURCE, response).await?;

        if let Some(code) = envelope.code.filter(|code| *code != 200) {
            return Err(SourceError::Transport {
                source_id: SOURCE,
                message: format!(
                    "API code {}: {}",
                    code,
                    envelope.message.unwrap_or_default()
                ),
            });
        }
        Ok(envelope.data.unwrap_or_default())
    }

    async fn fetch_series(
        &self,
        api_key: &str,
        request: &InstrumentRequest,
    ) -> Result<NormalizedSeries, SourceError> {
        let token = self.access_token().await?;
        let exchange = vendor_exchange(request.ticker.exchange());

        let contract = self
            .resolve_symbol(api_key, &token, &exchange, request.ticker.symbol())
            .await?
            .ok_or_else(|| SourceError::SymbolNotFound {
                source_id: SOURCE,
                symbol: request.ticker.to_string(),
            })?;

        let candles = self.fetch_candles(api_key, &token, &contract, request).await?;
        debug!(
            "Received {} candles for {} ({})",
            candles.len(),
            request.ticker,
            request.interval
        );

        let mut raw = RawTable::new(
            UpstoxCandle::COLUMNS.iter().map(|c| c.to_string()).collect(),
            TimestampFormat::EpochMillis {
                column: "timestamp".to_string(),
            },
        );
        for candle in candles {
            raw.push_row(candle.into_row());
        }

        normalize(&raw, request.ticker.as_str(), SOURCE)
    }
}

/// Find `symbol` (case-insensitively) in master contract CSV text.
fn find_contract(text: &str, symbol: &str) -> Result<Option<ContractEntry>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    for record in reader.deserialize::<ContractEntry>() {
        match record {
            Ok(entry) if entry.symbol.eq_ignore_ascii_case(symbol) => return Ok(Some(entry)),
            Ok(_) => {}
            Err(e) if e.is_io_error() => {
                return Err(SourceError::parse(SOURCE, e.to_string()));
            }
            Err(e) => debug!("Skipping malformed master contract line: {}", e),
        }
    }
    Ok(None)
}

#[async_trait]
impl SourceAdapter for UpstoxAdapter {
    fn id(&self) -> SourceId {
        SOURCE
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        &Interval::ALL
    }

    async fn fetch(&self, request: &InstrumentRequest) -> Result<NormalizedSeries, SourceError> {
        let api_key = self.api_key()?;

        match self.fetch_series(api_key, request).await {
            Err(error @ SourceError::Unauthorized { .. }) => {
                info!("Access token rejected, clearing stored credential");
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear stored access token: {}", e);
                }
                Err(error)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "exchange,token,symbol,name,closing_price\n\
        NSE_EQ,2885,RELIANCE,RELIANCE INDUSTRIES LTD,1172.1\n\
        NSE_EQ,3045,SBIN,STATE BANK OF INDIA,291.3\n";

    #[test]
    fn test_interval_vocabulary() {
        let codes: Vec<&str> = Interval::ALL.iter().map(|i| interval_code(*i)).collect();
        assert_eq!(
            codes,
            vec![
                "TICK", "1MINUTE", "5MINUTE", "10MINUTE", "30MINUTE", "60MINUTE", "1DAY",
                "1WEEK", "1MONTH"
            ]
        );
    }

    #[test]
    fn test_vendor_exchange_mapping() {
        assert_eq!(vendor_exchange("NSE"), "NSE_EQ");
        assert_eq!(vendor_exchange("BSE"), "BSE_EQ");
        assert_eq!(vendor_exchange("MCX_FO"), "MCX_FO");
    }

    #[test]
    fn test_find_contract() {
        let entry = find_contract(CONTRACT, "sbin").unwrap().unwrap();
        assert_eq!(entry.exchange, "NSE_EQ");
        assert_eq!(entry.token.as_deref(), Some("3045"));
        assert_eq!(entry.symbol, "SBIN");

        assert!(find_contract(CONTRACT, "TCS").unwrap().is_none());
    }

    #[test]
    fn test_master_contract_lines_join() {
        let data: MasterContractData = serde_json::from_value(serde_json::json!([
            "exchange,token,symbol",
            "BSE_EQ,500325,RELIANCE"
        ]))
        .unwrap();
        let entry = find_contract(&data.into_csv(), "RELIANCE").unwrap().unwrap();
        assert_eq!(entry.exchange, "BSE_EQ");
    }

    #[test]
    fn test_candle_row_keeps_column_order() {
        let candle: UpstoxCandle = serde_json::from_value(serde_json::json!({
            "timestamp": "1543622400000",
            "open": 1170.0,
            "high": "1180.5",
            "low": 1160.0,
            "close": 1172.1,
            "volume": 100,
            "cp": 1165.0
        }))
        .unwrap();
        let row = candle.into_row();
        assert_eq!(row.len(), UpstoxCandle::COLUMNS.len());
        assert_eq!(row[0], "1543622400000");
        assert_eq!(row[2], "1180.5");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = TickerStoreConfig {
            access_token_file_path: dir.path().join("token.json"),
            ..Default::default()
        };
        let adapter = UpstoxAdapter::new(&config, reqwest::Client::new());
        let request = InstrumentRequest::parse(
            "NSE:RELIANCE",
            "01/12/2018",
            "03/12/2018",
            Interval::Day1,
        )
        .unwrap();

        let err = adapter.fetch(&request).await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_missing_secret_without_token_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TickerStoreConfig {
            access_token_file_path: dir.path().join("token.json"),
            ..Default::default()
        };
        config.upstox.api_key = Some("key".to_string());
        let adapter = UpstoxAdapter::new(&config, reqwest::Client::new());

        let err = adapter.access_token().await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured { .. }));
    }
}
