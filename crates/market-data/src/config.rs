//! Explicit configuration for the ticker store.
//!
//! Every setting is resolved once, with this precedence:
//! explicit [`ConfigOptions`] value, then the optional dotenv file, then the
//! process environment, then the built-in default. The dotenv file is read
//! into a local map, so resolving a config never mutates the process
//! environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use urlencoding::encode;

use crate::errors::ConfigError;
use crate::models::{default_fetch_order, parse_fetch_order, FetchOrder};

pub const ENV_UPSTOX_API_KEY: &str = "UPSTOX_API_KEY";
pub const ENV_UPSTOX_API_SECRET: &str = "UPSTOX_API_SECRET";
pub const ENV_UPSTOX_REDIRECT_URI: &str = "UPSTOX_REDIRECT_URI";
pub const ENV_UPSTOX_AUTH_PAGE: &str = "UPSTOX_AUTH_PAGE";
pub const ENV_LEGACY_AUTH_PAGE: &str = "TEMP_SERVER_AUTH_PAGE";
pub const ENV_UPSTOX_BASE_URL: &str = "UPSTOX_BASE_URL";
pub const ENV_NSE_BASE_URL: &str = "NSE_BASE_URL";
pub const ENV_ACCESS_TOKEN_FILE: &str = "TICKERSTORE_ACCESS_TOKEN_FILE";
pub const ENV_ON_EXHAUSTION: &str = "TICKERSTORE_ON_EXHAUSTION";
pub const ENV_FETCH_ORDER: &str = "TICKERSTORE_FETCH_ORDER";
pub const ENV_AUTH_TIMEOUT_SECS: &str = "TICKERSTORE_AUTH_TIMEOUT_SECS";

pub const DEFAULT_UPSTOX_BASE_URL: &str = "https://api.upstox.com";
pub const DEFAULT_NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const DEFAULT_AUTH_PAGE: &str = "http://127.0.0.1:5000/";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:5000/callback";
pub const DEFAULT_ACCESS_TOKEN_FILE: &str = "access_token.file";
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the orchestrator does once every source in the fetch order failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Fail with `TickerStoreError::NoSourceProvidedData`.
    #[default]
    Fail,
    /// Return an empty series.
    ReturnEmpty,
}

impl FromStr for ExhaustionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail" => Ok(Self::Fail),
            "return_empty" | "empty" => Ok(Self::ReturnEmpty),
            _ => Err(ConfigError::Invalid {
                key: ENV_ON_EXHAUSTION,
                value: s.to_string(),
            }),
        }
    }
}

/// Construction-time inputs. Unset fields fall back to dotenv / environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub dotenv_path: Option<PathBuf>,
    pub upstox_api_key: Option<String>,
    pub upstox_api_secret: Option<String>,
    pub upstox_redirect_uri: Option<String>,
    pub upstox_auth_page: Option<String>,
    pub access_token_file_path: Option<PathBuf>,
    pub on_exhaustion: Option<ExhaustionPolicy>,
    pub fetch_order: Option<FetchOrder>,
}

/// Settings of the authenticated brokerage source.
#[derive(Clone)]
pub struct UpstoxConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub redirect_uri: String,
    /// Local page the user opens to start the login; also where the callback
    /// endpoint listens.
    pub auth_page: String,
    pub base_url: String,
}

impl UpstoxConfig {
    /// Vendor-hosted login page the callback endpoint redirects to.
    pub fn login_url(&self, api_key: &str) -> String {
        format!(
            "{}/index/dialog/authorize?apiKey={}&redirect_uri={}&response_type=code",
            self.base_url,
            encode(api_key),
            encode(&self.redirect_uri)
        )
    }
}

impl Default for UpstoxConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            auth_page: DEFAULT_AUTH_PAGE.to_string(),
            base_url: DEFAULT_UPSTOX_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for UpstoxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstoxConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<set>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_page", &self.auth_page)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Fully resolved configuration, passed by reference to the adapters.
#[derive(Debug, Clone)]
pub struct TickerStoreConfig {
    pub upstox: UpstoxConfig,
    pub nse_base_url: String,
    pub access_token_file_path: PathBuf,
    pub on_exhaustion: ExhaustionPolicy,
    pub fetch_order: FetchOrder,
    /// Upper bound on the interactive login wait; `None` waits forever.
    pub auth_timeout: Option<Duration>,
    pub request_timeout: Duration,
}

impl Default for TickerStoreConfig {
    fn default() -> Self {
        Self {
            upstox: UpstoxConfig::default(),
            nse_base_url: DEFAULT_NSE_BASE_URL.to_string(),
            access_token_file_path: PathBuf::from(DEFAULT_ACCESS_TOKEN_FILE),
            on_exhaustion: ExhaustionPolicy::default(),
            fetch_order: default_fetch_order(),
            auth_timeout: Some(DEFAULT_AUTH_TIMEOUT),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl TickerStoreConfig {
    /// Resolve options against the process environment.
    pub fn resolve(options: ConfigOptions) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::resolve_with_env(options, &env)
    }

    /// Resolve options against an explicit environment map.
    pub fn resolve_with_env(
        options: ConfigOptions,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let dotenv = match &options.dotenv_path {
            Some(path) => read_dotenv(path)?,
            None => HashMap::new(),
        };
        let lookup = Lookup { dotenv: &dotenv, env };
        let defaults = Self::default();

        let on_exhaustion = match options.on_exhaustion {
            Some(policy) => policy,
            None => lookup
                .get(ENV_ON_EXHAUSTION)
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or(defaults.on_exhaustion),
        };

        let fetch_order = match options.fetch_order {
            Some(order) => order,
            None => match lookup.get(ENV_FETCH_ORDER) {
                Some(value) => parse_fetch_order(&value).map_err(|_| ConfigError::Invalid {
                    key: ENV_FETCH_ORDER,
                    value,
                })?,
                None => defaults.fetch_order,
            },
        };

        let auth_timeout = match lookup.get(ENV_AUTH_TIMEOUT_SECS) {
            Some(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: ENV_AUTH_TIMEOUT_SECS,
                    value: value.clone(),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => defaults.auth_timeout,
        };

        let upstox = UpstoxConfig {
            api_key: options.upstox_api_key.or_else(|| lookup.get(ENV_UPSTOX_API_KEY)),
            api_secret: options
                .upstox_api_secret
                .or_else(|| lookup.get(ENV_UPSTOX_API_SECRET)),
            redirect_uri: options
                .upstox_redirect_uri
                .or_else(|| lookup.get(ENV_UPSTOX_REDIRECT_URI))
                .unwrap_or(defaults.upstox.redirect_uri),
            auth_page: options
                .upstox_auth_page
                .or_else(|| lookup.get(ENV_UPSTOX_AUTH_PAGE))
                .or_else(|| lookup.get(ENV_LEGACY_AUTH_PAGE))
                .unwrap_or(defaults.upstox.auth_page),
            base_url: lookup
                .get(ENV_UPSTOX_BASE_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstox.base_url),
        };

        let config = Self {
            upstox,
            nse_base_url: lookup
                .get(ENV_NSE_BASE_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.nse_base_url),
            access_token_file_path: options
                .access_token_file_path
                .or_else(|| lookup.get(ENV_ACCESS_TOKEN_FILE).map(PathBuf::from))
                .unwrap_or(defaults.access_token_file_path),
            on_exhaustion,
            fetch_order,
            auth_timeout,
            request_timeout: defaults.request_timeout,
        };

        debug!("Resolved ticker store config: {:?}", config);
        Ok(config)
    }
}

struct Lookup<'a> {
    dotenv: &'a HashMap<String, String>,
    env: &'a HashMap<String, String>,
}

impl Lookup<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.dotenv
            .get(key)
            .or_else(|| self.env.get(key))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let to_error = |e: dotenvy::Error| ConfigError::Dotenv {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    dotenvy::from_path_iter(path)
        .map_err(to_error)?
        .map(|item| item.map_err(to_error))
        .collect()
}
