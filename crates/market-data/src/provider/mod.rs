//! Source adapters and their shared HTTP plumbing.
//!
//! This module contains:
//! - The [`SourceAdapter`] trait every source implements
//! - [`UpstoxAdapter`]: authenticated brokerage source, all intervals
//! - [`NseAdapter`]: public exchange source, daily bars only

mod traits;

pub mod nse;
pub mod upstox;

pub use nse::NseAdapter;
pub use traits::SourceAdapter;
pub use upstox::UpstoxAdapter;

use log::debug;
use reqwest::{Response, StatusCode};

use crate::errors::SourceError;
use crate::models::SourceId;

/// Browser-like user agent; both vendors reject bare HTTP clients.
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Dates in vendor query strings.
pub(crate) const VENDOR_DATE_FORMAT: &str = "%d-%m-%Y";

const MAX_ERROR_BODY: usize = 200;

/// Map a non-2xx response onto the matching [`SourceError`].
pub(crate) async fn check_status(
    source_id: SourceId,
    response: Response,
) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    debug!("{} responded {}: {}", source_id, status, body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized {
            source_id,
            message: format!("HTTP {}", status),
        },
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { source_id },
        _ => SourceError::Transport {
            source_id,
            message: format!("HTTP {}: {}", status, body),
        },
    })
}

/// Decode a JSON body, reporting failures as parse errors.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    source_id: SourceId,
    response: Response,
) -> Result<T, SourceError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| SourceError::transport(source_id, e))?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::parse(source_id, e.to_string()))
}
