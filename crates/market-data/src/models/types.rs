use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Identifier of an upstream data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceId {
    /// Authenticated brokerage API.
    Upstox,
    /// Public exchange data feed.
    Nse,
}

impl SourceId {
    pub const ALL: [SourceId; 2] = [SourceId::Upstox, SourceId::Nse];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upstox => "UPSTOX",
            Self::Nse => "NSE",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownSource(trimmed.to_string()))
    }
}

/// Ordered list of sources tried by the orchestrator.
pub type FetchOrder = Vec<SourceId>;

/// The built-in fetch order: brokerage first, public exchange as fallback.
pub fn default_fetch_order() -> FetchOrder {
    vec![SourceId::Upstox, SourceId::Nse]
}

/// Parse a comma separated list of source ids, e.g. `"nse, upstox"`.
pub fn parse_fetch_order(input: &str) -> Result<FetchOrder, ValidationError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(SourceId::from_str)
        .collect()
}
