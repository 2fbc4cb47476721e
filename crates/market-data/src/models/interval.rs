use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Bar granularity of a historical request.
///
/// Each variant also carries a stable numeric code (`1..=9`) so callers that
/// configure intervals numerically keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Tick,
    #[serde(rename = "minute_1")]
    Minute1,
    #[serde(rename = "minute_5")]
    Minute5,
    #[serde(rename = "minute_10")]
    Minute10,
    #[serde(rename = "minute_30")]
    Minute30,
    #[serde(rename = "minute_60")]
    Minute60,
    #[serde(rename = "day_1")]
    Day1,
    #[serde(rename = "week_1")]
    Week1,
    #[serde(rename = "month_1")]
    Month1,
}

impl Interval {
    pub const ALL: [Self; 9] = [
        Self::Tick,
        Self::Minute1,
        Self::Minute5,
        Self::Minute10,
        Self::Minute30,
        Self::Minute60,
        Self::Day1,
        Self::Week1,
        Self::Month1,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Minute1 => "minute_1",
            Self::Minute5 => "minute_5",
            Self::Minute10 => "minute_10",
            Self::Minute30 => "minute_30",
            Self::Minute60 => "minute_60",
            Self::Day1 => "day_1",
            Self::Week1 => "week_1",
            Self::Month1 => "month_1",
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Tick => 1,
            Self::Minute1 => 2,
            Self::Minute5 => 3,
            Self::Minute10 => 4,
            Self::Minute30 => 5,
            Self::Minute60 => 6,
            Self::Day1 => 7,
            Self::Week1 => 8,
            Self::Month1 => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|interval| interval.code() == code)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if let Ok(code) = normalized.parse::<u8>() {
            return Self::from_code(code).ok_or(ValidationError::UnknownInterval(normalized));
        }

        match normalized.as_str() {
            "tick" => Ok(Self::Tick),
            "minute_1" | "1m" => Ok(Self::Minute1),
            "minute_5" | "5m" => Ok(Self::Minute5),
            "minute_10" | "10m" => Ok(Self::Minute10),
            "minute_30" | "30m" => Ok(Self::Minute30),
            "minute_60" | "60m" | "1h" => Ok(Self::Minute60),
            "day_1" | "1d" => Ok(Self::Day1),
            "week_1" | "1w" => Ok(Self::Week1),
            "month_1" | "1mo" => Ok(Self::Month1),
            _ => Err(ValidationError::UnknownInterval(normalized)),
        }
    }
}
