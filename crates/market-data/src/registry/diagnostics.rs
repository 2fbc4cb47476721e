//! Per-call record of which sources were tried and how each fared.

use crate::models::SourceId;

/// Record of a single source attempt during a fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceAttempt {
    pub source: SourceId,
    pub error: Option<String>,
    pub success: bool,
}

/// Ordered list of attempts made by one `historical_data` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchDiagnostics {
    pub attempts: Vec<SourceAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, source: SourceId, error: String) {
        self.attempts.push(SourceAttempt {
            source,
            error: Some(error),
            success: false,
        });
    }

    pub fn record_success(&mut self, source: SourceId) {
        self.attempts.push(SourceAttempt {
            source,
            error: None,
            success: true,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no sources tried".to_string();
        }
        self.attempts
            .iter()
            .map(|a| match (&a.error, a.success) {
                (_, true) => format!("{}: SUCCESS", a.source),
                (Some(err), false) => format!("{}: ERROR ({})", a.source, err),
                (None, false) => format!("{}: UNKNOWN", a.source),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Sources that failed, with their error text.
    pub fn errors(&self) -> Vec<(SourceId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref().map(|e| (a.source, e)))
            .collect()
    }
}
