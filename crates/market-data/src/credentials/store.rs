use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local, TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::errors::CredentialError;

/// Access token plus the instant it was issued.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            issued_at,
        }
    }

    /// A credential issued right now.
    pub fn issued_now(token: impl Into<String>) -> Self {
        Self::new(token, Utc::now())
    }

    /// Token prefix safe to show in logs.
    pub fn masked(&self) -> String {
        mask_token(&self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.masked())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

pub(crate) fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}***", prefix)
}

/// On-disk shape of the credential record.
#[derive(Serialize, Deserialize)]
struct CredentialRecord {
    access_token: String,
    /// Epoch seconds.
    time: i64,
}

/// File-backed store for the single brokerage access token.
///
/// Reads and writes are serialised within the process; writes go to a
/// temporary sibling file that is then renamed over the record, so a reader
/// never observes a partial write.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the persisted credential.
    ///
    /// A missing, empty or malformed record is reported as `None`.
    pub fn load(&self) -> Option<Credential> {
        let _guard = self.guard();

        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credential record at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read credential record {}: {}", self.path.display(), e);
                return None;
            }
        };

        let record: CredentialRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Ignoring malformed credential record {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        let Some(issued_at) = Utc.timestamp_opt(record.time, 0).single() else {
            warn!(
                "Ignoring credential record {} with invalid time {}",
                self.path.display(),
                record.time
            );
            return None;
        };

        Some(Credential::new(record.access_token, issued_at))
    }

    /// Whether `credential` must be renewed when checked at `now`.
    pub fn is_stale(&self, credential: &Credential, now: DateTime<Local>) -> bool {
        is_stale_in(credential, &now)
    }

    /// Replace the persisted record.
    pub fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        let _guard = self.guard();

        let record = CredentialRecord {
            access_token: credential.token.clone(),
            time: credential.issued_at.timestamp(),
        };
        let json = serde_json::to_vec(&record)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(
            "Saved credential {} to {}",
            credential.masked(),
            self.path.display()
        );
        Ok(())
    }

    /// Remove the persisted record, if any.
    pub fn clear(&self) -> Result<(), CredentialError> {
        let _guard = self.guard();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Day-boundary staleness: a credential is valid only on the calendar day
/// (in `now`'s time zone) on which it was issued.
pub fn is_stale_in<Tz: TimeZone>(credential: &Credential, now: &DateTime<Tz>) -> bool {
    let issued_day = credential
        .issued_at
        .with_timezone(&now.timezone())
        .date_naive();
    issued_day != now.date_naive()
}
