/*!
 * Secret Types
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Private, access-controlled copy of an application's secrets
///
/// The consumer process reads `location` at its own startup; this value
/// never carries the secret content itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StagedSecret {
    user: String,
    location: PathBuf,
    source_checksum: String,
    mode: u32,
}

impl StagedSecret {
    pub(crate) fn new(user: String, location: PathBuf, source_checksum: String, mode: u32) -> Self {
        Self {
            user,
            location,
            source_checksum,
            mode,
        }
    }

    /// Account that may read the staged file
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Path contract consumed by the application process
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Hex SHA-256 of the source at staging time
    pub fn source_checksum(&self) -> &str {
        &self.source_checksum
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }
}

/// Per-account directory found in the secrets tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StagedAccount {
    pub user: String,
    /// Application recorded by the owner marker, if any
    pub application: Option<String>,
}

impl StagedAccount {
    /// Application the secret belongs to; unmarked accounts are named after it
    pub fn app(&self) -> &str {
        self.application.as_deref().unwrap_or(&self.user)
    }
}

/// What a staging call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// New content was written and renamed into place
    Written,
    /// Target already matched the source; nothing touched
    Unchanged,
}

/// Staging statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StagerStats {
    pub writes: u64,
    pub unchanged: u64,
    pub removals: u64,
}

#[derive(Debug, Default)]
pub(crate) struct AtomicStagerStats {
    writes: AtomicU64,
    unchanged: AtomicU64,
    removals: AtomicU64,
}

impl AtomicStagerStats {
    pub(crate) fn record(&self, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Written => self.writes.fetch_add(1, Ordering::Relaxed),
            StageOutcome::Unchanged => self.unchanged.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StagerStats {
        StagerStats {
            writes: self.writes.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}
