//! Persistence layer for the round history.
//!
//! The ledger writes through a `RoundStore` after every mutation. A JSON
//! file is sufficient for a single agent; the in-memory store backs tests
//! and runs without a configured path.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::types::Round;

/// Durable backend for the round history.
pub trait RoundStore: Send + Sync {
    /// Load every stored round (any order).
    fn load(&self) -> Result<Vec<Round>>;

    /// Replace the stored history with `rounds`.
    fn save(&self, rounds: &[Round]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    rounds: Mutex<Vec<Round>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoundStore for MemoryStore {
    fn load(&self) -> Result<Vec<Round>> {
        let rounds = self
            .rounds
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(rounds.clone())
    }

    fn save(&self, rounds: &[Round]) -> Result<()> {
        let mut stored = self
            .rounds
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *stored = rounds.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl RoundStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Round>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No round history found, starting fresh");
            return Ok(Vec::new());
        }

        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read rounds from {}", self.path.display()))?;
        let rounds: Vec<Round> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse rounds from {}", self.path.display()))?;

        info!(path = %self.path.display(), rounds = rounds.len(), "Round history loaded");
        Ok(rounds)
    }

    fn save(&self, rounds: &[Round]) -> Result<()> {
        let json = serde_json::to_string_pretty(rounds).context("Failed to serialise rounds")?;

        // Atomic replace: write a sibling file, then rename.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write rounds to {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), rounds = rounds.len(), "Rounds saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
