//! Page fixtures for the harness: JSON files describing a host page.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use catjam_engine::memory::PageFixture;

pub fn load_fixture(path: &Path) -> Result<PageFixture> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture {:?}", path))?;
    let fixture = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fixture {:?}", path))?;
    Ok(fixture)
}

/// Re-reads a fixture file whenever its modification time changes.
#[derive(Debug)]
pub struct FixtureWatcher {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl FixtureWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The fixture, if it is new or changed since the last successful poll.
    /// A file that fails to parse is retried on the next poll.
    pub fn poll(&mut self) -> Result<Option<PageFixture>> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat fixture {:?}", self.path))?;
        if self.modified == Some(modified) {
            return Ok(None);
        }
        let fixture = load_fixture(&self.path)?;
        self.modified = Some(modified);
        Ok(Some(fixture))
    }
}
