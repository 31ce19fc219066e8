//! Per-test isolated home directories.
//!
//! The CLI under test keeps its target URL and session tokens under the
//! user's home directory, so every test gets a fresh one. The directory is
//! handed to child processes through environment overrides; the harness
//! never rewrites its own process environment, which keeps parallel tests
//! from seeing each other's home.

use crate::errors::{HarnessError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Environment variable the platform uses for the user's home directory.
pub const HOME_VAR: &str = if cfg!(windows) { "USERPROFILE" } else { "HOME" };

/// Prefix of fixture directory names.
pub const FIXTURE_PREFIX: &str = "cm-test";

/// An isolated home directory owned by exactly one test.
///
/// Dropping the fixture removes the directory, so it is released on every
/// exit path including panics. Call [`FixtureEnvironment::release`] to have
/// removal failures reported instead of logged.
#[derive(Debug)]
pub struct FixtureEnvironment {
    home: Option<TempDir>,
    env_overrides: BTreeMap<String, String>,
}

impl FixtureEnvironment {
    pub fn acquire() -> Result<Self> {
        let home = tempfile::Builder::new()
            .prefix(FIXTURE_PREFIX)
            .tempdir()
            .map_err(|e| HarnessError::fixture(FIXTURE_PREFIX, e.to_string()))?;

        let mut env_overrides = BTreeMap::new();
        env_overrides.insert(
            HOME_VAR.to_string(),
            home.path().to_string_lossy().into_owned(),
        );

        debug!("Acquired fixture home {}", home.path().display());
        Ok(Self {
            home: Some(home),
            env_overrides,
        })
    }

    /// Adds an environment override for processes spawned in this fixture.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn home_dir(&self) -> &Path {
        match &self.home {
            Some(home) => home.path(),
            None => Path::new(""),
        }
    }

    #[must_use]
    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env_overrides
    }

    /// Removes the home directory tree.
    pub fn release(mut self) -> Result<()> {
        match self.home.take() {
            Some(home) => {
                let path = home.path().display().to_string();
                debug!("Releasing fixture home {}", path);
                home.close().map_err(|e| HarnessError::fixture(path, e.to_string()))
            }
            None => Ok(()),
        }
    }
}

impl Drop for FixtureEnvironment {
    fn drop(&mut self) {
        if let Some(home) = self.home.take() {
            let path = home.path().to_path_buf();
            if let Err(e) = home.close() {
                warn!("Failed to remove fixture home {}: {}", path.display(), e);
            }
        }
    }
}
