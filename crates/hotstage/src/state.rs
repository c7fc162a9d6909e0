//! Per-server client state.
//!
//! The CLI keeps one session token per server URL in `client-state.json`
//! under the config directory. A token is created on the first upload and
//! dropped once a reload has been attempted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name of the client state inside the config directory.
pub const STATE_FILE: &str = "client-state.json";

/// Session tokens keyed by server URL.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(default)]
    sessions: BTreeMap<String, String>,

    #[serde(skip)]
    path: PathBuf,
}

impl ClientState {
    /// Default location of the state file.
    pub fn default_path() -> PathBuf {
        hotstage_config::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(STATE_FILE)
    }

    /// Load the state at the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load the state at `path`, starting empty if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut state = if path.is_file() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        state.path = path.to_path_buf();
        Ok(state)
    }

    /// Write the state back to where it was loaded from.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Token for `server`, if a session was started.
    pub fn token(&self, server: &str) -> Option<&str> {
        self.sessions.get(server).map(String::as_str)
    }

    /// Token for `server`, creating a fresh v4 UUID on first use.
    pub fn token_or_create(&mut self, server: &str) -> String {
        self.sessions
            .entry(server.to_string())
            .or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    /// Forget the token for `server`.
    pub fn reset(&mut self, server: &str) -> bool {
        self.sessions.remove(server).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_created_once_per_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ClientState::load_from(&dir.path().join(STATE_FILE)).unwrap();

        assert!(state.token("http://a:8080").is_none());
        let first = state.token_or_create("http://a:8080");
        assert_eq!(state.token_or_create("http://a:8080"), first);
        assert!(uuid::Uuid::parse_str(&first).is_ok());

        let other = state.token_or_create("http://b:8080");
        assert_ne!(first, other);
    }

    #[test]
    fn test_state_persists_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(STATE_FILE);

        let mut state = ClientState::load_from(&path).unwrap();
        let token = state.token_or_create("http://a:8080");
        state.save().unwrap();

        let mut reloaded = ClientState::load_from(&path).unwrap();
        assert_eq!(reloaded.token("http://a:8080"), Some(token.as_str()));

        assert!(reloaded.reset("http://a:8080"));
        assert!(!reloaded.reset("http://a:8080"));
        reloaded.save().unwrap();

        let cleared = ClientState::load_from(&path).unwrap();
        assert!(cleared.token("http://a:8080").is_none());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);
        std::fs::write(&path, "not json").unwrap();

        assert!(ClientState::load_from(&path).is_err());
    }
}
