//! Capacity-bounded staging store with absolute expiry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::entry::{ConfigCategory, ConfigEntrySet};
use crate::error::{Error, Result};
use crate::ttl::{ExpiryIndex, unix_now};

/// One session's staged directories and its expiry second.
#[derive(Debug, Clone)]
struct SessionRecord {
    directories: HashMap<String, ConfigEntrySet>,
    expires_at: i64,
}

/// Owned copy of a live session, detached from the store's lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session token.
    pub token: String,

    /// Absolute expiry, seconds since the Unix epoch.
    pub expires_at: i64,

    /// Entry sets keyed by absolute directory path.
    pub directories: HashMap<String, ConfigEntrySet>,
}

impl SessionSnapshot {
    /// Entry set for a directory.
    pub fn directory(&self, dir: &str) -> Option<&ConfigEntrySet> {
        self.directories.get(dir)
    }

    /// True if no directory received an upload.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

/// Primary map and expiry index, always mutated together.
#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<String, SessionRecord>,
    expiry: ExpiryIndex,
}

impl StoreInner {
    /// Get a live record, evicting it first if its expiry has passed.
    fn live_record(&mut self, token: &str, now: i64) -> Option<&mut SessionRecord> {
        let expires_at = self.sessions.get(token)?.expires_at;
        if expires_at <= now {
            debug!(session = %token, expires_at, "Session expired, evicting on access");
            self.evict(token);
            return None;
        }
        self.sessions.get_mut(token)
    }

    fn evict(&mut self, token: &str) -> bool {
        match self.sessions.remove(token) {
            Some(record) => {
                self.expiry.remove(record.expires_at, token);
                true
            }
            None => false,
        }
    }

    fn purge_expired(&mut self, now: i64) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, record)| record.expires_at <= now)
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            self.evict(token);
        }
        expired.len()
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Sessions currently held (expired ones are purged before counting).
    pub live: usize,

    /// Maximum number of live sessions.
    pub capacity: usize,

    /// Number of non-empty expiry buckets.
    pub expiry_buckets: usize,
}

/// Session staging store.
///
/// Maps a session token to the directories that received uploads during that
/// session. Every record carries an absolute expiry (second granularity) and
/// is indexed by it so the [`Sweeper`](crate::Sweeper) can evict a whole
/// second's worth of sessions in one locked pass.
///
/// All operations lock a single mutex for their critical section only; the
/// lock is never held across an `.await`. Clones share the same state.
///
/// Refusals (capacity reached, unknown token, backup already chosen) come back
/// as `false`/`None`. Only invalid arguments and missing targets for entry
/// mutations are errors.
#[derive(Clone)]
pub struct ExpiringSessionStore {
    inner: Arc<Mutex<StoreInner>>,
    config: StoreConfig,
}

impl ExpiringSessionStore {
    /// Create an empty store. No background task runs until
    /// [`spawn_sweeper`](Self::spawn_sweeper) is called.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create an empty session expiring `ttl_secs` from now.
    ///
    /// Refuses without mutating anything if `ttl_secs <= 0`, the token is
    /// empty or already live, or the store is at capacity. With the default
    /// capacity of one, exactly one of several racing callers wins.
    pub fn try_set(&self, token: &str, ttl_secs: i64) -> bool {
        if ttl_secs <= 0 || token.is_empty() {
            return false;
        }

        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);

        if inner.sessions.contains_key(token) {
            trace!(session = %token, "Session already set");
            return false;
        }
        if inner.sessions.len() >= self.config.capacity {
            debug!(
                session = %token,
                capacity = self.config.capacity,
                "Store at capacity, refusing session"
            );
            return false;
        }

        let expires_at = now.saturating_add(ttl_secs);
        inner.sessions.insert(
            token.to_string(),
            SessionRecord {
                directories: HashMap::new(),
                expires_at,
            },
        );
        inner.expiry.insert(expires_at, token);

        debug!(session = %token, expires_at, "Session created");
        true
    }

    /// Whether the token maps to an unexpired record. Evicts it if expired.
    pub fn is_live(&self, token: &str) -> bool {
        let now = unix_now();
        self.inner.lock().live_record(token, now).is_some()
    }

    /// Snapshot of a live session.
    pub fn get(&self, token: &str) -> Option<SessionSnapshot> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.live_record(token, now).map(|record| SessionSnapshot {
            token: token.to_string(),
            expires_at: record.expires_at,
            directories: record.directories.clone(),
        })
    }

    /// Delete one session. Returns true if it was present.
    pub fn remove(&self, token: &str) -> bool {
        let removed = self.inner.lock().evict(token);
        if removed {
            debug!(session = %token, "Session removed");
        }
        removed
    }

    /// Drop every session and the whole expiry index.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.sessions.len();
        inner.sessions.clear();
        inner.expiry.clear();
        debug!(count, "Store cleared");
    }

    /// Install an empty entry set for `dir` if the session has none. Idempotent.
    ///
    /// Returns false only when the session is not live.
    pub fn ensure_directory(&self, token: &str, dir: &str) -> bool {
        if token.is_empty() || dir.is_empty() {
            return false;
        }
        let now = unix_now();
        let mut inner = self.inner.lock();
        match inner.live_record(token, now) {
            Some(record) => {
                record.directories.entry(dir.to_string()).or_default();
                true
            }
            None => false,
        }
    }

    /// Record the backup directory for `dir`, once per session.
    ///
    /// Fails if the directory entry is missing or already has a backup.
    pub fn set_backup_dir(&self, token: &str, dir: &str, name: &str) -> bool {
        if token.is_empty() || dir.is_empty() || name.is_empty() {
            return false;
        }
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner
            .live_record(token, now)
            .and_then(|record| record.directories.get_mut(dir))
            .is_some_and(|entry| entry.set_backup_dir(name))
    }

    /// Backup directory chosen for `dir` in this session.
    pub fn backup_dir(&self, token: &str, dir: &str) -> Option<String> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner
            .live_record(token, now)
            .and_then(|record| record.directories.get(dir))
            .and_then(|entry| entry.backup_dir().map(str::to_string))
    }

    /// Record `path` under `category` for `dir`. No-op if already present.
    pub fn add_config_entry(
        &self,
        token: &str,
        dir: &str,
        path: &str,
        category: ConfigCategory,
    ) -> Result<()> {
        self.with_entry(token, dir, path, |entry| {
            if entry.insert(category, path) {
                trace!(session = %token, dir = %dir, path = %path, %category, "Config entry added");
            }
        })
    }

    /// Forget `path` under `category` for `dir`. No-op if absent.
    pub fn remove_config_entry(
        &self,
        token: &str,
        dir: &str,
        path: &str,
        category: ConfigCategory,
    ) -> Result<()> {
        self.with_entry(token, dir, path, |entry| {
            if entry.remove(category, path) {
                trace!(session = %token, dir = %dir, path = %path, %category, "Config entry removed");
            }
        })
    }

    /// Number of live sessions.
    pub fn size(&self) -> usize {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);
        inner.sessions.len()
    }

    /// Seconds until the session expires, or `None` if not live.
    pub fn time_to_live(&self, token: &str) -> Option<i64> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner
            .live_record(token, now)
            .map(|record| record.expires_at - now)
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);
        StoreStats {
            live: inner.sessions.len(),
            capacity: self.config.capacity,
            expiry_buckets: inner.expiry.len(),
        }
    }

    /// Tokens in the expiry bucket for second `at`.
    pub(crate) fn expiring_at(&self, at: i64) -> Option<Vec<String>> {
        self.inner.lock().expiry.bucket(at).map(<[String]>::to_vec)
    }

    /// Delete a batch of sessions that expire at second `at`.
    ///
    /// A token whose record has since been replaced with a different expiry
    /// is left alone. Returns the number of sessions removed.
    pub(crate) fn delete_expired(&self, at: i64, tokens: &[String]) -> usize {
        let mut inner = self.inner.lock();
        let mut removed = 0;
        for token in tokens {
            let matches = inner
                .sessions
                .get(token)
                .is_some_and(|record| record.expires_at == at);
            if matches {
                inner.sessions.remove(token);
                removed += 1;
            }
            inner.expiry.remove(at, token);
        }
        removed
    }

    fn with_entry<F>(&self, token: &str, dir: &str, path: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ConfigEntrySet),
    {
        if token.is_empty() {
            return Err(Error::EmptyArgument("token"));
        }
        if dir.is_empty() {
            return Err(Error::EmptyArgument("dir"));
        }
        if path.is_empty() {
            return Err(Error::EmptyArgument("path"));
        }

        let now = unix_now();
        let mut inner = self.inner.lock();
        let record = inner
            .live_record(token, now)
            .ok_or_else(|| Error::SessionNotFound(token.to_string()))?;
        let entry = record
            .directories
            .get_mut(dir)
            .ok_or_else(|| Error::DirectoryNotFound {
                token: token.to_string(),
                dir: dir.to_string(),
            })?;
        f(entry);
        Ok(())
    }

    #[cfg(test)]
    fn index_contains(&self, token: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(token)
            .is_some_and(|record| inner.expiry.contains(record.expires_at, token))
    }

    #[cfg(test)]
    fn expiry_buckets(&self) -> usize {
        self.inner.lock().expiry.len()
    }
}
