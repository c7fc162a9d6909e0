//! Expiry index: absolute expiry second to the sessions expiring then.

use std::collections::HashMap;

/// Current wall-clock time in whole seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Secondary index from expiry second to session tokens.
///
/// Every live session appears in exactly one bucket, the one matching its
/// record's expiry. Buckets are dropped as soon as they become empty.
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    buckets: HashMap<i64, Vec<String>>,
}

impl ExpiryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token under its expiry second.
    pub fn insert(&mut self, expires_at: i64, token: &str) {
        self.buckets
            .entry(expires_at)
            .or_default()
            .push(token.to_string());
    }

    /// Remove a token from the bucket for `expires_at`.
    ///
    /// Returns true if the token was present.
    pub fn remove(&mut self, expires_at: i64, token: &str) -> bool {
        let Some(bucket) = self.buckets.get_mut(&expires_at) else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|t| t != token);
        let removed = bucket.len() != before;

        if bucket.is_empty() {
            self.buckets.remove(&expires_at);
        }

        removed
    }

    /// Tokens expiring at exactly `at`, if any.
    pub fn bucket(&self, at: i64) -> Option<&[String]> {
        self.buckets.get(&at).map(Vec::as_slice)
    }

    /// Whether the token is registered under `expires_at`.
    pub fn contains(&self, expires_at: i64, token: &str) -> bool {
        self.bucket(expires_at)
            .is_some_and(|bucket| bucket.iter().any(|t| t == token))
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if no bucket is tracked.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_bucket() {
        let mut index = ExpiryIndex::new();
        index.insert(100, "a");
        index.insert(100, "b");
        index.insert(101, "c");

        assert_eq!(index.len(), 2);
        assert_eq!(index.bucket(100), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(index.contains(101, "c"));
        assert!(!index.contains(100, "c"));
        assert!(index.bucket(102).is_none());
    }

    #[test]
    fn test_remove_drops_empty_bucket() {
        let mut index = ExpiryIndex::new();
        index.insert(100, "a");
        index.insert(100, "b");

        assert!(index.remove(100, "a"));
        assert_eq!(index.len(), 1);
        assert!(index.contains(100, "b"));

        assert!(index.remove(100, "b"));
        assert!(index.is_empty());

        assert!(!index.remove(100, "b"));
    }

    #[test]
    fn test_remove_leaves_other_tokens() {
        let mut index = ExpiryIndex::new();
        index.insert(100, "a");
        index.insert(100, "b");

        assert!(!index.remove(101, "a"));
        assert!(!index.remove(100, "z"));
        assert_eq!(index.bucket(100).map(<[String]>::len), Some(2));
    }

    #[test]
    fn test_clear() {
        let mut index = ExpiryIndex::new();
        index.insert(1, "a");
        index.insert(2, "b");
        index.clear();
        assert!(index.is_empty());
    }
}
