//! Turns a staged session into a reload target.

use std::path::Path;

use hotstage_session::{ConfigEntrySet, SessionSnapshot};
use tracing::{debug, trace};

use crate::address::{self, AddressPattern, ReloadTarget};
use crate::deployment::DeploymentMap;

/// Resolves what to reload for a session's staged uploads.
///
/// Any directory with staged XML or server configuration forces a full
/// reload. Otherwise each staged database is looked up in the
/// [`DeploymentMap`] and the matched patterns are reduced to one target.
pub struct ReloadResolver<'a> {
    deployment: &'a DeploymentMap,
}

impl<'a> ReloadResolver<'a> {
    pub fn new(deployment: &'a DeploymentMap) -> Self {
        Self { deployment }
    }

    /// Resolve the target for a session snapshot.
    pub fn resolve(&self, snapshot: &SessionSnapshot) -> ReloadTarget {
        self.resolve_entries(
            snapshot
                .directories
                .iter()
                .map(|(dir, entry)| (dir.as_str(), entry)),
        )
    }

    /// Resolve the target for `(directory, entry set)` pairs.
    pub fn resolve_entries<'e, I>(&self, entries: I) -> ReloadTarget
    where
        I: IntoIterator<Item = (&'e str, &'e ConfigEntrySet)>,
    {
        let mut matched: Vec<AddressPattern> = Vec::new();

        for (dir, entry) in entries {
            if entry.requires_full_reload() {
                debug!(dir = %dir, "Directory staged XML or server config, reloading everything");
                return ReloadTarget::All;
            }

            for path in entry.db_files() {
                let Some(name) = artifact_name(path) else {
                    continue;
                };
                let patterns = self.deployment.patterns(name);
                trace!(dir = %dir, artifact = %name, roles = patterns.len(), "Resolved staged database");
                matched.extend_from_slice(patterns);
            }
        }

        match address::reduce(&matched) {
            Some(pattern) => ReloadTarget::Selective(pattern),
            None => ReloadTarget::Nothing,
        }
    }
}

/// Artifact name of a staged database: its base name without `.db`.
pub fn artifact_name(path: &str) -> Option<&str> {
    let base = Path::new(path).file_name()?.to_str()?;
    Some(base.strip_suffix(".db").unwrap_or(base))
}
