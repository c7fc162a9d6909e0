//! Session lifecycle: admission, staging and reload.
//!
//! The coordinator owns the coarse lock that serialises multi-step staging
//! against other uploads and against reload. A [`StagingGuard`] holds that
//! lock for the duration of one upload's bookkeeping and file I/O; reload
//! holds it from snapshot through execution to the final clear.

use std::path::PathBuf;
use std::sync::Arc;

use hotstage_session::{ConfigCategory, ExpiringSessionStore, DEFAULT_TTL_SECS};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::address::ReloadTarget;
use crate::category::classify_upload;
use crate::deployment::{DeploymentMap, MONITOR_ROLE, RoleTable};
use crate::error::{ReloadError, Result};
use crate::executor::{ExecutionReport, ReloadExecutor};
use crate::resolver::ReloadResolver;

/// Status line reported when no process needs a reload.
pub const NOTHING_TO_RELOAD: &str = "nothing to reload";

/// Lifecycle phase of the staging slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No live session.
    Idle,
    /// A session is live and accepting uploads.
    Staging,
    /// A reload is computing its target.
    Resolving,
    /// A reload is executing.
    Reloading,
}

/// Settings for admission and reload.
#[derive(Debug, Clone)]
pub struct ReloadSettings {
    /// Deployment manifest, read fresh for every reload.
    pub manifest: PathBuf,

    /// Role name -> process pattern.
    pub roles: RoleTable,

    /// Roles never reloaded.
    pub skip_roles: Vec<String>,

    /// Lifetime of a new session in seconds.
    pub session_ttl_secs: i64,
}

impl ReloadSettings {
    pub fn new(manifest: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
            roles: RoleTable::builtin(),
            skip_roles: vec![MONITOR_ROLE.to_string()],
            session_ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_roles(mut self, roles: RoleTable) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_skip_roles(mut self, skip_roles: Vec<String>) -> Self {
        self.skip_roles = skip_roles;
        self
    }

    pub fn with_session_ttl_secs(mut self, ttl: i64) -> Self {
        self.session_ttl_secs = ttl;
        self
    }
}

/// What a reload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    /// Resolved target.
    pub target: ReloadTarget,

    /// Execution result. Always successful for [`ReloadTarget::Nothing`].
    pub report: ExecutionReport,
}

impl ReloadOutcome {
    pub fn success(&self) -> bool {
        self.report.success
    }
}

/// Per-directory counts in a [`SessionStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStatus {
    pub dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    pub db_files: usize,
    pub xml_files: usize,
    pub server_files: usize,
}

/// Status of the staging slot as seen by one token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: Phase,

    /// Whether the asking token is the live session.
    pub live: bool,

    /// Seconds left before the session expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<i64>,

    pub directories: Vec<DirectoryStatus>,
}

/// Coordinates uploads and reloads over one [`ExpiringSessionStore`].
pub struct ReloadCoordinator {
    store: ExpiringSessionStore,
    executor: Arc<dyn ReloadExecutor>,
    settings: ReloadSettings,
    lock: AsyncMutex<()>,
    active: Mutex<Option<Phase>>,
}

impl ReloadCoordinator {
    pub fn new(
        store: ExpiringSessionStore,
        executor: Arc<dyn ReloadExecutor>,
        settings: ReloadSettings,
    ) -> Self {
        Self {
            store,
            executor,
            settings,
            lock: AsyncMutex::new(()),
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &ExpiringSessionStore {
        &self.store
    }

    pub fn settings(&self) -> &ReloadSettings {
        &self.settings
    }

    /// Current phase of the staging slot.
    pub fn phase(&self) -> Phase {
        if let Some(phase) = *self.active.lock() {
            return phase;
        }
        if self.store.size() > 0 {
            Phase::Staging
        } else {
            Phase::Idle
        }
    }

    /// Admit `token` to staging and take the orchestration lock.
    ///
    /// If no session is live, `token` becomes the live session. The upload is
    /// then allowed only if `token` is the live session.
    pub async fn begin_upload(&self, token: &str) -> Result<StagingGuard<'_>> {
        if token.is_empty() {
            return Err(ReloadError::MissingToken);
        }

        let guard = self.lock.lock().await;

        if self.store.size() == 0 && !self.store.try_set(token, self.settings.session_ttl_secs) {
            warn!(session = %token, "Failed to admit session");
            return Err(ReloadError::AdmissionRefused);
        }
        if !self.store.is_live(token) {
            debug!(session = %token, "Upload refused, another session is staging");
            return Err(ReloadError::SessionBusy);
        }

        Ok(StagingGuard {
            coordinator: self,
            token: token.to_string(),
            _lock: guard,
        })
    }

    /// Resolve and run the reload for `token`, then clear the store.
    ///
    /// The store is cleared whatever the execution outcome so the staging
    /// slot is always released. An execution failure is reported in the
    /// outcome, not as an error.
    ///
    /// The work runs on its own task: dropping the returned future does not
    /// interrupt a running reload command or skip the clear.
    pub async fn reload(self: &Arc<Self>, token: &str) -> Result<ReloadOutcome> {
        if token.is_empty() {
            return Err(ReloadError::MissingToken);
        }

        let coordinator = Arc::clone(self);
        let token = token.to_string();
        tokio::spawn(async move { coordinator.run_reload(&token).await })
            .await
            .map_err(|e| ReloadError::Interrupted(e.to_string()))?
    }

    async fn run_reload(&self, token: &str) -> Result<ReloadOutcome> {
        let deployment = DeploymentMap::load(
            &self.settings.manifest,
            &self.settings.roles,
            &self.settings.skip_roles,
        )
        .await;

        let _lock = self.lock.lock().await;

        let Some(snapshot) = self.store.get(token) else {
            warn!(session = %token, "Reload refused, token is not the live session");
            return Err(ReloadError::SessionBusy);
        };

        let guard = ReloadGuard::enter(self, Phase::Resolving);
        let target = ReloadResolver::new(&deployment).resolve(&snapshot);
        info!(session = %token, target = %target, dirs = snapshot.directories.len(), "Resolved reload target");

        guard.set(Phase::Reloading);
        let report = match target.expression() {
            Some(expression) => self.executor.execute(&expression).await,
            None => {
                info!(session = %token, "No process affected, skipping reload");
                ExecutionReport::succeeded(vec![NOTHING_TO_RELOAD.to_string()])
            }
        };
        drop(guard);

        if report.success {
            info!(session = %token, target = %target, "Reload succeeded");
        } else {
            warn!(session = %token, target = %target, "Reload failed");
        }

        Ok(ReloadOutcome { target, report })
    }

    /// Status of the staging slot for `token`.
    pub fn status(&self, token: &str) -> SessionStatus {
        let phase = self.phase();
        let Some(snapshot) = self.store.get(token) else {
            return SessionStatus {
                phase,
                live: false,
                ttl_secs: None,
                directories: Vec::new(),
            };
        };

        let mut directories: Vec<DirectoryStatus> = snapshot
            .directories
            .iter()
            .map(|(dir, entry)| DirectoryStatus {
                dir: dir.clone(),
                backup_dir: entry.backup_dir().map(str::to_string),
                db_files: entry.db_files().len(),
                xml_files: entry.xml_files().len(),
                server_files: entry.server_files().len(),
            })
            .collect();
        directories.sort_by(|a, b| a.dir.cmp(&b.dir));

        SessionStatus {
            phase,
            live: true,
            ttl_secs: self.store.time_to_live(token),
            directories,
        }
    }
}

/// Holds the orchestration lock for one admitted upload.
pub struct StagingGuard<'a> {
    coordinator: &'a ReloadCoordinator,
    token: String,
    _lock: MutexGuard<'a, ()>,
}

impl StagingGuard<'_> {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Make sure the session tracks `abs_dir`.
    pub fn ensure_directory(&self, abs_dir: &str) -> Result<()> {
        if self.coordinator.store.ensure_directory(&self.token, abs_dir) {
            Ok(())
        } else {
            Err(ReloadError::SessionBusy)
        }
    }

    /// Backup directory for `abs_dir`, choosing one with `make_name` on the
    /// first overwrite of the session.
    pub fn backup_dir<F>(&self, abs_dir: &str, make_name: F) -> Result<String>
    where
        F: FnOnce() -> String,
    {
        let store = &self.coordinator.store;
        if let Some(existing) = store.backup_dir(&self.token, abs_dir) {
            return Ok(existing);
        }

        let name = make_name();
        if !store.set_backup_dir(&self.token, abs_dir, &name) {
            return Err(ReloadError::SessionBusy);
        }
        info!(session = %self.token, dir = %abs_dir, backup = %name, "Backup directory chosen");
        Ok(name)
    }

    /// Record a successful write of `full_path` into `abs_dir`.
    ///
    /// `dir` is the upload directory as the client named it and decides the
    /// category. Returns the category recorded, if any.
    pub fn record_upload(
        &self,
        dir: &str,
        abs_dir: &str,
        full_path: &str,
    ) -> Result<Option<ConfigCategory>> {
        let Some(category) = classify_upload(dir, full_path) else {
            debug!(session = %self.token, path = %full_path, "Upload is not configuration");
            return Ok(None);
        };
        self.coordinator
            .store
            .add_config_entry(&self.token, abs_dir, full_path, category)?;
        debug!(session = %self.token, path = %full_path, %category, "Staged config entry");
        Ok(Some(category))
    }
}

/// Marks a reload in progress. On drop, clears the store and resets the
/// phase, even if the reload panicked.
struct ReloadGuard<'a> {
    coordinator: &'a ReloadCoordinator,
}

impl<'a> ReloadGuard<'a> {
    fn enter(coordinator: &'a ReloadCoordinator, phase: Phase) -> Self {
        *coordinator.active.lock() = Some(phase);
        Self { coordinator }
    }

    fn set(&self, phase: Phase) {
        *self.coordinator.active.lock() = Some(phase);
    }
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.store.clear();
        *self.coordinator.active.lock() = None;
    }
}
