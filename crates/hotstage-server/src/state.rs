//! Application state shared across handlers.

use std::sync::Arc;

use hotstage_reload::ReloadCoordinator;

use crate::config::ServerConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};
use crate::staging::Stager;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Admission, staging lock and reload.
    pub coordinator: Arc<ReloadCoordinator>,

    /// Filesystem side of uploads.
    pub stager: Arc<Stager>,

    /// Global API rate limiter.
    pub limiter: SharedRateLimiter,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig, coordinator: ReloadCoordinator) -> Self {
        let limiter = create_rate_limiter(config.api_rpm);
        let stager = Stager::new(config.root.clone());
        Self {
            config: Arc::new(config),
            coordinator: Arc::new(coordinator),
            stager: Arc::new(stager),
            limiter,
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the in-crate router tests.

    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use hotstage_reload::{ExecutionReport, ReloadCoordinator, ReloadExecutor, ReloadSettings};
    use hotstage_session::{ExpiringSessionStore, StoreConfig};
    use parking_lot::Mutex;

    use super::AppState;
    use crate::config::ServerConfig;

    /// Executor that records targets and always succeeds.
    #[derive(Default)]
    pub struct RecordingExecutor {
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReloadExecutor for RecordingExecutor {
        async fn execute(&self, target: &str) -> ExecutionReport {
            self.calls.lock().push(target.to_string());
            ExecutionReport::succeeded(vec![format!("{} [succeed]", target)])
        }
    }

    pub fn test_state(root: &Path, auth_token: Option<&str>) -> (AppState, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor::default());
        let coordinator = ReloadCoordinator::new(
            ExpiringSessionStore::new(StoreConfig::default()),
            executor.clone(),
            ReloadSettings::new(root.join("SvrLoadList.xml")),
        );
        let config = ServerConfig::new(auth_token.map(str::to_string))
            .with_root(root)
            .with_rate_limiting(false)
            .with_request_logging(false);
        (AppState::new(config, coordinator), executor)
    }
}
