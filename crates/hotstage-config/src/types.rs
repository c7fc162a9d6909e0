//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]          # listener, served root, auth, limits
//! [session]         # staging slot lifetime and sweeping
//! [reload]          # manifest, reload command, role table
//! [reload.roles]    # role -> process pattern overrides
//! [logging]         # log level and file output
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default values shared by the config types.
pub mod defaults {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_BIND: &str = "127.0.0.1";
    pub const REQUESTS_PER_MINUTE: u32 = 120;
    pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

    pub const SESSION_TTL_SECS: i64 = 60 * 60;
    pub const SESSION_CAPACITY: usize = 1;
    pub const SWEEP_INTERVAL_MS: u64 = 1000;
    pub const SWEEP_QUEUE_CAPACITY: usize = 100;

    pub const MANIFEST: &str = "wedo/ClientConfig/CSCommon/DB/SvrLoadList.xml";
    pub const RELOAD_WORKING_DIR: &str = "apps/tcm/bin";
    pub const RELOAD_SCRIPT: &str = "console_cmd.sh";
    pub const RELOAD_TIMEOUT_SECS: u64 = 300;
    pub const MONITOR_ROLE: &str = "MonitorSvr";

    pub const LOG_LEVEL: &str = "info";
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HotstageConfig {
    /// Server configuration.
    pub server: Option<ServerConfig>,

    /// Staging session configuration.
    pub session: Option<SessionConfig>,

    /// Reload configuration.
    pub reload: Option<ReloadConfig>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl HotstageConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: HotstageConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.reload.is_some() {
            self.reload = other.reload;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Server section, or defaults.
    pub fn server_or_default(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Session section, or defaults.
    pub fn session_or_default(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Reload section, or defaults.
    pub fn reload_or_default(&self) -> ReloadConfig {
        self.reload.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging_or_default(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Check values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref server) = self.server {
            if server.api_rpm == 0 {
                return Err(ConfigError::invalid("server.api_rpm", "must be greater than 0"));
            }
            if server.max_body_size == 0 {
                return Err(ConfigError::invalid(
                    "server.max_body_size",
                    "must be greater than 0",
                ));
            }
        }
        if let Some(ref session) = self.session {
            if session.ttl_secs <= 0 {
                return Err(ConfigError::invalid("session.ttl_secs", "must be positive"));
            }
            if session.capacity == 0 {
                return Err(ConfigError::invalid("session.capacity", "must be at least 1"));
            }
            if session.sweep_interval_ms == 0 {
                return Err(ConfigError::invalid(
                    "session.sweep_interval_ms",
                    "must be greater than 0",
                ));
            }
        }
        if let Some(ref reload) = self.reload {
            if reload.script.trim().is_empty() {
                return Err(ConfigError::invalid("reload.script", "must not be empty"));
            }
            if reload.timeout_secs == 0 {
                return Err(ConfigError::invalid(
                    "reload.timeout_secs",
                    "must be greater than 0",
                ));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Root of the served file tree. Uploads are staged under it.
    pub root: Option<PathBuf>,
    /// Bearer token for the API. Absent means auth is disabled.
    pub auth_token: Option<String>,
    /// Enable rate limiting.
    pub rate_limiting: bool,
    /// API rate limit: requests per minute.
    pub api_rpm: u32,
    /// Enable request logging.
    pub request_logging: bool,
    /// Maximum upload body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::DEFAULT_PORT,
            bind: defaults::DEFAULT_BIND.to_string(),
            root: None,
            auth_token: None,
            rate_limiting: true,
            api_rpm: defaults::REQUESTS_PER_MINUTE,
            request_logging: true,
            max_body_size: defaults::MAX_BODY_SIZE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Staging session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a session stays open for uploads.
    pub ttl_secs: i64,
    /// Maximum concurrent sessions.
    pub capacity: usize,
    /// Sweeper tick in milliseconds.
    pub sweep_interval_ms: u64,
    /// Bound of the sweeper's deletion queue.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::SESSION_TTL_SECS,
            capacity: defaults::SESSION_CAPACITY,
            sweep_interval_ms: defaults::SWEEP_INTERVAL_MS,
            queue_capacity: defaults::SWEEP_QUEUE_CAPACITY,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reload Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Reload configuration.
///
/// Relative paths are resolved against the server root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Deployment manifest.
    pub manifest: PathBuf,
    /// Directory the reload script runs in.
    pub working_dir: PathBuf,
    /// Reload script, run with `sh`.
    pub script: String,
    /// Time limit for one reload.
    pub timeout_secs: u64,
    /// Roles never reloaded.
    pub skip_roles: Vec<String>,
    /// Role -> process pattern, added to or replacing the built-in table.
    pub roles: BTreeMap<String, String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from(defaults::MANIFEST),
            working_dir: PathBuf::from(defaults::RELOAD_WORKING_DIR),
            script: defaults::RELOAD_SCRIPT.to_string(),
            timeout_secs: defaults::RELOAD_TIMEOUT_SECS,
            skip_roles: vec![defaults::MONITOR_ROLE.to_string()],
            roles: BTreeMap::new(),
        }
    }
}

impl ReloadConfig {
    /// Manifest path under `root`.
    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        resolve_under(root, &self.manifest)
    }

    /// Working directory under `root`.
    pub fn working_dir_path(&self, root: &Path) -> PathBuf {
        resolve_under(root, &self.working_dir)
    }
}

fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Write JSON logs to a daily rolling file.
    pub file: bool,
    /// Directory for log files. Defaults to `logs/` in the config dir.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            file: true,
            dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = HotstageConfig::from_toml("").unwrap();
        assert!(config.server.is_none());
        assert!(config.session.is_none());
        assert_eq!(config.server_or_default().port, defaults::DEFAULT_PORT);
        assert_eq!(config.session_or_default().ttl_secs, 3600);
        assert_eq!(config.session_or_default().capacity, 1);
    }

    #[test]
    fn test_full_config() {
        let config = HotstageConfig::from_toml(
            r#"
[server]
port = 9090
root = "/data/home/user00"
auth_token = "secret"
rate_limiting = false

[session]
ttl_secs = 600
sweep_interval_ms = 500

[reload]
script = "reload.sh"
timeout_secs = 60
skip_roles = ["MonitorSvr", "ViewSvr"]

[reload.roles]
GameSvr = "*.*.13.*"
NewSvr = "*.*.50.*"

[logging]
level = "debug"
file = false
"#,
        )
        .unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.port, 9090);
        assert_eq!(server.bind, defaults::DEFAULT_BIND);
        assert_eq!(server.auth_token.as_deref(), Some("secret"));
        assert!(!server.rate_limiting);

        let session = config.session.as_ref().unwrap();
        assert_eq!(session.ttl_secs, 600);
        assert_eq!(session.queue_capacity, defaults::SWEEP_QUEUE_CAPACITY);

        let reload = config.reload.as_ref().unwrap();
        assert_eq!(reload.script, "reload.sh");
        assert_eq!(reload.manifest, PathBuf::from(defaults::MANIFEST));
        assert_eq!(reload.skip_roles.len(), 2);
        assert_eq!(reload.roles.get("NewSvr").map(String::as_str), Some("*.*.50.*"));

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging.level, "debug");
        assert!(!logging.file);

        config.validate().unwrap();
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = HotstageConfig::from_toml("[server]\nport = 8080\n[session]\nttl_secs = 100\n").unwrap();
        let overlay = HotstageConfig::from_toml("[server]\nport = 3000\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.server.as_ref().unwrap().port, 3000);
        // Sections absent from the overlay survive
        assert_eq!(base.session.as_ref().unwrap().ttl_secs, 100);
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = HotstageConfig::new();
        config.reload = Some(ReloadConfig::default());
        let text = config.to_toml().unwrap();
        let parsed = HotstageConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.reload_or_default().script, defaults::RELOAD_SCRIPT);
    }

    #[test]
    fn test_reload_paths_resolve_under_root() {
        let reload = ReloadConfig::default();
        let root = Path::new("/data/home/user00");
        assert_eq!(
            reload.manifest_path(root),
            PathBuf::from("/data/home/user00/wedo/ClientConfig/CSCommon/DB/SvrLoadList.xml")
        );
        assert_eq!(
            reload.working_dir_path(root),
            PathBuf::from("/data/home/user00/apps/tcm/bin")
        );

        let absolute = ReloadConfig {
            working_dir: PathBuf::from("/opt/tcm"),
            ..ReloadConfig::default()
        };
        assert_eq!(absolute.working_dir_path(root), PathBuf::from("/opt/tcm"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = HotstageConfig::from_toml("[session]\nttl_secs = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "session.ttl_secs"));

        let config = HotstageConfig::from_toml("[session]\ncapacity = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = HotstageConfig::from_toml("[reload]\nscript = \"  \"\n").unwrap();
        assert!(config.validate().is_err());

        let config = HotstageConfig::from_toml("[server]\napi_rpm = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let err = HotstageConfig::from_toml("[server]\nport = \"not a number\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
