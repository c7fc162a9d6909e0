//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default max body size for uploads (64 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Default API requests per minute.
pub const DEFAULT_API_RPM: u32 = 120;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Root of the file tree uploads are staged into.
    pub root: PathBuf,

    /// Authentication token. `None` means auth is disabled (localhost mode).
    pub auth_token: Option<String>,

    /// Enable rate limiting.
    pub rate_limiting: bool,

    /// Rate limit: requests per minute for API endpoints.
    pub api_rpm: u32,

    /// Enable request logging.
    pub request_logging: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            root: PathBuf::from("."),
            auth_token: None,
            rate_limiting: true,
            api_rpm: DEFAULT_API_RPM,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with an optional auth token.
    /// Pass `None` to disable authentication (localhost mode).
    pub fn new(auth_token: Option<String>) -> Self {
        Self {
            auth_token,
            ..Default::default()
        }
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the staging root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Enable or disable rate limiting.
    pub fn with_rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Set the API rate limit (requests per minute).
    pub fn with_api_rpm(mut self, rpm: u32) -> Self {
        self.api_rpm = rpm;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new(Some("my-token".to_string()))
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_root("/data/home/user00")
            .with_rate_limiting(false)
            .with_api_rpm(30)
            .with_max_body_size(1024);

        assert_eq!(config.auth_token.as_deref(), Some("my-token"));
        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.root, PathBuf::from("/data/home/user00"));
        assert!(!config.rate_limiting);
        assert_eq!(config.api_rpm, 30);
        assert_eq!(config.max_body_size, 1024);
        assert!(config.request_logging);
    }
}
