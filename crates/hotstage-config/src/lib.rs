//! Configuration system for the hotstage staging server.
//!
//! Provides TOML-based configuration with:
//! - Server, session, reload and logging sections, all optional
//! - Config file layering (user config + project-local overrides)
//! - Validation of values that would make the server unusable

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, PROJECT_CONFIG_FILE, config_dir, load_config, load_config_file,
    load_config_with_options, save_config, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
