//! Expiring staging store for hot-reload upload sessions.
//!
//! An upload session owns a token and, for every directory it touched, the set
//! of configuration files it staged plus the backup directory the originals
//! were moved to. The store:
//! - admits at most `capacity` live sessions (one by default)
//! - expires each session at an absolute second and evicts it lazily on access
//! - runs an optional background [`Sweeper`] that evicts whole expiry buckets
//!
//! # Example
//!
//! ```rust,ignore
//! use hotstage_session::{ConfigCategory, ExpiringSessionStore, StoreConfig};
//!
//! let store = ExpiringSessionStore::new(StoreConfig::default());
//! let sweeper = store.spawn_sweeper();
//!
//! if store.try_set(&token, 3600) {
//!     store.ensure_directory(&token, "/data/wedo/ClientConfig");
//!     store.add_config_entry(&token, "/data/wedo/ClientConfig", path, ConfigCategory::ClientXml)?;
//! }
//!
//! sweeper.close().await;
//! ```

mod config;
mod entry;
mod error;
mod store;
mod sweeper;
mod ttl;

pub use config::{
    DEFAULT_CAPACITY, DEFAULT_QUEUE_CAPACITY, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL_SECS,
    StoreConfig,
};
pub use entry::{ConfigCategory, ConfigEntrySet};
pub use error::{Error, Result};
pub use store::{ExpiringSessionStore, SessionSnapshot, StoreStats};
pub use sweeper::Sweeper;
pub use ttl::ExpiryIndex;
