//! Reload target resolution for staged configuration uploads.
//!
//! After a batch of uploads, only the backend processes affected by the
//! changed files should be reloaded. This crate provides:
//!
//! - [`address`]: wildcard process addresses and their field-wise reduction
//! - [`deployment`]: the artifact -> process mapping from the deployment manifest
//! - [`category`]: classification of an upload into a config category
//! - [`resolver`]: staged session -> [`ReloadTarget`]
//! - [`executor`]: the external reload command
//! - [`coordinator`]: admission, staging lock, reload and status
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = Arc::new(ReloadCoordinator::new(store, Arc::new(executor), settings));
//!
//! let guard = coordinator.begin_upload(&token).await?;
//! guard.ensure_directory(&abs_dir)?;
//! // write the file ...
//! guard.record_upload(&dir, &abs_dir, &full_path)?;
//! drop(guard);
//!
//! let outcome = coordinator.reload(&token).await?;
//! ```

pub mod address;
pub mod category;
pub mod coordinator;
pub mod deployment;
pub mod error;
pub mod executor;
pub mod resolver;

pub use address::{AddressField, AddressPattern, ReducedPattern, ReloadTarget, reduce};
pub use category::classify_upload;
pub use coordinator::{
    DirectoryStatus, NOTHING_TO_RELOAD, Phase, ReloadCoordinator, ReloadOutcome, ReloadSettings,
    SessionStatus, StagingGuard,
};
pub use deployment::{DeploymentMap, RoleTable};
pub use error::{ReloadError, Result};
pub use executor::{ConsoleReloadExecutor, ExecutionReport, ReloadExecutor};
pub use resolver::ReloadResolver;
