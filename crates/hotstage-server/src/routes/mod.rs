//! API routes.

pub mod health;
pub mod reload;
pub mod resources;
pub mod session;

pub use health::{HealthResponse, health_routes};
pub use reload::{ReloadQuery, ReloadResponse, reload_handler};
pub use resources::{UploadQuery, create_resource_handler, save_resource_handler};
pub use session::{SessionQuery, SessionResponse, session_status_handler};
