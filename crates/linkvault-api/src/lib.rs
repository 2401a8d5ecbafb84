pub mod blocking;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod middleware;
pub mod routes;
pub mod secrets;
pub mod storage;
pub mod sweeper;

pub use config::VaultConfig;
pub use error::{ApiError, ApiResult};
pub use identity::IdentityGate;
pub use lifecycle::ContentEngine;
pub use routes::{AppState, build_router};

/// Current wall-clock time in Unix milliseconds; every stored timestamp
/// uses this unit.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
