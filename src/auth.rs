//! Credential upkeep: token storage access, proactive refresh, and singleflight rotation.

pub mod jwt;
pub mod refresh;
pub mod secret;

pub use jwt::*;
pub use refresh::{DEFAULT_EXPIRY_MARGIN, RefreshMetrics, TokenRefreshCoordinator};
pub use secret::TokenSecret;
