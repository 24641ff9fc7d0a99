// Security aggregation: providers issue authentications carrying capability-typed
// authorizations; the request-scoped SecurityContext combines them into one policy.

pub mod error;
pub mod authorization;
pub mod authentication;
pub mod context;
pub mod role;
pub mod service;
pub mod static_service;
pub mod jwt_service;

pub use error::SecurityError;
pub use authorization::*;
pub use authentication::*;
pub use context::*;
pub use role::*;
pub use service::*;
pub use static_service::*;
pub use jwt_service::*;
