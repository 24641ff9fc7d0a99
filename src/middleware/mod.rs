pub mod auth;
pub mod response;

pub use auth::Caller;
pub use response::{ApiResponse, ApiResult, PngResponse};
