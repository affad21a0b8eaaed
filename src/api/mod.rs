pub mod accounts;
pub mod analytics;
pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::AppState;
pub use routes::create_api_router;
