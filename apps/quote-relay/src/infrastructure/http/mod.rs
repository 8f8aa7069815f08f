//! HTTP Interface
//!
//! Axum router, shared handler state, error responses and the server
//! lifecycle.

mod error;
mod routes;
mod server;
mod state;

pub use error::{ApiError, ErrorBody, REPORT_LOAD_FAILED, REPORT_SAVE_FAILED, USAGE_LOAD_FAILED};
pub use routes::{GenerateAdviceRequest, TickersQuery, create_router};
pub use server::{HttpServer, ServerError};
pub use state::{AppState, USER_ID_HEADER};
