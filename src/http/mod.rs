//! HTTP surface of the bridge.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → upload.rs (stream form fields to temp files, check extensions)
//!     → handlers.rs (open workspace, submit to pipeline)
//!     → JSON response or {"detail": ...}
//! ```

pub mod handlers;
pub mod server;
pub mod upload;

pub use server::{AppState, HttpServer};
