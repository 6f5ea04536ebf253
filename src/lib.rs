//! CAD bridge library.
//!
//! An HTTP façade in front of a CAD backend: accepts part uploads, forwards
//! them with extra form fields, splits the backend's multipart reply into
//! JSON metadata and binary artifacts, and stores every part in a
//! per-request workspace.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod multipart;
pub mod observability;
pub mod pipeline;
pub mod upstream;
pub mod workspace;

pub use config::schema::BridgeConfig;
pub use error::BridgeError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
