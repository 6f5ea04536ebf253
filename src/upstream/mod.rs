//! Outbound calls to the CAD-processing backend.
//!
//! # Data Flow
//! ```text
//! staged upload + auxiliary JSON + query
//!     → client.rs (multipart POST, generous timeout)
//!     → UpstreamResponse (status, content type, disposition, body)
//!     → pipeline (parse + persist)
//! ```
//!
//! # Design Decisions
//! - No retries: CAD regeneration is slow and not safe to repeat blindly
//! - "Responded with failure" and "never responded" are distinct errors

pub mod client;
pub mod error;

pub use client::{AuxiliaryPart, ForwardRequest, StagedUpload, UpstreamClient, UpstreamResponse};
pub use error::UpstreamError;
