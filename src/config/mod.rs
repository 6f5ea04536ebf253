//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → CLI overrides applied in main.rs
//!     → shared via AppState to handlers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BridgeConfig;
pub use schema::CorsConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::PipelineConfig;
pub use schema::StorageConfig;
pub use schema::TimeoutConfig;
pub use schema::UploadConfig;
pub use schema::UpstreamConfig;
pub use validation::{validate_config, ValidationError};
