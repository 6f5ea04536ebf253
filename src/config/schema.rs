//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// CAD backend settings.
    pub upstream: UpstreamConfig,

    /// Where request workspaces are written.
    pub storage: StorageConfig,

    /// Worker pool for the forward/parse/persist pipeline.
    pub pipeline: PipelineConfig,

    /// Inbound upload rules.
    pub uploads: UploadConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Browser origins allowed to call the bridge.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// CAD backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the backend (e.g., "http://localhost:5000").
    pub base_url: String,

    /// Path used by `POST /fetch-model`.
    pub fetch_model_path: String,

    /// Path used by `POST /api/model`.
    pub model_path: String,

    /// Path used by `GET /api/getattributes`.
    pub attributes_path: String,

    /// Path used by `POST /api/updateattributes`.
    pub update_attributes_path: String,

    /// Total time allowed for one forward. CAD regeneration is slow.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Timeout for the attributes lookup.
    pub attributes_timeout_secs: u64,

    /// Honor HTTP(S)_PROXY environment variables for upstream calls.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            fetch_model_path: "/SolidWork/export".to_string(),
            model_path: "/SolidWork/model".to_string(),
            attributes_path: "/getattributes".to_string(),
            update_attributes_path: "/updateattributes".to_string(),
            timeout_secs: 200,
            connect_timeout_secs: 10,
            attributes_timeout_secs: 10,
            use_system_proxy: false,
        }
    }
}

/// Workspace storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of all request workspaces, relative to the working directory
    /// unless absolute. Created on first use, never cleaned.
    pub tmp_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tmp_root: "tmp".to_string(),
        }
    }
}

/// Pipeline worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum forward/parse/persist jobs running at once.
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
        }
    }
}

/// Inbound upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted CAD file extensions (case-insensitive, leading dot).
    pub allowed_extensions: Vec<String>,

    /// Maximum inbound request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![".stl".to_string(), ".sldprt".to_string()],
            max_upload_bytes: 256 * 1024 * 1024, // 256MB
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Must exceed `upstream.timeout_secs`.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty disables CORS headers.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5000".to_string(),
                "http://127.0.0.1:5000".to_string(),
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
