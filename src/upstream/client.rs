//! HTTP client for the CAD backend.
//!
//! # Responsibilities
//! - Build the outbound multipart form (`file` + auxiliary JSON part)
//! - Send `exportType` as a query parameter, never as a body field
//! - Apply the long request timeout CAD regeneration needs
//! - Classify failures as status vs transport errors

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use url::Url;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::error::{excerpt, UpstreamError};

/// An inbound upload staged on local disk.
///
/// When built from a temp file, the file is removed once the last clone is
/// dropped, so a detached forward keeps its input alive.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    path: PathBuf,
    /// Filename as sent by the client.
    pub filename: String,
    /// Media type declared on the outbound `file` part.
    pub content_type: String,
    _temp: Option<Arc<TempPath>>,
}

impl StagedUpload {
    /// Stage from a temp file owned by the upload.
    pub fn from_temp(temp: TempPath, filename: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            path: temp.to_path_buf(),
            filename: filename.into(),
            content_type: content_type.into(),
            _temp: Some(Arc::new(temp)),
        }
    }

    /// Stage from a file the caller keeps ownership of.
    pub fn from_path(path: impl Into<PathBuf>, filename: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            _temp: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Auxiliary text part sent next to the file (`features`, `data`).
#[derive(Debug, Clone)]
pub struct AuxiliaryPart {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub text: String,
}

impl AuxiliaryPart {
    /// `features` JSON text for model export.
    pub fn features(text: impl Into<String>) -> Self {
        Self {
            field: "features".to_string(),
            filename: None,
            content_type: None,
            text: text.into(),
        }
    }

    /// `data` JSON attachment for attribute updates.
    pub fn data(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: "data".to_string(),
            filename: Some(filename.into()),
            content_type: Some("application/json".to_string()),
            text: text.into(),
        }
    }
}

/// One outbound forward.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub url: Url,
    pub upload: StagedUpload,
    pub auxiliary: Option<AuxiliaryPart>,
    pub export_type: Option<String>,
}

/// A successful (2xx) upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    /// `Content-Type` header, empty when absent.
    pub content_type: String,
    pub content_disposition: Option<String>,
    pub body: Bytes,
}

/// Client for the CAD backend. Cheap to clone.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Url::parse(&config.base_url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("'{}': {e}", config.base_url)))?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Resolve a path (`/SolidWork/model`) against the configured base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| UpstreamError::InvalidRequest(format!("'{joined}': {e}")))
    }

    /// POST the staged upload (and auxiliary part) as multipart form data.
    pub async fn forward(&self, request: ForwardRequest) -> Result<UpstreamResponse, UpstreamError> {
        let ForwardRequest {
            url,
            upload,
            auxiliary,
            export_type,
        } = request;

        let bytes = tokio::fs::read(&upload.path).await?;
        let file = Part::bytes(bytes)
            .file_name(upload.filename.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| UpstreamError::InvalidRequest(format!("file content type: {e}")))?;
        let mut form = Form::new().part("file", file);

        if let Some(aux) = auxiliary {
            let mut part = Part::text(aux.text);
            if let Some(filename) = aux.filename {
                part = part.file_name(filename);
            }
            if let Some(content_type) = aux.content_type {
                part = part
                    .mime_str(&content_type)
                    .map_err(|e| UpstreamError::InvalidRequest(format!("{} content type: {e}", aux.field)))?;
            }
            form = form.part(aux.field, part);
        }

        let mut builder = self.http.post(url.clone()).multipart(form).timeout(self.timeout);
        if let Some(export_type) = export_type.as_deref() {
            builder = builder.query(&[("exportType", export_type)]);
        }

        tracing::info!(
            url = %url,
            file = %upload.filename,
            export_type = ?export_type,
            "Forwarding upload to upstream"
        );

        let start = Instant::now();
        let result = match builder.send().await {
            Ok(response) => read_response(response).await,
            Err(e) => Err(e.into()),
        };
        record(&url, &result, start);
        result
    }

    /// GET a JSON document from the backend.
    pub async fn get_json(
        &self,
        url: Url,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<serde_json::Value, UpstreamError> {
        let start = Instant::now();
        let result = match self.http.get(url.clone()).query(query).timeout(timeout).send().await {
            Ok(response) => read_response(response).await,
            Err(e) => Err(e.into()),
        };
        record(&url, &result, start);

        let response = result?;
        serde_json::from_slice(&response.body)
            .map_err(|e| UpstreamError::InvalidBody(format!("expected JSON: {e}")))
    }
}

async fn read_response(response: reqwest::Response) -> Result<UpstreamResponse, UpstreamError> {
    let status = response.status();
    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header(reqwest::header::CONTENT_TYPE).unwrap_or_default();
    let content_disposition = header(reqwest::header::CONTENT_DISPOSITION);

    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: excerpt(&String::from_utf8_lossy(&body)),
        });
    }

    Ok(UpstreamResponse {
        status: status.as_u16(),
        content_type,
        content_disposition,
        body,
    })
}

fn record(url: &Url, result: &Result<UpstreamResponse, UpstreamError>, start: Instant) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(UpstreamError::Status { .. }) => "status",
        Err(UpstreamError::Transport(_)) => "transport",
        Err(_) => "other",
    };
    metrics::record_upstream(url.path(), outcome, start);

    match result {
        Ok(response) => tracing::info!(
            url = %url,
            status = response.status,
            content_type = %response.content_type,
            bytes = response.body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        ),
        Err(e) => tracing::warn!(
            url = %url,
            error = %e,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream call failed"
        ),
    }
}
