//! Route handlers.
//!
//! Every upload handler follows the same shape: read and validate the
//! form, open a workspace, hand the forward to the worker pool, report
//! what landed on disk.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::BridgeError;
use crate::http::server::AppState;
use crate::http::upload::{read_form, validate_extension, InboundFile};
use crate::pipeline::{self, ForwardResult};
use crate::upstream::{AuxiliaryPart, ForwardRequest};
use crate::workspace::{ManifestEntry, Workspace};

/// Body sent as `features` when the client omits it.
const DEFAULT_FEATURES: &str = "[]";

/// Filename for `data` when the client's `json_data` field has none.
const DEFAULT_DATA_FILENAME: &str = "data.json";

/// Content type for the forwarded file on `/api/updateattributes`.
const DEFAULT_UPDATE_CONTENT_TYPE: &str = "application/sla";

#[derive(Debug, Deserialize)]
pub struct FetchModelQuery {
    #[serde(rename = "exportType")]
    pub export_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttributesQuery {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchModelResponse {
    pub request_id: String,
    pub tmp_dir: String,
    pub parts: Vec<ManifestEntry>,
    pub info: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub info: Option<Value>,
    pub exported_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateAttributesResponse {
    pub status: &'static str,
    pub request_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "CAD bridge is running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /fetch-model`: forward `file` + `features`, de-multiplex the reply.
pub async fn fetch_model(
    State(state): State<AppState>,
    Query(query): Query<FetchModelQuery>,
    multipart: Multipart,
) -> Result<Json<FetchModelResponse>, BridgeError> {
    let mut form = read_form(multipart, &["file"]).await?;
    let file = checked_upload(&state, form.take_file("file")?)?;

    let features = form
        .take_text("features")
        .map(|t| t.value)
        .unwrap_or_else(|| DEFAULT_FEATURES.to_string());
    serde_json::from_str::<Value>(&features)
        .map_err(|e| BridgeError::Validation(format!("'features' is not valid JSON: {e}")))?;

    let workspace = pipeline::open_workspace(&state.workspaces).await?;
    let request = ForwardRequest {
        url: state.client.endpoint(&state.config.upstream.fetch_model_path)?,
        upload: file.staged,
        auxiliary: Some(AuxiliaryPart::features(features)),
        export_type: query.export_type,
    };

    let result = run_assemble(&state, request, &workspace).await?;
    tracing::info!(
        request_id = %workspace.id(),
        parts = result.parts.len(),
        has_info = result.info.is_some(),
        "Model fetched"
    );

    Ok(Json(FetchModelResponse {
        request_id: workspace.id().to_string(),
        tmp_dir: workspace.dir().to_string_lossy().into_owned(),
        parts: result.parts,
        info: result.info,
    }))
}

/// `POST /api/model`: forward `file` alone, report info and the exported file.
pub async fn model(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ModelResponse>, BridgeError> {
    let mut form = read_form(multipart, &["file"]).await?;
    let file = checked_upload(&state, form.take_file("file")?)?;

    let workspace = pipeline::open_workspace(&state.workspaces).await?;
    let request = ForwardRequest {
        url: state.client.endpoint(&state.config.upstream.model_path)?,
        upload: file.staged,
        auxiliary: None,
        export_type: None,
    };

    let result = run_assemble(&state, request, &workspace).await?;
    let exported_file = result.last_artifact().map(str::to_string);
    tracing::info!(
        request_id = %workspace.id(),
        exported_file = ?exported_file,
        "Model processed"
    );

    Ok(Json(ModelResponse {
        info: result.info,
        exported_file,
    }))
}

/// `GET /api/getattributes?filePath=`: relay the backend's JSON.
pub async fn get_attributes(
    State(state): State<AppState>,
    Query(query): Query<AttributesQuery>,
) -> Result<Json<Value>, BridgeError> {
    let file_path = query
        .file_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| BridgeError::Validation("missing 'filePath' query parameter".into()))?;

    let upstream = &state.config.upstream;
    let url = state.client.endpoint(&upstream.attributes_path)?;
    let value = state
        .client
        .get_json(
            url,
            &[("filePath", file_path.as_str())],
            Duration::from_secs(upstream.attributes_timeout_secs),
        )
        .await?;
    Ok(Json(value))
}

/// `POST /api/updateattributes`: forward `file` + `json_data`, save the
/// returned file as-is.
pub async fn update_attributes(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UpdateAttributesResponse>, BridgeError> {
    let mut form = read_form(multipart, &["file"]).await?;
    let mut file = checked_upload(&state, form.take_file("file")?)?;
    let data = form
        .take_text("json_data")
        .ok_or_else(|| BridgeError::Validation("missing 'json_data' field".into()))?;

    file.staged.content_type = file
        .content_type
        .clone()
        .unwrap_or_else(|| DEFAULT_UPDATE_CONTENT_TYPE.to_string());
    let data_filename = data
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_FILENAME.to_string());

    let workspace = pipeline::open_workspace(&state.workspaces).await?;
    let request = ForwardRequest {
        url: state.client.endpoint(&state.config.upstream.update_attributes_path)?,
        upload: file.staged,
        auxiliary: Some(AuxiliaryPart::data(data_filename, data.value)),
        export_type: None,
    };

    let job = pipeline::forward_and_save(state.client.clone(), request, workspace.clone());
    let entry = state.pool.run(job).await?;
    tracing::info!(
        request_id = %workspace.id(),
        file = %entry.stored_filename,
        size_bytes = entry.size_bytes,
        "Updated model saved"
    );

    Ok(Json(UpdateAttributesResponse {
        status: "success",
        request_id: workspace.id().to_string(),
        file_name: entry.stored_filename,
        file_path: entry.path,
        file_size: entry.size_bytes,
    }))
}

fn checked_upload(state: &AppState, file: InboundFile) -> Result<InboundFile, BridgeError> {
    validate_extension(&file.filename, &state.config.uploads.allowed_extensions)?;
    Ok(file)
}

async fn run_assemble(
    state: &AppState,
    request: ForwardRequest,
    workspace: &Workspace,
) -> Result<ForwardResult, BridgeError> {
    let job = pipeline::forward_and_assemble(state.client.clone(), request, workspace.clone());
    state.pool.run(job).await
}
