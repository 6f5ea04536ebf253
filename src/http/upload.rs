//! Inbound multipart form handling.
//!
//! # Responsibilities
//! - Stream file fields to temp files chunk by chunk
//! - Collect small text fields in memory
//! - Enforce the allowed upload extensions

use axum::extract::Multipart;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;

use crate::error::BridgeError;
use crate::upstream::StagedUpload;

/// A file field staged on disk.
#[derive(Debug)]
pub struct InboundFile {
    pub filename: String,
    /// Content type the client declared, if any.
    pub content_type: Option<String>,
    pub staged: StagedUpload,
}

/// A field held in memory.
#[derive(Debug, Clone)]
pub struct InboundText {
    pub filename: Option<String>,
    pub value: String,
}

/// Fields of one inbound form.
#[derive(Debug, Default)]
pub struct InboundForm {
    files: HashMap<String, InboundFile>,
    texts: HashMap<String, InboundText>,
}

impl InboundForm {
    /// Take a staged file field, failing with a 400 if absent.
    pub fn take_file(&mut self, field: &str) -> Result<InboundFile, BridgeError> {
        self.files
            .remove(field)
            .ok_or_else(|| BridgeError::Validation(format!("missing '{field}' field")))
    }

    pub fn take_text(&mut self, field: &str) -> Option<InboundText> {
        self.texts.remove(field)
    }
}

/// Read every field of `multipart`.
///
/// Fields named in `file_fields` are streamed to temp files; all others
/// are read into memory as UTF-8 text. Unknown extra fields are ignored by
/// the caller.
pub async fn read_form(mut multipart: Multipart, file_fields: &[&str]) -> Result<InboundForm, BridgeError> {
    let mut form = InboundForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field.file_name().map(str::to_string);

        if file_fields.contains(&name.as_str()) {
            let filename = filename
                .filter(|f| !f.is_empty())
                .ok_or_else(|| BridgeError::Validation(format!("'{name}' field has no filename")))?;
            let content_type = field.content_type().map(str::to_string);

            let temp = tokio::task::spawn_blocking(|| {
                tempfile::Builder::new().prefix("cad-bridge-upload-").tempfile()
            })
            .await
            .map_err(|e| BridgeError::Internal(format!("blocking task failed: {e}")))??;
            let (file, path) = temp.into_parts();
            let mut file = tokio::fs::File::from_std(file);

            let mut size = 0u64;
            while let Some(chunk) = field.chunk().await? {
                size += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            tracing::debug!(field = %name, file = %filename, size_bytes = size, "Upload staged");
            let staged = StagedUpload::from_temp(path, filename.clone(), "application/octet-stream");
            form.files.insert(
                name,
                InboundFile {
                    filename,
                    content_type,
                    staged,
                },
            );
        } else {
            let value = field.text().await?;
            form.texts.insert(name, InboundText { filename, value });
        }
    }

    Ok(form)
}

/// Reject filenames whose extension is not in `allowed` (case-insensitive).
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<(), BridgeError> {
    let lower = filename.to_ascii_lowercase();
    if allowed.iter().any(|ext| lower.ends_with(&ext.to_ascii_lowercase())) {
        Ok(())
    } else {
        Err(BridgeError::Validation(format!(
            "Only {} files are allowed",
            allowed.join(", ")
        )))
    }
}
