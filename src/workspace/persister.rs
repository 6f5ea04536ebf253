//! Writing classified parts into a workspace.
//!
//! # Responsibilities
//! - Decode and re-serialize Info parts as `info.json`
//! - Resolve and sanitize artifact filenames
//! - Report what landed on disk as `ManifestEntry` records
//!
//! # Design Decisions
//! - Same-named artifacts overwrite each other (last write wins)
//! - Sizes come from file metadata after the write, not payload length

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::multipart::{ClassifiedPart, PartKind, RawPart};
use crate::workspace::Workspace;

/// Fixed filename for the decoded info part.
pub const INFO_FILENAME: &str = "info.json";

/// One persisted part, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: PartKind,
    /// Logical name from `Content-Disposition`, if any.
    pub name: Option<String>,
    /// Sanitized filename inside the workspace.
    pub stored_filename: String,
    /// Absolute path of the stored file.
    pub path: String,
    pub content_type: String,
    /// Size on disk after the write.
    pub size_bytes: u64,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("info part is not valid JSON: {0}")]
    MalformedInfo(String),
}

/// Outcome of persisting one part.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedPart {
    Info {
        entry: ManifestEntry,
        value: serde_json::Value,
    },
    Artifact {
        entry: ManifestEntry,
    },
}

impl PersistedPart {
    pub fn entry(&self) -> &ManifestEntry {
        match self {
            PersistedPart::Info { entry, .. } | PersistedPart::Artifact { entry } => entry,
        }
    }
}

/// Persist a classified part at position `index` of its response.
pub fn persist(
    part: &ClassifiedPart,
    index: usize,
    workspace: &Workspace,
) -> Result<PersistedPart, PersistError> {
    match part {
        ClassifiedPart::Info(raw) => {
            let (entry, value) = persist_info(raw, workspace)?;
            Ok(PersistedPart::Info { entry, value })
        }
        ClassifiedPart::Artifact(raw) => Ok(PersistedPart::Artifact {
            entry: persist_artifact(raw, index, workspace)?,
        }),
    }
}

/// Decode an info payload as UTF-8 JSON.
pub fn decode_info(payload: &[u8]) -> Result<serde_json::Value, PersistError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| PersistError::MalformedInfo(format!("not UTF-8: {e}")))?;
    serde_json::from_str(text).map_err(|e| PersistError::MalformedInfo(e.to_string()))
}

/// Decode the info part and write it, pretty-printed, to `info.json`.
pub fn persist_info(
    part: &RawPart,
    workspace: &Workspace,
) -> Result<(ManifestEntry, serde_json::Value), PersistError> {
    let value = decode_info(part.payload())?;
    let serialized = serde_json::to_vec_pretty(&value)
        .map_err(|e| PersistError::MalformedInfo(e.to_string()))?;

    let entry = write_file(
        workspace,
        PartKind::Info,
        INFO_FILENAME,
        &serialized,
        part.name(),
        part.content_type(),
    )?;
    Ok((entry, value))
}

/// Write an artifact payload under its resolved filename.
pub fn persist_artifact(
    part: &RawPart,
    index: usize,
    workspace: &Workspace,
) -> Result<ManifestEntry, PersistError> {
    let filename = artifact_filename(part, index);
    write_file(
        workspace,
        PartKind::Artifact,
        &filename,
        part.payload(),
        part.name(),
        part.content_type(),
    )
}

/// Filename for an artifact: disposition filename, else disposition name,
/// else `part_<index>`, sanitized.
///
/// `info.json` is reserved for the decoded info part; an artifact resolving
/// to it is stored as `part_<index>`.
pub fn artifact_filename(part: &RawPart, index: usize) -> String {
    let candidate = part
        .filename()
        .filter(|f| !f.is_empty())
        .or_else(|| part.name().filter(|n| !n.is_empty()));
    match candidate {
        Some(name) => {
            let sanitized = sanitize_filename(name, index);
            if sanitized.eq_ignore_ascii_case(INFO_FILENAME) {
                placeholder(index)
            } else {
                sanitized
            }
        }
        None => placeholder(index),
    }
}

/// Replace path separators so the name stays inside the workspace.
///
/// Names that would still resolve to a directory (`.`, `..`, empty) fall
/// back to `part_<index>`.
pub fn sanitize_filename(name: &str, index: usize) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    match sanitized.as_str() {
        "" | "." | ".." => placeholder(index),
        _ => sanitized,
    }
}

fn placeholder(index: usize) -> String {
    format!("part_{index}")
}

/// Write `bytes` to `<workspace>/<filename>` and describe the result.
///
/// `filename` must already be sanitized.
pub fn write_file(
    workspace: &Workspace,
    kind: PartKind,
    filename: &str,
    bytes: &[u8],
    name: Option<&str>,
    content_type: &str,
) -> Result<ManifestEntry, PersistError> {
    let path = workspace.dir().join(filename);
    let io_err = |source| PersistError::Io {
        path: path.clone(),
        source,
    };

    std::fs::write(&path, bytes).map_err(io_err)?;
    let size_bytes = std::fs::metadata(&path).map_err(io_err)?.len();

    tracing::debug!(
        request_id = %workspace.id(),
        file = %filename,
        size_bytes,
        "Part persisted"
    );

    Ok(ManifestEntry {
        kind,
        name: name.map(str::to_string),
        stored_filename: filename.to_string(),
        path: display_path(&path),
        content_type: content_type.to_string(),
        size_bytes,
    })
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
