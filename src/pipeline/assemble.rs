//! Turning one upstream response into persisted parts.
//!
//! # Rules
//! - Multipart bodies are split and every part is persisted in order
//! - The last info part decides `info`; if it does not decode, `info` is
//!   null and its raw bytes are kept on disk as an artifact
//! - A non-multipart body is classified as a single part: info is decoded
//!   in place (nothing written), anything else is saved as one artifact

use serde::Serialize;

use crate::error::BridgeError;
use crate::multipart::{self, ClassifiedPart, PartKind, RawPart};
use crate::observability::metrics;
use crate::upstream::UpstreamResponse;
use crate::workspace::persister::{decode_info, persist_artifact, sanitize_filename, write_file};
use crate::workspace::{persist, ManifestEntry, PersistError, PersistedPart, Workspace};

/// Filename used when a raw download carries no usable filename.
pub const DEFAULT_DOWNLOAD_FILENAME: &str = "output.stl";

/// Everything one forward produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForwardResult {
    /// Persisted parts in response order.
    pub parts: Vec<ManifestEntry>,
    pub info: Option<serde_json::Value>,
}

impl ForwardResult {
    /// Stored filename of the last artifact, if any.
    pub fn last_artifact(&self) -> Option<&str> {
        self.parts
            .iter()
            .rev()
            .find(|entry| entry.kind == PartKind::Artifact)
            .map(|entry| entry.stored_filename.as_str())
    }
}

/// Decode and persist a 2xx upstream response into `workspace`.
///
/// Does blocking disk I/O; call from `spawn_blocking`.
pub fn assemble(response: &UpstreamResponse, workspace: &Workspace) -> Result<ForwardResult, BridgeError> {
    if multipart::is_multipart(&response.content_type) {
        let parts = multipart::parse(&response.body, &response.content_type)?;
        tracing::debug!(
            request_id = %workspace.id(),
            parts = parts.len(),
            "Upstream multipart response parsed"
        );
        assemble_parts(parts, workspace)
    } else {
        assemble_single(response, workspace)
    }
}

fn assemble_parts(parts: Vec<RawPart>, workspace: &Workspace) -> Result<ForwardResult, BridgeError> {
    let mut result = ForwardResult::default();

    for (index, raw) in parts.into_iter().enumerate() {
        let classified = ClassifiedPart::from_raw(raw);
        match persist(&classified, index, workspace) {
            Ok(PersistedPart::Info { entry, value }) => {
                if result.info.is_some() {
                    tracing::warn!(
                        request_id = %workspace.id(),
                        index,
                        "Multiple info parts in response; keeping the latest"
                    );
                }
                metrics::record_persisted("info", entry.size_bytes);
                result.parts.push(entry);
                result.info = Some(value);
            }
            Ok(PersistedPart::Artifact { entry }) => {
                metrics::record_persisted("artifact", entry.size_bytes);
                result.parts.push(entry);
            }
            Err(PersistError::MalformedInfo(reason)) => {
                tracing::warn!(
                    request_id = %workspace.id(),
                    index,
                    reason = %reason,
                    "Info part is not valid JSON; storing raw bytes"
                );
                result.info = None;
                let entry = persist_artifact(classified.part(), index, workspace)?;
                metrics::record_persisted("artifact", entry.size_bytes);
                result.parts.push(entry);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(result)
}

fn assemble_single(response: &UpstreamResponse, workspace: &Workspace) -> Result<ForwardResult, BridgeError> {
    if response.body.is_empty() {
        return Ok(ForwardResult::default());
    }

    match ClassifiedPart::from_raw(single_part(response)) {
        ClassifiedPart::Info(part) => match decode_info(part.payload()) {
            Ok(value) => Ok(ForwardResult {
                parts: Vec::new(),
                info: Some(value),
            }),
            Err(e) => {
                tracing::warn!(
                    request_id = %workspace.id(),
                    error = %e,
                    "Non-multipart JSON response could not be decoded"
                );
                Ok(ForwardResult::default())
            }
        },
        ClassifiedPart::Artifact(part) => {
            let entry = persist_artifact(&part, 0, workspace)?;
            metrics::record_persisted("artifact", entry.size_bytes);
            Ok(ForwardResult {
                parts: vec![entry],
                info: None,
            })
        }
    }
}

/// Save a response body verbatim, named after its `Content-Disposition`
/// filename or `output.stl`.
pub fn save_download(response: &UpstreamResponse, workspace: &Workspace) -> Result<ManifestEntry, BridgeError> {
    let filename = response
        .content_disposition
        .as_deref()
        .map(multipart::disposition::Disposition::parse)
        .and_then(|d| d.filename)
        .filter(|f| !f.is_empty())
        .map(|f| sanitize_filename(&f, 0))
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_FILENAME.to_string());

    let content_type = if response.content_type.is_empty() {
        multipart::parser::DEFAULT_CONTENT_TYPE
    } else {
        response.content_type.as_str()
    };

    let entry = write_file(
        workspace,
        PartKind::Artifact,
        &filename,
        &response.body,
        None,
        content_type,
    )?;
    metrics::record_persisted("artifact", entry.size_bytes);
    Ok(entry)
}

fn single_part(response: &UpstreamResponse) -> RawPart {
    let mut headers = Vec::new();
    if !response.content_type.is_empty() {
        headers.push(("Content-Type".to_string(), response.content_type.clone()));
    }
    if let Some(cd) = &response.content_disposition {
        headers.push(("Content-Disposition".to_string(), cd.clone()));
    }
    RawPart::new(headers, response.body.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceRoot;
    use bytes::Bytes;
    use serde_json::json;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let tmp = tempfile::tempdir().unwrap();
        let ws = WorkspaceRoot::new(tmp.path()).create_workspace().unwrap();
        (tmp, ws)
    }

    fn response(content_type: &str, disposition: Option<&str>, body: impl Into<Bytes>) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            content_type: content_type.to_string(),
            content_disposition: disposition.map(str::to_string),
            body: body.into(),
        }
    }

    fn part(headers: &[(&str, &str)], payload: &[u8]) -> RawPart {
        RawPart::new(
            headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            payload.to_vec(),
        )
    }

    fn multipart_response(parts: &[RawPart]) -> UpstreamResponse {
        let body = multipart::encode(parts, "XyZ");
        response("multipart/mixed; boundary=XyZ", None, body)
    }

    #[test]
    fn test_info_and_artifact() {
        let (_tmp, ws) = workspace();
        let resp = multipart_response(&[
            part(
                &[("Content-Type", "application/json"), ("Content-Disposition", "form-data; name=\"info\"")],
                br#"{"volume": 12.5}"#,
            ),
            part(
                &[
                    ("Content-Type", "application/octet-stream"),
                    ("Content-Disposition", "attachment; filename=\"part.stl\""),
                ],
                b"solid x\nendsolid x\n",
            ),
        ]);

        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result.info, Some(json!({ "volume": 12.5 })));
        assert_eq!(result.parts.len(), 2);
        assert_eq!(result.parts[0].stored_filename, "info.json");
        assert_eq!(result.parts[1].stored_filename, "part.stl");
        assert_eq!(result.last_artifact(), Some("part.stl"));
        assert_eq!(
            std::fs::read(ws.dir().join("part.stl")).unwrap(),
            b"solid x\nendsolid x\n"
        );
    }

    #[test]
    fn test_latest_info_wins() {
        let (_tmp, ws) = workspace();
        let resp = multipart_response(&[
            part(&[("Content-Type", "application/json")], br#"{"n": 1}"#),
            part(&[("Content-Type", "application/json")], br#"{"n": 2}"#),
        ]);

        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result.info, Some(json!({ "n": 2 })));
        let on_disk: serde_json::Value =
            serde_json::from_slice(&std::fs::read(ws.dir().join("info.json")).unwrap()).unwrap();
        assert_eq!(on_disk, json!({ "n": 2 }));
        assert_eq!(result.last_artifact(), None);
    }

    #[test]
    fn test_malformed_latest_info_clears_info() {
        let (_tmp, ws) = workspace();
        let resp = multipart_response(&[
            part(&[("Content-Type", "application/json")], br#"{"n": 1}"#),
            part(
                &[("Content-Type", "application/json"), ("Content-Disposition", "form-data; name=\"info\"")],
                b"{broken",
            ),
        ]);

        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result.info, None);
        assert_eq!(result.parts[0].kind, PartKind::Info);
        assert_eq!(result.parts[1].kind, PartKind::Artifact);
        assert_eq!(result.parts[1].stored_filename, "info");
        assert_eq!(std::fs::read(ws.dir().join("info")).unwrap(), b"{broken");
    }

    #[test]
    fn test_good_info_after_malformed_one_wins() {
        let (_tmp, ws) = workspace();
        let resp = multipart_response(&[
            part(&[("Content-Type", "application/json")], b"{broken"),
            part(&[("Content-Type", "application/json")], br#"{"n": 2}"#),
        ]);

        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result.info, Some(json!({ "n": 2 })));
    }

    #[test]
    fn test_artifact_named_info_json_keeps_info_intact() {
        let (_tmp, ws) = workspace();
        let resp = multipart_response(&[
            part(&[("Content-Type", "application/json")], br#"{"volume": 12.5}"#),
            part(
                &[
                    ("Content-Type", "application/octet-stream"),
                    ("Content-Disposition", "form-data; name=\"info.json\""),
                ],
                &[0xAB; 10],
            ),
        ]);

        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result.info, Some(json!({ "volume": 12.5 })));
        assert_eq!(result.parts[1].stored_filename, "part_1");

        let on_disk = std::fs::read(ws.dir().join("info.json")).unwrap();
        assert_eq!(result.parts[0].size_bytes, on_disk.len() as u64);
        let value: serde_json::Value = serde_json::from_slice(&on_disk).unwrap();
        assert_eq!(value, json!({ "volume": 12.5 }));
        assert_eq!(std::fs::read(ws.dir().join("part_1")).unwrap(), [0xAB; 10]);
    }

    #[test]
    fn test_duplicate_filenames_both_reported() {
        let (_tmp, ws) = workspace();
        let headers = [
            ("Content-Type", "application/octet-stream"),
            ("Content-Disposition", "attachment; filename=\"result.bin\""),
        ];
        let resp = multipart_response(&[part(&headers, b"first"), part(&headers, b"second")]);

        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result.parts.len(), 2);
        assert_eq!(result.parts[0].path, result.parts[1].path);
        assert_eq!(std::fs::read(ws.dir().join("result.bin")).unwrap(), b"second");
    }

    #[test]
    fn test_malformed_multipart_fails() {
        let (_tmp, ws) = workspace();
        let resp = response("multipart/mixed; boundary=XyZ", None, &b"--XyZ\r\nno terminator"[..]);
        assert!(matches!(assemble(&resp, &ws), Err(BridgeError::MalformedResponse(_))));

        let resp = response("multipart/mixed", None, &b"whatever"[..]);
        assert!(matches!(assemble(&resp, &ws), Err(BridgeError::MalformedResponse(_))));
    }

    #[test]
    fn test_non_multipart_json_is_info_only() {
        let (_tmp, ws) = workspace();
        let resp = response("application/json", None, &br#"{"ok": true}"#[..]);
        let result = assemble(&resp, &ws).unwrap();
        assert_eq!(result, ForwardResult { parts: vec![], info: Some(json!({ "ok": true })) });
        assert_eq!(std::fs::read_dir(ws.dir()).unwrap().count(), 0);

        let resp = response("application/json", None, &b"not json"[..]);
        assert_eq!(assemble(&resp, &ws).unwrap(), ForwardResult::default());
    }

    #[test]
    fn test_non_multipart_binary_is_single_artifact() {
        let (_tmp, ws) = workspace();
        let resp = response(
            "application/sla",
            Some("attachment; filename=\"mesh.stl\""),
            &b"\x00\x01binary"[..],
        );
        let result = assemble(&resp, &ws).unwrap();
        assert!(result.info.is_none());
        assert_eq!(result.parts.len(), 1);
        assert_eq!(result.parts[0].stored_filename, "mesh.stl");
        assert_eq!(result.parts[0].content_type, "application/sla");

        let resp = response("", None, Bytes::new());
        assert_eq!(assemble(&resp, &ws).unwrap(), ForwardResult::default());
    }

    #[test]
    fn test_save_download_filename() {
        let (_tmp, ws) = workspace();
        let named = response("application/sla", Some("attachment; filename=\"../updated.stl\""), &b"abc"[..]);
        let entry = save_download(&named, &ws).unwrap();
        assert_eq!(entry.stored_filename, ".._updated.stl");
        assert_eq!(entry.size_bytes, 3);

        let unnamed = response("", None, &b"abcd"[..]);
        let entry = save_download(&unnamed, &ws).unwrap();
        assert_eq!(entry.stored_filename, DEFAULT_DOWNLOAD_FILENAME);
        assert_eq!(entry.content_type, "application/octet-stream");
    }
}
