//! Part classification: JSON info vs binary artifact.

use serde::{Deserialize, Serialize};

use crate::multipart::parser::{media_type_essence, RawPart};

/// What a part carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    /// JSON metadata describing the result.
    Info,
    /// Any other payload, persisted as a file.
    Artifact,
}

/// A part tagged with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedPart {
    Info(RawPart),
    Artifact(RawPart),
}

impl ClassifiedPart {
    pub fn from_raw(part: RawPart) -> Self {
        match classify(&part) {
            PartKind::Info => ClassifiedPart::Info(part),
            PartKind::Artifact => ClassifiedPart::Artifact(part),
        }
    }

    pub fn kind(&self) -> PartKind {
        match self {
            ClassifiedPart::Info(_) => PartKind::Info,
            ClassifiedPart::Artifact(_) => PartKind::Artifact,
        }
    }

    pub fn part(&self) -> &RawPart {
        match self {
            ClassifiedPart::Info(part) | ClassifiedPart::Artifact(part) => part,
        }
    }
}

/// Classify a part. First match wins:
/// 1. content type `application/json`
/// 2. filename with a `.json` extension
/// 3. disposition name exactly `info`
/// 4. anything else is an artifact
pub fn classify(part: &RawPart) -> PartKind {
    if media_type_essence(part.content_type()) == "application/json" {
        return PartKind::Info;
    }
    if part
        .filename()
        .is_some_and(|f| f.to_ascii_lowercase().ends_with(".json"))
    {
        return PartKind::Info;
    }
    if part.name() == Some("info") {
        return PartKind::Info;
    }
    PartKind::Artifact
}
