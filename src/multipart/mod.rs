//! Multipart response de-multiplexing.
//!
//! # Data Flow
//! ```text
//! upstream body + Content-Type
//!     → parser.rs (boundary split, header blocks → RawPart)
//!     → disposition.rs (name / filename from Content-Disposition)
//!     → classifier.rs (Info | Artifact)
//!     → workspace::persister (disk)
//! ```
//!
//! # Design Decisions
//! - A malformed segment fails the whole parse; partial results are never
//!   reported as success
//! - Headers keep their original order and case so a parsed body can be
//!   re-encoded byte for byte

pub mod classifier;
pub mod disposition;
pub mod parser;

pub use classifier::{classify, ClassifiedPart, PartKind};
pub use parser::{encode, is_multipart, parse, MultipartError, RawPart};
