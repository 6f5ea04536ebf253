//! Multipart body parsing and re-encoding.
//!
//! # Responsibilities
//! - Extract the boundary from a `multipart/*` content type
//! - Split a body into segments between delimiter lines
//! - Parse each segment's header block into a `RawPart`
//! - Re-join parts with a boundary (used by tests and mock upstreams)

use bytes::Bytes;
use thiserror::Error;

use crate::multipart::disposition::Disposition;

/// Content type assumed for parts that declare none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised while splitting a multipart body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("content type '{0}' is not multipart")]
    NotMultipart(String),

    #[error("multipart content type has no boundary parameter")]
    MissingBoundary,

    #[error("multipart body has no opening '--{boundary}' delimiter")]
    NoOpeningDelimiter { boundary: String },

    #[error("multipart body ended before the closing '--{boundary}--' delimiter")]
    UnterminatedBody { boundary: String },

    #[error("part {index}: malformed header line {line:?}")]
    MalformedHeader { index: usize, line: String },

    #[error("part {index}: header block is not valid UTF-8")]
    InvalidHeaderEncoding { index: usize },

    #[error("part {index}: header block is not terminated by a blank line")]
    MissingHeaderTerminator { index: usize },
}

/// One part of a multipart body, as found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPart {
    headers: Vec<(String, String)>,
    /// Header lines plus the blank line, verbatim, when parsed from a body.
    header_block: Option<Bytes>,
    content_type: String,
    name: Option<String>,
    filename: Option<String>,
    payload: Bytes,
}

impl RawPart {
    /// Build a part from its header list and payload.
    ///
    /// Content type and disposition fields are derived from `headers`.
    pub fn new(headers: Vec<(String, String)>, payload: impl Into<Bytes>) -> Self {
        let content_type = find_header(&headers, "content-type")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let disposition = find_header(&headers, "content-disposition")
            .map(Disposition::parse)
            .unwrap_or_default();

        Self {
            headers,
            header_block: None,
            content_type,
            name: disposition.name,
            filename: disposition.filename,
            payload: payload.into(),
        }
    }

    /// Headers in wire order, original case.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup (first occurrence).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// `name` parameter of `Content-Disposition`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `filename` (or `filename*`) parameter of `Content-Disposition`.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Whether a content type names a `multipart/*` media type.
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
}

/// Media type without parameters, lowercased (`application/json`).
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Extract the boundary from a `multipart/*` content type.
///
/// `multer` only accepts `multipart/form-data`; the parameter grammar is the
/// same for every multipart subtype, so the parameters are checked under
/// that essence.
pub fn boundary(content_type: &str) -> Result<String, MultipartError> {
    if !is_multipart(content_type) {
        return Err(MultipartError::NotMultipart(content_type.to_string()));
    }
    let normalized = match content_type.split_once(';') {
        Some((_, params)) if !params.trim().is_empty() => format!("multipart/form-data;{params}"),
        _ => return Err(MultipartError::MissingBoundary),
    };
    match multer::parse_boundary(normalized) {
        Ok(boundary) if !boundary.is_empty() => Ok(boundary),
        Ok(_) | Err(multer::Error::NoBoundary) => Err(MultipartError::MissingBoundary),
        Err(_) => Err(MultipartError::NotMultipart(content_type.to_string())),
    }
}

/// A delimiter line found in the body.
struct Delimiter {
    /// End of the preceding segment (line break excluded).
    content_end: usize,
    /// First byte after `--boundary`.
    after: usize,
}

/// Find the next `--boundary` that starts a line and is followed by `--`,
/// transport padding, a line break, or the end of the body.
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<Delimiter> {
    let mut search = from;
    while search + delimiter.len() <= body.len() {
        let offset = body[search..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)?;
        let start = search + offset;
        let after = start + delimiter.len();

        let at_line_start = start == 0 || body[start - 1] == b'\n';
        let well_terminated = match body.get(after) {
            None => true,
            Some(b'-') | Some(b'\r') | Some(b'\n') | Some(b' ') | Some(b'\t') => true,
            Some(_) => false,
        };

        if at_line_start && well_terminated {
            let mut content_end = start;
            if content_end > from && body[content_end - 1] == b'\n' {
                content_end -= 1;
                if content_end > from && body[content_end - 1] == b'\r' {
                    content_end -= 1;
                }
            }
            return Some(Delimiter { content_end, after });
        }
        search = start + 1;
    }
    None
}

/// Split a multipart body into its parts.
///
/// Fails on the first malformed segment; a body is either parsed completely
/// or not at all.
pub fn parse(body: &Bytes, content_type: &str) -> Result<Vec<RawPart>, MultipartError> {
    let boundary = boundary(content_type)?;
    let boundary = boundary.as_str();
    let delimiter = format!("--{boundary}").into_bytes();
    let bytes = body.as_ref();

    let open = find_delimiter(bytes, &delimiter, 0).ok_or_else(|| {
        MultipartError::NoOpeningDelimiter {
            boundary: boundary.to_string(),
        }
    })?;

    let unterminated = || MultipartError::UnterminatedBody {
        boundary: boundary.to_string(),
    };

    let mut parts = Vec::new();
    let mut cursor = open.after;
    loop {
        let rest = &bytes[cursor..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }

        // Skip transport padding and the line break ending the delimiter line.
        let padding = rest
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        let line_break = match &rest[padding..] {
            [b'\r', b'\n', ..] => 2,
            [b'\n', ..] => 1,
            _ => return Err(unterminated()),
        };

        let content_start = cursor + padding + line_break;
        let next = find_delimiter(bytes, &delimiter, content_start).ok_or_else(unterminated)?;
        let content_end = next.content_end.max(content_start);

        parts.push(parse_segment(body.slice(content_start..content_end), parts.len())?);
        cursor = next.after;
    }
}

/// Parse one segment: header block, blank line, payload.
fn parse_segment(segment: Bytes, index: usize) -> Result<RawPart, MultipartError> {
    let raw = segment.as_ref();
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut line_start = 0;

    let payload_start = loop {
        let Some(newline) = raw[line_start..].iter().position(|b| *b == b'\n') else {
            return Err(MultipartError::MissingHeaderTerminator { index });
        };
        let line_end = line_start + newline;
        let mut line = &raw[line_start..line_end];
        if let [head @ .., b'\r'] = line {
            line = head;
        }
        if line.is_empty() {
            break line_end + 1;
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| MultipartError::InvalidHeaderEncoding { index })?;
        let malformed = || MultipartError::MalformedHeader {
            index,
            line: line.to_string(),
        };

        if line.starts_with([' ', '\t']) {
            // obs-fold continuation
            let (_, value) = headers.last_mut().ok_or_else(malformed)?;
            value.push(' ');
            value.push_str(line.trim());
        } else {
            let (name, value) = line.split_once(':').ok_or_else(malformed)?;
            if name.is_empty() || name.contains(|c: char| c.is_whitespace()) {
                return Err(malformed());
            }
            headers.push((name.to_string(), value.trim().to_string()));
        }
        line_start = line_end + 1;
    };

    let mut part = RawPart::new(headers, segment.slice(payload_start..));
    part.header_block = Some(segment.slice(..payload_start));
    Ok(part)
}

/// Re-join parts with `boundary`.
///
/// Parsed parts keep their header bytes exactly as received; parts built
/// with `RawPart::new` get canonical `Name: value` lines.
pub fn encode(parts: &[RawPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        match &part.header_block {
            Some(block) => out.extend_from_slice(block),
            None => {
                for (name, value) in part.headers() {
                    out.extend_from_slice(name.as_bytes());
                    out.extend_from_slice(b": ");
                    out.extend_from_slice(value.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"\r\n");
            }
        }
        out.extend_from_slice(part.payload());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    out
}
