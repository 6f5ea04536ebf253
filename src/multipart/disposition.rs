//! `Content-Disposition` tokenizing.

/// Parameters extracted from a `Content-Disposition` header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type (`form-data`, `attachment`, ...), lowercased.
    pub kind: Option<String>,
    /// Logical field name (`name=`).
    pub name: Option<String>,
    /// Filename (`filename*=` wins over `filename=`).
    pub filename: Option<String>,
}

impl Disposition {
    /// Parse a header value such as `form-data; name="info"; filename="a.json"`.
    pub fn parse(value: &str) -> Self {
        let mut out = Disposition::default();
        let mut extended_filename = None;

        for (i, token) in split_params(value).into_iter().enumerate() {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let Some((key, raw)) = token.split_once('=') else {
                if i == 0 {
                    out.kind = Some(token.to_ascii_lowercase());
                }
                continue;
            };
            let key = key.trim();
            let raw = raw.trim();
            if key.eq_ignore_ascii_case("name") {
                out.name = Some(unquote(raw));
            } else if key.eq_ignore_ascii_case("filename") {
                out.filename = Some(unquote(raw));
            } else if key.eq_ignore_ascii_case("filename*") {
                extended_filename = decode_ext_value(&unquote(raw));
            }
        }

        if extended_filename.is_some() {
            out.filename = extended_filename;
        }
        out
    }
}

/// Split on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Strip surrounding quotes and resolve backslash escapes.
fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode an RFC 5987 ext-value (`UTF-8''na%C3%AFve.stl`).
///
/// Returns `None` for charsets other than UTF-8 or undecodable input, in
/// which case the plain `filename=` parameter is used.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut pieces = raw.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }

    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_filename() {
        let d = Disposition::parse(r#"form-data; name="file"; filename="part.stl""#);
        assert_eq!(d.kind.as_deref(), Some("form-data"));
        assert_eq!(d.name.as_deref(), Some("file"));
        assert_eq!(d.filename.as_deref(), Some("part.stl"));
    }

    #[test]
    fn test_unquoted_values_and_case_insensitive_keys() {
        let d = Disposition::parse("attachment; NAME=info; FileName=out.json");
        assert_eq!(d.kind.as_deref(), Some("attachment"));
        assert_eq!(d.name.as_deref(), Some("info"));
        assert_eq!(d.filename.as_deref(), Some("out.json"));
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        let d = Disposition::parse(r#"attachment; filename="a;b \"c\".stl""#);
        assert_eq!(d.filename.as_deref(), Some(r#"a;b "c".stl"#));
        assert_eq!(d.name, None);
    }

    #[test]
    fn test_extended_filename_wins() {
        let d = Disposition::parse("attachment; filename=\"fallback.stl\"; filename*=UTF-8''na%C3%AFve.stl");
        assert_eq!(d.filename.as_deref(), Some("naïve.stl"));
    }

    #[test]
    fn test_bad_extended_filename_falls_back() {
        let d = Disposition::parse("attachment; filename=\"fallback.stl\"; filename*=UTF-8''bad%ZZ");
        assert_eq!(d.filename.as_deref(), Some("fallback.stl"));
    }

    #[test]
    fn test_empty_header() {
        assert_eq!(Disposition::parse(""), Disposition::default());
    }
}
