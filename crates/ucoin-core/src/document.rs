//! Line-oriented document codec shared by every signed document.
//!
//! A raw document is a sequence of `Field: value\n` lines. Multi-line
//! fields (amendment changes lists) are a header line `Field:` followed by
//! one item per line. The detached signature, when present, follows the
//! last line of the document.

use crate::error::UcoinError;
use crate::types::Timestamp;

/// Marker opening an armored detached signature.
pub const SIGNATURE_MARKER: &str = "-----BEGIN";

/// Normalise line endings to `\n`.
pub fn normalize(raw: &str) -> String {
    raw.replace("\r\n", "\n")
}

/// Split `raw` into the signed body and the trailing detached signature.
/// The body keeps its final newline; the signature may be empty.
pub fn split_signed(raw: &str) -> (String, String) {
    let raw = normalize(raw);
    match raw.find(SIGNATURE_MARKER) {
        Some(idx) => (raw[..idx].to_string(), raw[idx..].to_string()),
        None => (raw, String::new()),
    }
}

/// Parsed `Field: value` lines of a document body, in order.
pub struct Fields {
    lines: Vec<(String, String)>,
}

impl Fields {
    pub fn parse(body: &str) -> Result<Self, UcoinError> {
        let body = normalize(body);
        if !body.ends_with('\n') {
            return Err(UcoinError::MalformedDocument(
                "no new line character at the end of the document".into(),
            ));
        }
        let mut lines = Vec::new();
        for line in body.lines() {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((key, value)) if !key.starts_with(['+', '-']) => {
                    lines.push((key.trim().to_string(), value.trim().to_string()));
                }
                // Items of a multi-line field are kept under an empty key.
                _ => lines.push((String::new(), line.trim().to_string())),
            }
        }
        Ok(Self { lines })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, UcoinError> {
        self.get(key)
            .ok_or_else(|| UcoinError::MalformedDocument(format!("missing field {key}")))
    }

    pub fn require_u64(&self, key: &str) -> Result<u64, UcoinError> {
        self.require(key)?.parse().map_err(|_| {
            UcoinError::MalformedDocument(format!("{key} must be a positive or null integer"))
        })
    }

    pub fn require_timestamp(&self, key: &str) -> Result<Timestamp, UcoinError> {
        self.require(key)?.parse().map_err(|_| {
            UcoinError::MalformedDocument(format!("{key} must be a unix timestamp"))
        })
    }

    /// Items listed under the multi-line field `key`.
    pub fn items(&self, key: &str) -> Vec<String> {
        let mut items = Vec::new();
        let mut inside = false;
        for (k, v) in &self.lines {
            if k.is_empty() {
                if inside {
                    items.push(v.clone());
                }
                continue;
            }
            inside = k == key && v.is_empty();
        }
        items
    }
}

/// Human-readable UTC date for error messages.
pub fn format_timestamp(ts: Timestamp) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_split_off() {
        let raw = "Version: 1\r\nIssuer: AB\r\n-----BEGIN PGP SIGNATURE-----\r\nxyz\r\n";
        let (body, sig) = split_signed(raw);
        assert_eq!(body, "Version: 1\nIssuer: AB\n");
        assert!(sig.starts_with(SIGNATURE_MARKER));
    }

    #[test]
    fn multi_line_items() {
        let body = "Number: 2\nMembersChanges:\n+AA\n-BB\nVotersRoot: \nVotersChanges:\n";
        let fields = Fields::parse(body).unwrap();
        assert_eq!(fields.require_u64("Number").unwrap(), 2);
        assert_eq!(fields.items("MembersChanges"), vec!["+AA", "-BB"]);
        assert!(fields.items("VotersChanges").is_empty());
        assert_eq!(fields.get("VotersRoot"), Some(""));
    }

    #[test]
    fn body_must_end_with_newline() {
        assert!(Fields::parse("Version: 1").is_err());
    }

    #[test]
    fn dates_are_readable() {
        assert_eq!(format_timestamp(1_403_301_600), "2014-06-20 22:00:00");
    }
}
