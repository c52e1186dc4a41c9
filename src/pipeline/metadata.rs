//! Document information dictionary: read and patch.
//!
//! Text strings in the Info dictionary are either PDFDocEncoding (treated as
//! Latin-1 here) or UTF-16BE with a leading byte-order mark. Reads accept
//! both; writes use plain bytes for ASCII and UTF-16BE otherwise.

use crate::error::{EngineFailure, PageSmithError};
use crate::pipeline::load::{resolve, DocumentHandle};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Document, Object, StringFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];

/// Facts about a PDF read without modifying it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// RFC 3339 when the PDF date parses, otherwise the raw string.
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

/// Changes to apply to the Info dictionary.
///
/// `None` leaves a field alone; `Some("")` removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("Title", self.title.as_deref()),
            ("Author", self.author.as_deref()),
            ("Subject", self.subject.as_deref()),
            ("Keywords", self.keywords.as_deref()),
            ("Creator", self.creator.as_deref()),
        ]
    }
}

/// Read the Info dictionary and document-level facts.
pub fn read_metadata(handle: &DocumentHandle) -> DocumentMetadata {
    let doc = handle.document();
    let info = info_dictionary(doc);
    let field = |key: &str| -> Option<String> {
        let dict = info.as_ref()?;
        let value = resolve(doc, dict.get(key.as_bytes()).ok()?);
        match value {
            Object::String(bytes, _) => Some(decode_text(bytes)),
            Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    };
    let date = |key: &str| field(key).map(|raw| normalize_date(&raw));

    DocumentMetadata {
        title: field("Title"),
        author: field("Author"),
        subject: field("Subject"),
        keywords: field("Keywords"),
        creator: field("Creator"),
        producer: field("Producer"),
        creation_date: date("CreationDate"),
        modification_date: date("ModDate"),
        page_count: handle.page_count(),
        pdf_version: doc.version.clone(),
        is_encrypted: doc.trailer.has(b"Encrypt"),
    }
}

/// Write a copy of the document with `patch` applied to its Info dictionary.
///
/// `Producer` and `ModDate` are always stamped.
pub fn apply_metadata(
    handle: &DocumentHandle,
    patch: &MetadataPatch,
    compress: bool,
) -> Result<Vec<u8>, PageSmithError> {
    let mut doc = handle.document().clone();
    let mut info = info_dictionary(&doc).unwrap_or_default();

    for (key, value) in patch.fields() {
        match value {
            None => {}
            Some(v) if v.trim().is_empty() => {
                info.remove(key.as_bytes());
            }
            Some(v) => info.set(key, encode_text(v)),
        }
    }
    info.set(
        "Producer",
        encode_text(concat!("pagesmith ", env!("CARGO_PKG_VERSION"))),
    );
    info.set("ModDate", encode_text(&format_date(Utc::now())));

    // Reuse the existing Info object id when there is one.
    match doc.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) => {
            doc.objects.insert(id, Object::Dictionary(info));
        }
        Err(_) => {
            let id = doc.add_object(info);
            doc.trailer.set("Info", id);
        }
    }

    if compress {
        doc.compress();
    }
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| EngineFailure::new("save", e))?;
    info!("Updated metadata of '{}'", handle.name());
    Ok(buffer)
}

fn info_dictionary(doc: &Document) -> Option<Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info).as_dict().ok().cloned()
}

/// Decode a PDF text string.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&UTF16_BOM) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode a PDF text string object.
pub fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = UTF16_BOM.to_vec();
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    debug!("Encoding non-ASCII text as UTF-16BE ({} bytes)", bytes.len());
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// `D:YYYYMMDDHHmmSS+HH'mm'`
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

/// Parse a PDF date string. Missing trailing components default to their
/// minimum; a missing offset means UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let part = |from: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(from..from + len) {
            Some(p) => p.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, part(4, 2, 1)?, part(6, 2, 1)?)?;
    let naive = date.and_hms_opt(part(8, 2, 0)?, part(10, 2, 0)?, part(12, 2, 0)?)?;

    let rest = &s[digits.len()..];
    let offset = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let nums: String = rest[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = nums.get(0..2)?.parse().ok()?;
            let minutes: i32 = nums.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
            let secs = hours * 3600 + minutes * 60;
            if sign == '+' {
                FixedOffset::east_opt(secs)?
            } else {
                FixedOffset::west_opt(secs)?
            }
        }
        _ => FixedOffset::east_opt(0)?,
    };
    offset.from_local_datetime(&naive).single()
}

fn normalize_date(raw: &str) -> String {
    parse_date(raw)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load::load;
    use crate::pipeline::test_support::TestPdf;

    #[test]
    fn reads_basic_fields() {
        let h = load(&TestPdf::new(2).title("Annual Report").build(), "a.pdf").unwrap();
        let meta = read_metadata(&h);
        assert_eq!(meta.title.as_deref(), Some("Annual Report"));
        assert_eq!(meta.author, None);
        assert_eq!(meta.page_count, 2);
        assert_eq!(meta.pdf_version, "1.7");
        assert!(!meta.is_encrypted);
    }

    #[test]
    fn patch_round_trips_including_non_ascii() {
        let h = load(&TestPdf::new(1).title("Old").build(), "a.pdf").unwrap();
        let patch = MetadataPatch {
            title: Some("Résumé 履歴書".into()),
            author: Some("Ada".into()),
            ..Default::default()
        };
        let bytes = apply_metadata(&h, &patch, true).unwrap();
        let meta = read_metadata(&load(&bytes, "b.pdf").unwrap());
        assert_eq!(meta.title.as_deref(), Some("Résumé 履歴書"));
        assert_eq!(meta.author.as_deref(), Some("Ada"));
        assert!(meta.producer.unwrap().starts_with("pagesmith"));
        assert!(meta.modification_date.is_some());
    }

    #[test]
    fn empty_value_clears_field() {
        let h = load(&TestPdf::new(1).title("Gone soon").build(), "a.pdf").unwrap();
        let patch = MetadataPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        let bytes = apply_metadata(&h, &patch, false).unwrap();
        let meta = read_metadata(&load(&bytes, "b.pdf").unwrap());
        assert_eq!(meta.title, None);
    }

    #[test]
    fn patch_creates_info_when_missing() {
        let h = load(&TestPdf::new(1).build(), "a.pdf").unwrap();
        let patch = MetadataPatch {
            subject: Some("Invoices".into()),
            ..Default::default()
        };
        let bytes = apply_metadata(&h, &patch, true).unwrap();
        let meta = read_metadata(&load(&bytes, "b.pdf").unwrap());
        assert_eq!(meta.subject.as_deref(), Some("Invoices"));
    }

    #[test]
    fn decodes_latin1_and_utf16() {
        assert_eq!(decode_text(b"caf\xe9"), "café");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
    }

    #[test]
    fn parses_pdf_dates() {
        let d = parse_date("D:20240315103000+02'00'").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-03-15T10:30:00+02:00");
        let d = parse_date("D:2024").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn formatted_dates_parse_back() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let s = format_date(now);
        assert_eq!(s, "D:20250601120000+00'00'");
        assert_eq!(parse_date(&s).unwrap().timestamp(), now.timestamp());
    }

    #[test]
    fn empty_patch() {
        assert!(MetadataPatch::default().is_empty());
        let p: MetadataPatch = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert!(!p.is_empty());
        assert!(serde_json::from_str::<MetadataPatch>(r#"{"colour": "red"}"#).is_err());
    }
}
