use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use thiserror::Error;
use tracing::debug;

use crate::content::ContentKind;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Errors raised while loading a document from disk.
/// 從磁碟載入文件時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document {path} is not valid text in any supported encoding")]
    InvalidEncoding { path: PathBuf },
}

/// Raw document text together with how it was decoded and how it should be paginated.
/// 文件原始文字，連同其解碼方式與分頁所採用的內容類型。
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub path: Option<PathBuf>,
    /// WHATWG name of the encoding the bytes were decoded from.
    pub encoding: String,
    pub kind: ContentKind,
}

impl Document {
    pub fn from_text(text: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            text: text.into(),
            path: None,
            encoding: UTF_8.name().to_string(),
            kind,
        }
    }

    /// Reads and decodes `path`; the content kind follows the file extension.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (text, encoding) =
            decode_bytes(&bytes).ok_or_else(|| DocumentError::InvalidEncoding {
                path: path.to_path_buf(),
            })?;
        let kind = ContentKind::from_path(path);
        debug!(
            path = %path.display(),
            encoding = encoding.name(),
            kind = kind.name(),
            bytes = bytes.len(),
            "loaded document"
        );
        Ok(Self {
            text,
            path: Some(path.to_path_buf()),
            encoding: encoding.name().to_string(),
            kind,
        })
    }

    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn title(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Decodes `bytes`, trying byte-order marks, UTF-16 heuristics, UTF-8 and finally a
/// detected legacy encoding, in that order.
fn decode_bytes(bytes: &[u8]) -> Option<(String, &'static Encoding)> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return String::from_utf8(rest.to_vec()).ok().map(|text| (text, UTF_8));
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return decode_utf16(rest, false).map(|text| (text, UTF_16LE));
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return decode_utf16(rest, true).map(|text| (text, UTF_16BE));
    }
    if looks_like_utf16(bytes, false) {
        if let Some(text) = decode_utf16(bytes, false) {
            return Some((text, UTF_16LE));
        }
    }
    if looks_like_utf16(bytes, true) {
        if let Some(text) = decode_utf16(bytes, true) {
            return Some((text, UTF_16BE));
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some((text.to_string(), UTF_8));
    }
    let legacy = detect_legacy_encoding(bytes)?;
    decode_legacy(bytes, legacy).map(|text| (text, legacy))
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

fn decode_legacy(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (cow, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return None;
    }
    Some(match cow {
        Cow::Borrowed(slice) => slice.to_owned(),
        Cow::Owned(string) => string,
    })
}

fn detect_legacy_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.is_empty() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    Some(detector.guess(None, true))
}

/// Half or more of the sampled code units carry a zero high byte.
fn looks_like_utf16(bytes: &[u8], big_endian: bool) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }
    let sample_len = bytes.len().min(64);
    let mut zero_count = 0;
    let mut total = 0;
    for chunk in bytes[..sample_len].chunks_exact(2) {
        let high = if big_endian { chunk[0] } else { chunk[1] };
        if high == 0 {
            zero_count += 1;
        }
        total += 1;
    }
    total > 0 && zero_count * 2 >= total
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn utf8_with_bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "notes.txt", b"\xEF\xBB\xBFhello\n");
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.text, "hello\n");
        assert_eq!(doc.encoding, "UTF-8");
        assert_eq!(doc.kind, ContentKind::PlainText);
        assert_eq!(doc.title(), "notes.txt");
    }

    #[test]
    fn utf16_le_with_bom_is_decoded() {
        let dir = tempdir().unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "fn main() {}".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let path = write(dir.path(), "main.rs", &bytes);
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.text, "fn main() {}");
        assert_eq!(doc.encoding, "UTF-16LE");
        assert_eq!(
            doc.kind,
            ContentKind::Code {
                language: "rust".into()
            }
        );
    }

    #[test]
    fn utf16_be_without_bom_is_detected() {
        let dir = tempdir().unwrap();
        let mut bytes = Vec::new();
        for unit in "plain".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let path = write(dir.path(), "plain.txt", &bytes);
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.text, "plain");
        assert_eq!(doc.encoding, "UTF-16BE");
    }

    #[test]
    fn legacy_bytes_fall_back_to_detection() {
        let dir = tempdir().unwrap();
        // "Le café est prêt" in windows-1252.
        let path = write(dir.path(), "menu.txt", b"Le caf\xE9 est pr\xEAt");
        let doc = Document::load(&path).unwrap();
        assert!(doc.text.starts_with("Le caf\u{e9}"));
        assert_ne!(doc.encoding, "UTF-8");
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.txt");
        let err = Document::load(&missing).unwrap_err();
        assert!(matches!(err, DocumentError::Io { ref path, .. } if path == &missing));
    }

    #[test]
    fn html_extension_selects_html_kind() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "index.HTML", b"<p>hi</p>");
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.kind, ContentKind::Html);
        let overridden = doc.with_kind(ContentKind::PlainText);
        assert_eq!(overridden.kind, ContentKind::PlainText);
    }
}
