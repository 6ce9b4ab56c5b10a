//! File attachments for chat: upload to object storage plus text extraction.

pub mod handlers;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    #[default]
    File,
    Image,
}

impl AttachmentType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "file" => Some(AttachmentType::File),
            "image" => Some(AttachmentType::Image),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentType::File => "file",
            AttachmentType::Image => "image",
        }
    }
}

/// Lower-cased extension of a file name, if it has one.
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// `<type>s/<uuid>.<ext>`, or without the extension when there is none.
pub fn storage_key(kind: AttachmentType, id: Uuid, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}s/{id}.{ext}", kind.as_str()),
        None => format!("{}s/{id}", kind.as_str()),
    }
}

/// Plain text of an uploaded file. PDFs go through pdf-extract, `txt` and
/// `md` are read as UTF-8, everything else yields an empty string.
pub fn extract_text(ext: Option<&str>, bytes: &[u8]) -> String {
    match ext {
        Some("pdf") => pdf_extract::extract_text_from_mem(bytes).unwrap_or_else(|e| {
            warn!("PDF text extraction failed: {e}");
            String::new()
        }),
        Some("txt") | Some("md") => String::from_utf8_lossy(bytes).into_owned(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type() {
        assert_eq!(AttachmentType::parse("image"), Some(AttachmentType::Image));
        assert_eq!(AttachmentType::parse(""), Some(AttachmentType::File));
        assert_eq!(AttachmentType::parse("video"), None);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Notes.MD"), Some("md".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".env"), None);
    }

    #[test]
    fn test_storage_key() {
        let id = Uuid::nil();
        assert_eq!(
            storage_key(AttachmentType::Image, id, Some("png")),
            format!("images/{id}.png")
        );
        assert_eq!(storage_key(AttachmentType::File, id, None), format!("files/{id}"));
    }

    #[test]
    fn test_extract_plain_text() {
        assert_eq!(extract_text(Some("txt"), b"hello"), "hello");
        assert_eq!(extract_text(Some("md"), "# Title".as_bytes()), "# Title");
        assert_eq!(extract_text(Some("docx"), b"PK"), "");
        assert_eq!(extract_text(None, b"data"), "");
    }
}
