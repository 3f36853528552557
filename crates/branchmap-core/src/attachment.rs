use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AttachmentError;

/// A user file carried along with a prompt, base64-encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

/// How a renderer should present an attachment. Decided by MIME type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    ImagePreview,
    Badge,
}

impl Attachment {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let display = path.display().to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AttachmentError::NoFileName(display.clone()))?;
        let bytes = fs::read(path).map_err(|source| AttachmentError::Read {
            path: display,
            source,
        })?;
        Ok(Self::from_bytes(name, guess_mime(path), &bytes))
    }

    pub fn kind(&self) -> AttachmentKind {
        if self.mime_type.starts_with("image/") {
            AttachmentKind::ImagePreview
        } else {
            AttachmentKind::Badge
        }
    }

    pub fn decoded(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mime_type_decides_preview_kind() {
        let img = Attachment::from_bytes("cat.png", "image/png", b"\x89PNG");
        let doc = Attachment::from_bytes("notes.pdf", "application/pdf", b"%PDF");
        assert_eq!(img.kind(), AttachmentKind::ImagePreview);
        assert_eq!(doc.kind(), AttachmentKind::Badge);
    }

    #[test]
    fn from_path_encodes_file_contents() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("trip.TXT");
        fs::write(&path, b"pack light").expect("write");

        let att = Attachment::from_path(&path).expect("attachment");

        assert_eq!(att.name, "trip.TXT");
        assert_eq!(att.mime_type, "text/plain");
        assert_eq!(att.data, "cGFjayBsaWdodA==");
        assert_eq!(att.decoded().expect("decode"), b"pack light");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().expect("tempdir");
        let err = Attachment::from_path(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, AttachmentError::Read { .. }));
    }
}
