//! Uploaded documents: media type detection, size bound, base64 payload.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::constants::MAX_UPLOAD_BYTES;

/// Extensions accepted for upload and the media type sent for each.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid file type. Please upload a JPG, PNG, GIF, WEBP image or a PDF document.")]
    UnsupportedType(String),
    #[error("File size too large ({size} bytes). Please upload a file smaller than 20MB.")]
    TooLarge { size: u64 },
    #[error("File is empty")]
    Empty,
}

/// Media type for a path, judged by its extension.
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MEDIA_TYPES.iter().find(|(e, _)| *e == ext).map(|(_, mt)| *mt)
}

/// Extension to use when writing bytes of the given media type.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "png",
    }
}

/// A validated upload ready to be sent.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let io_err = |source: std::io::Error| UploadError::Io { path: path.to_path_buf(), source };

        let media_type =
            media_type_for(path).ok_or_else(|| UploadError::UnsupportedType(path.display().to_string()))?;

        // Check the size before pulling the whole file into memory
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge { size });
        }

        let bytes = std::fs::read(path).map_err(io_err)?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Self::from_bytes(name, media_type, bytes)
    }

    pub fn from_bytes(name: impl Into<String>, media_type: &str, bytes: Vec<u8>) -> Result<Self, UploadError> {
        if !MEDIA_TYPES.iter().any(|(_, mt)| *mt == media_type) {
            return Err(UploadError::UnsupportedType(media_type.to_string()));
        }
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        let size = bytes.len() as u64;
        if size > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge { size });
        }
        Ok(Self { name: name.into(), media_type: media_type.to_string(), bytes })
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}
