//! Object storage for generated media.

pub mod filesystem;

use async_trait::async_trait;

use crate::error::StorageError;

pub use filesystem::FileObjectStorage;

/// Persists a data URI and returns a URL clients can fetch it from.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// `destination` is a relative path without extension; the extension is
    /// derived from the data URI's media type.
    async fn upload_data_uri(&self, data_uri: &str, destination: &str)
        -> Result<String, StorageError>;
}

/// A decoded `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn parse(uri: &str) -> Result<Self, StorageError> {
        use base64::Engine;

        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| StorageError::InvalidDataUri("missing 'data:' prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StorageError::InvalidDataUri("missing ',' separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| StorageError::InvalidDataUri("only base64 payloads are supported".to_string()))?;
        let mime_type = if mime_type.is_empty() {
            "application/octet-stream"
        } else {
            mime_type
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| StorageError::InvalidDataUri(e.to_string()))?;
        if bytes.is_empty() {
            return Err(StorageError::InvalidDataUri("empty payload".to_string()));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// File extension for the media type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first().copied())
                .unwrap_or("bin"),
        }
    }
}
