use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::{DataUri, ObjectStorage};
use crate::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Stores objects under a root directory and hands out HMAC-signed URLs
/// below `public_base_url`. URLs do not expire; they stay valid while the
/// object and the signing key exist.
pub struct FileObjectStorage {
    root: PathBuf,
    public_base_url: String,
    signing_key: SecretString,
}

impl FileObjectStorage {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: &str, signing_key: SecretString) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signing_key,
        }
    }

    /// Resolves a stored object's relative path to its file, rejecting
    /// anything that would escape the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let relative = validate_relative(relative)?;
        Ok(self.root.join(relative))
    }

    fn mac(&self, relative: &str) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .map_err(|e| StorageError::Signing(e.to_string()))?;
        mac.update(relative.as_bytes());
        Ok(mac)
    }

    /// Builds the signed URL of a stored object.
    pub fn signed_url(&self, relative: &str) -> Result<String, StorageError> {
        let signature = URL_SAFE_NO_PAD.encode(self.mac(relative)?.finalize().into_bytes());
        Ok(format!(
            "{}/{}?signature={}",
            self.public_base_url, relative, signature
        ))
    }

    /// Checks a signature produced by [`Self::signed_url`].
    pub fn verify(&self, relative: &str, signature: &str) -> bool {
        let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        match self.mac(relative) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }

    /// Writes `content` to `<root>/<destination>.<extension>` without
    /// replacing an existing object. Returns the path relative to the root.
    pub fn store(&self, destination: &str, extension: &str, content: &[u8]) -> Result<String, StorageError> {
        store_object(&self.root, destination, extension, content)
    }
}

/// Creates the object file exclusively; a numbered suffix is added on
/// conflict. The returned relative path uses `/` separators.
fn store_object(
    root: &Path,
    destination: &str,
    extension: &str,
    content: &[u8],
) -> Result<String, StorageError> {
    let relative = validate_relative(destination)?;
    let target = root.join(&relative);
    let dir = target
        .parent()
        .ok_or_else(|| StorageError::InvalidDestination(destination.to_string()))?;
    std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let base = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidDestination(destination.to_string()))?
        .to_string();

    for counter in 1..=1000 {
        let filename = if counter == 1 {
            format!("{}.{}", base, extension)
        } else {
            format!("{}_{}.{}", base, counter, extension)
        };
        let path = dir.join(&filename);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content).map_err(|e| StorageError::WriteFile {
                    path: path.clone(),
                    source: e,
                })?;
                let parent = relative.parent().unwrap_or(Path::new(""));
                return Ok(to_url_path(&parent.join(filename)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        }
    }

    Err(StorageError::InvalidDestination(format!(
        "{}: too many objects with this name",
        destination
    )))
}

fn validate_relative(destination: &str) -> Result<PathBuf, StorageError> {
    let path = Path::new(destination.trim_matches('/'));
    if path.as_os_str().is_empty() {
        return Err(StorageError::InvalidDestination(destination.to_string()));
    }
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(StorageError::InvalidDestination(destination.to_string()));
    }
    Ok(path.to_path_buf())
}

fn to_url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStorage for FileObjectStorage {
    async fn upload_data_uri(&self, data_uri: &str, destination: &str) -> Result<String, StorageError> {
        let decoded = DataUri::parse(data_uri)?;
        let size = decoded.bytes.len();
        let root = self.root.clone();
        let destination = destination.to_string();
        let relative = tokio::task::spawn_blocking(move || {
            store_object(&root, &destination, decoded.extension(), &decoded.bytes)
        })
        .await
        .map_err(|e| StorageError::InvalidDestination(format!("write task failed: {}", e)))??;
        tracing::debug!(path = %relative, bytes = size, "Stored object");
        self.signed_url(&relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> FileObjectStorage {
        FileObjectStorage::new(
            dir.path(),
            "http://localhost:8080/media/",
            SecretString::from("test-key".to_string()),
        )
    }

    #[test]
    fn test_store_numbers_conflicts() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let first = storage.store("c1/images/b1", "png", b"one").unwrap();
        let second = storage.store("c1/images/b1", "png", b"two").unwrap();

        assert_eq!(first, "c1/images/b1.png");
        assert_eq!(second, "c1/images/b1_2.png");
        assert_eq!(std::fs::read(dir.path().join("c1/images/b1.png")).unwrap(), b"one");
    }

    #[test]
    fn test_rejects_escaping_destination() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert!(storage.store("../outside", "png", b"x").is_err());
        assert!(storage.store("", "png", b"x").is_err());
        assert!(storage.resolve("a/../../b.png").is_err());
    }

    fn signature_of(url: &str) -> &str {
        url.split_once("?signature=").unwrap().1
    }

    #[test]
    fn test_signed_url_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let url = storage.signed_url("c1/images/b1.png").unwrap();
        assert!(url.starts_with("http://localhost:8080/media/c1/images/b1.png?signature="));

        let signature = signature_of(&url);
        assert!(storage.verify("c1/images/b1.png", signature));
        assert!(!storage.verify("c1/images/b2.png", signature));
        assert!(!storage.verify("c1/images/b1.png", "not-a-signature"));
    }

    #[tokio::test]
    async fn test_uploaded_url_never_expires() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let url = storage
            .upload_data_uri("data:image/png;base64,aGVsbG8=", "c1/images/b1")
            .await
            .unwrap();
        assert!(!url.contains("expires"));

        // A restart with the same key must keep accepting stored URLs.
        let reopened = FileObjectStorage::new(
            dir.path(),
            "http://localhost:8080/media",
            SecretString::from("test-key".to_string()),
        );
        assert!(reopened.verify("c1/images/b1.png", signature_of(&url)));

        let rotated = FileObjectStorage::new(
            dir.path(),
            "http://localhost:8080/media",
            SecretString::from("other-key".to_string()),
        );
        assert!(!rotated.verify("c1/images/b1.png", signature_of(&url)));
    }

    #[tokio::test]
    async fn test_upload_data_uri() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let url = storage
            .upload_data_uri("data:image/png;base64,aGVsbG8=", "c1/b1")
            .await
            .unwrap();
        assert!(url.contains("/media/c1/b1.png?"));
        assert_eq!(std::fs::read(dir.path().join("c1/b1.png")).unwrap(), b"hello");
    }
}
