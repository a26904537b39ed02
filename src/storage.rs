use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Directory, relative to the assets root, that receives user photos.
pub const USER_PHOTO_DIR: &str = "img/users";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// StorageService
///
/// Where uploaded user photos end up. Handlers only ever see the returned
/// `photo_url`, which is relative to the `/resources` mount.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn save_user_photo(&self, filename: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Removes a photo previously returned by `save_user_photo`.
    async fn delete_user_photo(&self, key: &str) -> Result<(), StorageError>;
}

/// LocalDiskStorage
///
/// Writes photos below `{assets_dir}/img/users`, which is the same directory
/// tree `ServeDir` exposes, so a stored photo is immediately reachable.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: assets_dir.into(),
        }
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn save_user_photo(&self, filename: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let name = photo_name(filename);

        // Uuid prefix keeps two uploads of "me.png" apart.
        let key = format!("{}/{}-{}", USER_PHOTO_DIR, Uuid::new_v4(), name);

        let dir = self.root.join(USER_PHOTO_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.root.join(&key), bytes).await?;

        tracing::debug!(photo = %key, size = bytes.len(), "stored user photo");
        Ok(key)
    }

    async fn delete_user_photo(&self, key: &str) -> Result<(), StorageError> {
        if !key.starts_with(USER_PHOTO_DIR) || key.contains("..") {
            return Err(StorageError::Other(format!("not a user photo: {:?}", key)));
        }

        tokio::fs::remove_file(self.root.join(key)).await?;
        tracing::debug!(photo = %key, "removed user photo");
        Ok(())
    }
}

/// sanitize_filename
///
/// Keeps only the last path component of a client-supplied file name and drops
/// anything outside `[A-Za-z0-9._-]`. Returns `None` when nothing usable is
/// left (empty, `.`, `..`).
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let last = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

/// photo_name
///
/// The stored name for an upload. Falls back to `photo` when sanitizing leaves
/// nothing, or nothing but an extension, so no file name can block a registration.
pub fn photo_name(filename: &str) -> String {
    match sanitize_filename(filename) {
        Some(ext) if ext.starts_with('.') => format!("photo{}", ext),
        Some(name) => name,
        None => "photo".to_string(),
    }
}

/// MockStorageService
///
/// In-memory stand-in for tests. Returns a deterministic url and never touches
/// the disk. Deleted keys are recorded in `deleted`.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every save fails.
    pub should_fail: bool,
    pub deleted: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().map(|keys| keys.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn save_user_photo(&self, filename: &str, _bytes: &[u8]) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Other(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        Ok(format!("{}/mock-{}", USER_PHOTO_DIR, photo_name(filename)))
    }

    async fn delete_user_photo(&self, key: &str) -> Result<(), StorageError> {
        if let Ok(mut keys) = self.deleted.lock() {
            keys.push(key.to_string());
        }
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
