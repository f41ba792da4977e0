use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Where an uploaded blob lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub key: String,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<BlobRef>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// URL that keeps working for as long as the blob exists.
    fn download_url(&self, blob: &BlobRef) -> String;
}

/// Blob store on local disk, served back under `/blobs`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: &str) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !clean {
            return Err(AppError::InvalidInput(format!("bad blob key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<BlobRef> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {}", path.display(), e)))?;

        tracing::info!("Stored blob {} ({} bytes)", key, data.len());
        Ok(BlobRef {
            key: key.to_string(),
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Storage(format!("delete {}: {}", path.display(), e)))
    }

    fn download_url(&self, blob: &BlobRef) -> String {
        format!("{}/blobs/{}", self.public_base_url, blob.key)
    }
}

/// `{prefix}/{user}/{millis}-{name}`, with the name reduced to safe characters.
pub fn blob_key(prefix: &str, user_id: Uuid, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        prefix,
        user_id,
        Utc::now().timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

pub fn content_type_for(file_name: &str, declared: Option<&str>) -> String {
    declared
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        })
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)
}
