use async_trait::async_trait;

use crate::domain::UserId;

/// The raw bytes of a stored file plus its original name.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub data: Vec<u8>,
    pub name: String,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn fetch(&self, file_id: &str, user_id: UserId) -> Result<FetchedFile, FileStoreError>;

    /// Stores `data` and returns the new file's id.
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
        user_id: UserId,
    ) -> Result<String, FileStoreError>;

    async fn delete(&self, file_id: &str, user_id: UserId) -> Result<(), FileStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
}
