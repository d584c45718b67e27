use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{FetchedFile, FileStore, FileStoreError};
use crate::domain::UserId;

/// Client for the internal file service: resolves a file id to a signed URL,
/// streams the bytes down, uploads synthesis results, deletes staged inputs.
pub struct HttpFileStore {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFileStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn file_endpoint(&self, file_id: &str, user_id: UserId) -> String {
        format!(
            "{}/files/{}?user_id={}",
            self.base_url, file_id, user_id
        )
    }
}

#[derive(Deserialize)]
struct FileUrlResponse {
    url: String,
    name: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn fetch(&self, file_id: &str, user_id: UserId) -> Result<FetchedFile, FileStoreError> {
        let response = self
            .client
            .get(self.file_endpoint(file_id, user_id))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FileStoreError::DownloadFailed(format!("request: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FileStoreError::NotFound(file_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(FileStoreError::DownloadFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let located: FileUrlResponse = response
            .json()
            .await
            .map_err(|e| FileStoreError::DownloadFailed(format!("parse response: {}", e)))?;

        let data = self
            .client
            .get(&located.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FileStoreError::DownloadFailed(format!("download: {}", e)))?
            .error_for_status()
            .map_err(|e| FileStoreError::DownloadFailed(format!("download: {}", e)))?
            .bytes()
            .await
            .map_err(|e| FileStoreError::DownloadFailed(format!("read body: {}", e)))?;

        Ok(FetchedFile {
            data: data.to_vec(),
            name: located.name,
        })
    }

    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
        user_id: UserId,
    ) -> Result<String, FileStoreError> {
        let file_part = multipart::Part::bytes(data)
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| FileStoreError::UploadFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("user_id", user_id.to_string());

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FileStoreError::UploadFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            return Err(FileStoreError::UploadFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| FileStoreError::UploadFailed(format!("parse response: {}", e)))?;

        Ok(uploaded.id)
    }

    async fn delete(&self, file_id: &str, user_id: UserId) -> Result<(), FileStoreError> {
        let response = self
            .client
            .delete(self.file_endpoint(file_id, user_id))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FileStoreError::DeleteFailed(format!("request: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FileStoreError::NotFound(file_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(FileStoreError::DeleteFailed(format!(
                "status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
