// src/services/storage.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::common::error::AppError;

/// Validade fixa das URLs de upload emitidas pelo storage.
pub const UPLOAD_URL_TTL_SECS: u64 = 7200;

/// Armazenamento de objetos com URLs assinadas. Os bytes nunca passam pela API.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn signed_upload_url(&self, path: &str) -> Result<String, AppError>;

    async fn signed_download_url(&self, path: &str, expires_in: u64) -> Result<String, AppError>;
}

#[derive(Deserialize)]
struct UploadSignResponse {
    url: String,
}

#[derive(Deserialize)]
struct DownloadSignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Cliente REST do storage hospedado (endpoints /storage/v1).
pub struct HttpObjectStorage {
    http_client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl HttpObjectStorage {
    pub fn new(base_url: &str, service_key: &str, bucket: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn endpoint(&self, action: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}/{}", self.base_url, action, self.bucket, path)
    }

    // O storage devolve caminhos relativos a /storage/v1
    fn absolute(&self, relative: &str) -> String {
        format!("{}/storage/v1{}", self.base_url, relative)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<T, AppError> {
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Storage respondeu {} para {}: {}", status, url, text);
            return Err(AppError::StorageError(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::StorageError(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn signed_upload_url(&self, path: &str) -> Result<String, AppError> {
        let signed: UploadSignResponse = self
            .post(self.endpoint("upload/sign", path), json!({}))
            .await?;
        Ok(self.absolute(&signed.url))
    }

    async fn signed_download_url(&self, path: &str, expires_in: u64) -> Result<String, AppError> {
        let signed: DownloadSignResponse = self
            .post(self.endpoint("sign", path), json!({ "expiresIn": expires_in }))
            .await?;
        Ok(self.absolute(&signed.signed_url))
    }
}

/// Storage em memória para testes: devolve URLs previsíveis.
#[cfg(test)]
pub struct StaticStorage;

#[cfg(test)]
#[async_trait]
impl ObjectStorage for StaticStorage {
    async fn signed_upload_url(&self, path: &str) -> Result<String, AppError> {
        Ok(format!("https://storage.test/upload/{}", path))
    }

    async fn signed_download_url(&self, path: &str, expires_in: u64) -> Result<String, AppError> {
        Ok(format!("https://storage.test/download/{}?ttl={}", path, expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_built_from_bucket_and_path() {
        let storage = HttpObjectStorage::new("https://files.example.com/", "key", "lead-documents").unwrap();
        assert_eq!(
            storage.endpoint("sign", "leads/abc/pan_card/x.pdf"),
            "https://files.example.com/storage/v1/object/sign/lead-documents/leads/abc/pan_card/x.pdf"
        );
        assert_eq!(
            storage.absolute("/object/sign/lead-documents/a.pdf?token=t"),
            "https://files.example.com/storage/v1/object/sign/lead-documents/a.pdf?token=t"
        );
    }

    #[tokio::test]
    async fn static_storage_embeds_ttl() {
        let url = StaticStorage.signed_download_url("a/b.pdf", 60).await.unwrap();
        assert!(url.ends_with("a/b.pdf?ttl=60"));
    }
}
