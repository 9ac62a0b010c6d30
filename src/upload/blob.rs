use super::{error_from_response, is_transient, naming, require_https, UploadAdapter};
use crate::models::{BlobConfig, ImageFile, StoredImage, UploadProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, RetryIf};

const API_VERSION: &str = "7";
const RETRY_INTERVAL_MS: u64 = 500;
const MAX_RETRIES: usize = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutBlobResponse {
    url: String,
    #[serde(default)]
    pathname: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteBlobRequest<'a> {
    urls: Vec<&'a str>,
}

/// Uploads to an HTTP object store authenticated by a read-write token.
pub struct RemoteBlobAdapter {
    client: Client,
    token: Option<String>,
    api_url: String,
    timeout: Duration,
}

impl RemoteBlobAdapter {
    pub fn new(config: BlobConfig) -> Self {
        Self::new_with_client(config, Client::new())
    }

    pub fn new_with_client(config: BlobConfig, client: Client) -> Self {
        Self {
            client,
            token: config.token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        }
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            Error::Configuration(
                "Blob storage not configured: BLOB_READ_WRITE_TOKEN is not set".to_string(),
            )
        })
    }

    fn retry_strategy() -> impl Iterator<Item = Duration> {
        FixedInterval::from_millis(RETRY_INTERVAL_MS).take(MAX_RETRIES)
    }

    async fn put_once(
        &self,
        token: &str,
        pathname: &str,
        file: &ImageFile,
        content_type: &str,
    ) -> Result<PutBlobResponse> {
        let url = format!("{}/{}", self.api_url, pathname);
        tracing::debug!("Uploading {} bytes to blob store at {}", file.len(), url);

        let response = self
            .client
            .put(&url)
            .timeout(self.timeout)
            .bearer_auth(token)
            .header("x-api-version", API_VERSION)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| Error::from_request("Blob upload request failed", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("Blob upload failed", response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse blob store response: {}\nBody: {}", e, body);
            Error::Backend(format!("Failed to parse blob store response: {}", e))
        })
    }

    async fn delete_once(&self, token: &str, pathname: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/delete", self.api_url))
            .timeout(self.timeout)
            .bearer_auth(token)
            .header("x-api-version", API_VERSION)
            .json(&DeleteBlobRequest {
                urls: vec![pathname],
            })
            .send()
            .await
            .map_err(|e| Error::from_request("Blob delete request failed", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("Blob delete failed", response).await);
        }

        Ok(())
    }
}

#[async_trait]
impl UploadAdapter for RemoteBlobAdapter {
    fn provider(&self) -> UploadProvider {
        UploadProvider::RemoteBlob
    }

    async fn store(&self, file: &ImageFile) -> Result<StoredImage> {
        let token = self.token()?;
        let pathname = naming::filename_now(file);
        let content_type = file.content_type();

        // PUT to a fixed pathname is idempotent, so transport failures retry.
        let blob = RetryIf::spawn(
            Self::retry_strategy(),
            || self.put_once(token, &pathname, file, &content_type),
            is_transient,
        )
        .await?;

        require_https(&blob.url)?;

        Ok(StoredImage {
            image_url: blob.url,
            filename: blob.pathname.unwrap_or(pathname),
            size: file.len() as u64,
            content_type,
        })
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        let token = self.token()?;
        RetryIf::spawn(
            Self::retry_strategy(),
            || self.delete_once(token, filename),
            is_transient,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, body_bytes, body_json, header, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, token: Option<&str>) -> RemoteBlobAdapter {
        RemoteBlobAdapter::new(BlobConfig {
            token: token.map(str::to_string),
            api_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn test_upload_puts_exact_bytes_and_returns_public_url() {
        let server = MockServer::start().await;
        let payload = vec![0x89, 0x50, 0x4E, 0x47, 1, 2, 3, 4, 5, 6];

        Mock::given(method("PUT"))
            .and(path_regex(r"^/ai-tools-\d+-photo\.png$"))
            .and(header("authorization", "Bearer secret-token"))
            .and(header("x-content-type", "image/png"))
            .and(header("x-add-random-suffix", "0"))
            .and(body_bytes(payload.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://store.public.blob.vercel-storage.com/ai-tools-1-photo.png",
                "pathname": "ai-tools-1-photo.png",
                "contentType": "image/png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, Some("secret-token"))
            .upload_image(&ImageFile::new(payload).with_name("photo.PNG"))
            .await;

        assert!(result.success(), "{:?}", result.error());
        assert_eq!(
            result.image_url(),
            Some("https://store.public.blob.vercel-storage.com/ai-tools-1-photo.png")
        );
        assert_eq!(result.filename(), Some("ai-tools-1-photo.png"));
        assert_eq!(result.size(), Some(10));
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = adapter(&server, None)
            .upload_image(&ImageFile::new(vec![1, 2, 3]).with_name("a.png"))
            .await;

        assert!(!result.success());
        let error = result.error().unwrap();
        assert!(error.contains("not configured"), "{}", error);
        assert!(error.contains("BLOB_READ_WRITE_TOKEN"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_makes_no_request() {
        let server = MockServer::start().await;

        let result = adapter(&server, Some("tok"))
            .upload_image(&ImageFile::new(Vec::new()).with_name("a.png"))
            .await;

        assert!(!result.success());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, Some("bad"))
            .upload_image(&ImageFile::new(vec![1]).with_name("a.png"))
            .await;

        assert!(!result.success());
        assert!(result.error().unwrap().contains("403"));
        assert!(result.image_url().is_none());
    }

    #[tokio::test]
    async fn test_plain_http_url_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "http://store.example.com/a.png"
            })))
            .mount(&server)
            .await;

        let result = adapter(&server, Some("tok"))
            .upload_image(&ImageFile::new(vec![1]).with_name("a.png"))
            .await;

        assert!(!result.success());
        assert!(result.error().unwrap().contains("non-HTTPS"));
        assert!(result.image_url().is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_io_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({ "url": "https://x/y" })),
            )
            .mount(&server)
            .await;

        let adapter = RemoteBlobAdapter::new(BlobConfig {
            token: Some("tok".to_string()),
            api_url: server.uri(),
            timeout: Duration::from_millis(100),
        });

        let err = adapter
            .store(&ImageFile::new(vec![1]).with_name("a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)), "{:?}", err);
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }

    #[tokio::test]
    async fn test_delete_posts_pathname() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/delete"))
            .and(body_json(serde_json::json!({ "urls": ["ai-tools-1-never.png"] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(
            adapter(&server, Some("tok"))
                .delete_image("ai-tools-1-never.png")
                .await
        );
    }

    #[tokio::test]
    async fn test_delete_without_token_returns_false() {
        let server = MockServer::start().await;
        assert!(!adapter(&server, None).delete_image("a.png").await);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
