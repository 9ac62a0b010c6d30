use super::{error_from_response, is_transient, naming, require_https, UploadAdapter};
use crate::models::{CdnConfig, ImageFile, SignatureAlgorithm, StoredImage, UploadProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, RetryIf};

const RETRY_INTERVAL_MS: u64 = 500;
const MAX_RETRIES: usize = 2;

#[derive(Debug, Deserialize)]
struct CdnUploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CdnDestroyResponse {
    result: String,
}

/// Posts images to a third-party image CDN using an unsigned upload preset.
pub struct ExternalCdnAdapter {
    client: Client,
    cloud_name: Option<String>,
    upload_preset: String,
    folder: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    api_url: String,
    timeout: Duration,
    signature_algorithm: SignatureAlgorithm,
}

impl ExternalCdnAdapter {
    pub fn new(config: CdnConfig) -> Self {
        Self::new_with_client(config, Client::new())
    }

    pub fn new_with_client(config: CdnConfig, client: Client) -> Self {
        Self {
            client,
            cloud_name: config.cloud_name,
            upload_preset: config.upload_preset,
            folder: config.folder,
            api_key: config.api_key,
            api_secret: config.api_secret,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            signature_algorithm: config.signature_algorithm,
        }
    }

    fn cloud_name(&self) -> Result<&str> {
        self.cloud_name.as_deref().ok_or_else(|| {
            Error::Configuration(
                "Image CDN not configured: CLOUDINARY_CLOUD_NAME is not set".to_string(),
            )
        })
    }

    fn signing_credentials(&self) -> Result<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(Error::Configuration(
                "Image CDN deletes need CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET".to_string(),
            )),
        }
    }

    fn endpoint(&self, cloud_name: &str, action: &str) -> String {
        format!("{}/v1_1/{}/image/{}", self.api_url, cloud_name, action)
    }

    async fn destroy_once(
        &self,
        cloud_name: &str,
        public_id: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            api_secret,
            self.signature_algorithm,
        );

        let response = self
            .client
            .post(self.endpoint(cloud_name, "destroy"))
            .timeout(self.timeout)
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", api_key),
                ("signature", signature.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::from_request("CDN delete request failed", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("CDN delete failed", response).await);
        }

        let outcome: CdnDestroyResponse = response.json().await?;
        match outcome.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(Error::Backend(format!(
                "CDN delete of {} returned '{}'",
                public_id, other
            ))),
        }
    }
}

/// Hex digest over `k=v` pairs sorted by key and joined with `&`, followed
/// by the API secret.
pub(crate) fn sign_params(
    params: &[(&str, &str)],
    api_secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, api_secret),
        SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, api_secret),
    }
}

fn hex_digest<D: Digest>(to_sign: &str, api_secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[async_trait]
impl UploadAdapter for ExternalCdnAdapter {
    fn provider(&self) -> UploadProvider {
        UploadProvider::ExternalCdn
    }

    async fn store(&self, file: &ImageFile) -> Result<StoredImage> {
        let cloud_name = self.cloud_name()?;
        let content_type = file.content_type();

        let part = Part::bytes(file.bytes.clone())
            .file_name(naming::base_name(file))
            .mime_str(&content_type)
            .map_err(|e| {
                Error::InvalidInput(format!("Invalid content type '{}': {}", content_type, e))
            })?;

        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", self.folder.clone());

        // Not retried: a repeated unsigned upload would create a second asset.
        let response = self
            .client
            .post(self.endpoint(cloud_name, "upload"))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::from_request("CDN upload request failed", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("CDN upload failed", response).await);
        }

        let body = response.text().await?;
        let uploaded: CdnUploadResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse CDN response: {}\nBody: {}", e, body);
            Error::Backend(format!("Failed to parse CDN response: {}", e))
        })?;

        require_https(&uploaded.secure_url)?;

        Ok(StoredImage {
            image_url: uploaded.secure_url,
            filename: uploaded.public_id,
            size: uploaded.bytes.unwrap_or(file.len() as u64),
            content_type,
        })
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        let cloud_name = self.cloud_name()?;
        let (api_key, api_secret) = self.signing_credentials()?;

        RetryIf::spawn(
            FixedInterval::from_millis(RETRY_INTERVAL_MS).take(MAX_RETRIES),
            || self.destroy_once(cloud_name, filename, api_key, api_secret),
            is_transient,
        )
        .await
    }
}
