//! Pluggable image-upload storage
//!
//! An [`UploadAdapter`] stores image bytes on one backend (local disk, a
//! remote blob store or an external image CDN) and hands back a URL that can
//! be embedded directly in an `img` tag. Backends implement the fallible
//! `store`/`remove` primitives; the provided `upload_image`/`delete_image`
//! methods fold every failure into an [`UploadResult`] or a `bool`.

pub mod blob;
pub mod cdn;
pub mod factory;
pub mod local;
pub mod mock;
pub mod naming;

pub use blob::RemoteBlobAdapter;
pub use cdn::ExternalCdnAdapter;
pub use factory::{select_adapter, select_adapter_from_env};
pub use local::LocalFilesystemAdapter;
pub use mock::MockUploadAdapter;

use crate::models::{ImageFile, StoredImage, UploadProvider, UploadResult};
use crate::{Error, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};

#[async_trait]
pub trait UploadAdapter: Send + Sync {
    fn provider(&self) -> UploadProvider;

    /// Persist one artifact. Implementations check their configuration
    /// before doing any I/O and must not expose a partially written object.
    async fn store(&self, file: &ImageFile) -> Result<StoredImage>;

    /// Remove an artifact. Removing something that does not exist succeeds.
    async fn remove(&self, filename: &str) -> Result<()>;

    async fn upload_image(&self, file: &ImageFile) -> UploadResult {
        if file.is_empty() {
            let err = Error::InvalidInput("Uploaded file is empty".to_string());
            warn!(
                provider = %self.provider(),
                kind = %err.kind(),
                "Rejected upload: {}",
                err
            );
            return UploadResult::failed(&err);
        }

        match self.store(file).await {
            Ok(stored) => {
                info!(
                    provider = %self.provider(),
                    "Uploaded {} ({} bytes) to {}",
                    stored.filename,
                    stored.size,
                    stored.image_url
                );
                UploadResult::uploaded(stored)
            }
            Err(err) => {
                error!(
                    provider = %self.provider(),
                    kind = %err.kind(),
                    "Upload failed: {}",
                    err
                );
                UploadResult::failed(&err)
            }
        }
    }

    async fn delete_image(&self, filename: &str) -> bool {
        match self.remove(filename).await {
            Ok(()) => {
                info!(provider = %self.provider(), "Deleted image {}", filename);
                true
            }
            Err(err) => {
                error!(
                    provider = %self.provider(),
                    kind = %err.kind(),
                    "Failed to delete image {}: {}",
                    filename,
                    err
                );
                false
            }
        }
    }
}

/// Read a non-2xx response into a backend error.
pub(crate) async fn error_from_response(context: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Backend(format!("{} (status {}): {}", context, status, body))
}

/// Remote backends must hand back an absolute HTTPS URL.
pub(crate) fn require_https(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url).map_err(|e| {
        Error::Backend(format!("Storage backend returned an invalid URL '{}': {}", url, e))
    })?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return Err(Error::Backend(format!(
            "Storage backend returned a non-HTTPS URL '{}'",
            url
        )));
    }
    Ok(())
}

/// Only transport-level failures are worth another attempt.
pub(crate) fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Timeout(_) | Error::Http(_))
}
