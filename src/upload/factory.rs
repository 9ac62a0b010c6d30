//! Factory for choosing the upload adapter from configuration

use super::{ExternalCdnAdapter, LocalFilesystemAdapter, RemoteBlobAdapter, UploadAdapter};
use crate::models::{UploadConfig, UploadProvider};
use crate::Result;
use tracing::info;

/// Build the adapter for the configured provider. Depends only on `config`,
/// so repeated calls yield equivalent adapters.
pub fn select_adapter(config: &UploadConfig) -> Box<dyn UploadAdapter> {
    info!("Image upload provider: {}", config.provider);

    match config.provider {
        UploadProvider::RemoteBlob => Box::new(RemoteBlobAdapter::new(config.blob.clone())),
        UploadProvider::ExternalCdn => Box::new(ExternalCdnAdapter::new(config.cdn.clone())),
        UploadProvider::Local => Box::new(LocalFilesystemAdapter::new(config.local.clone())),
    }
}

/// Read configuration from the environment and build the matching adapter.
pub fn select_adapter_from_env() -> Result<Box<dyn UploadAdapter>> {
    let config = UploadConfig::from_env()?;
    Ok(select_adapter(&config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageFile, LocalConfig};
    use tempfile::TempDir;

    fn config_for(provider: Option<&str>, dir: &TempDir) -> UploadConfig {
        let upload_dir = dir.path().to_string_lossy().to_string();
        UploadConfig::from_lookup(|key| match key {
            "UPLOAD_PROVIDER" => provider.map(str::to_string),
            "UPLOAD_DIR" => Some(upload_dir.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_dispatch_on_known_values() {
        let dir = TempDir::new().unwrap();
        for (value, expected) in [
            ("local", UploadProvider::Local),
            ("vercel-blob", UploadProvider::RemoteBlob),
            ("remote-blob", UploadProvider::RemoteBlob),
            ("cloudinary", UploadProvider::ExternalCdn),
            ("external-cdn", UploadProvider::ExternalCdn),
        ] {
            let adapter = select_adapter(&config_for(Some(value), &dir));
            assert_eq!(adapter.provider(), expected, "{}", value);
        }
    }

    #[test]
    fn test_unknown_and_absent_fall_back_to_local() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            select_adapter(&config_for(Some("ftp"), &dir)).provider(),
            UploadProvider::Local
        );
        assert_eq!(
            select_adapter(&config_for(None, &dir)).provider(),
            UploadProvider::Local
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_behaves_like_local() {
        let unknown_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();

        let unknown = select_adapter(&config_for(Some("s3-compatible"), &unknown_dir));
        let local = select_adapter(&config_for(Some("local"), &local_dir));

        let file = ImageFile::new(b"0123456789".to_vec()).with_name("photo.PNG");
        let a = unknown.upload_image(&file).await;
        let b = local.upload_image(&file).await;

        assert!(a.success() && b.success());
        assert!(a.image_url().unwrap().starts_with("/uploads/"));
        assert!(b.image_url().unwrap().starts_with("/uploads/"));
        assert!(a.filename().unwrap().ends_with("-photo.png"));
        assert!(b.filename().unwrap().ends_with("-photo.png"));
        assert_eq!(a.size(), b.size());
        assert_eq!(a.content_type(), b.content_type());

        let stored = unknown_dir.path().join(a.filename().unwrap());
        assert_eq!(std::fs::read(stored).unwrap(), b"0123456789");

        assert!(unknown.delete_image("ai-tools-0-missing.png").await);
        assert!(local.delete_image("ai-tools-0-missing.png").await);
    }

    #[test]
    fn test_selection_is_a_function_of_config() {
        let config = UploadConfig {
            local: LocalConfig::default(),
            ..UploadConfig::default()
        };
        assert_eq!(
            select_adapter(&config).provider(),
            select_adapter(&config).provider()
        );
    }
}
