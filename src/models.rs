//! Data models and configuration
//!
//! Defines the upload payload and result shapes shared by every storage
//! backend, plus the environment-driven configuration the adapter factory
//! consumes.

use crate::mime;
use crate::Error;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Already-decoded upload payload handed to an adapter.
#[derive(Debug, Clone, Default)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
}

impl ImageFile {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            original_name: None,
            content_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Original name with surrounding whitespace removed, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.original_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Declared content type, else inferred from the name, else sniffed
    /// from the payload.
    pub fn content_type(&self) -> String {
        if let Some(declared) = self
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            return declared.to_string();
        }

        if let Some(by_name) = self.name().and_then(mime::content_type_for_extension) {
            return by_name.to_string();
        }

        mime::detect_image_mime(&self.bytes)
            .unwrap_or(mime::OCTET_STREAM)
            .to_string()
    }
}

/// A successfully persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub image_url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Uniform outcome of an upload, whatever the backend.
///
/// Exactly one of `image_url` and `error` is set. The only way to build one
/// is [`UploadResult::uploaded`] or [`UploadResult::failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl UploadResult {
    pub fn uploaded(stored: StoredImage) -> Self {
        Self {
            success: true,
            image_url: Some(stored.image_url),
            filename: Some(stored.filename),
            size: Some(stored.size),
            content_type: Some(stored.content_type),
            error: None,
        }
    }

    pub fn failed(err: &Error) -> Self {
        Self {
            success: false,
            image_url: None,
            filename: None,
            size: None,
            content_type: None,
            error: Some(err.to_string()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

// Configuration

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProvider {
    Local,
    RemoteBlob,
    ExternalCdn,
}

impl UploadProvider {
    /// Exact match against the known selector values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "vercel-blob" | "remote-blob" => Some(Self::RemoteBlob),
            "cloudinary" | "external-cdn" => Some(Self::ExternalCdn),
            _ => None,
        }
    }

    /// Resolve the configured selector; absent or unknown values select
    /// local storage.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value {
            None => Self::Local,
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown UPLOAD_PROVIDER '{}', falling back to local storage",
                    raw
                );
                Self::Local
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::RemoteBlob => "remote-blob",
            Self::ExternalCdn => "external-cdn",
        }
    }
}

impl std::fmt::Display for UploadProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub upload_dir: PathBuf,
    pub public_path: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("public").join("uploads"),
            public_path: "/uploads".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://blob.vercel-storage.com".to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    pub cloud_name: Option<String>,
    pub upload_preset: String,
    pub folder: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
    pub signature_algorithm: SignatureAlgorithm,
}

/// Digest the image CDN expects on signed requests. Accounts verify SHA-1
/// unless switched to SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Some(SignatureAlgorithm::Sha1),
            "sha256" | "sha-256" => Some(SignatureAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            upload_preset: "ai-tools".to_string(),
            folder: "ai-tools-blog".to_string(),
            api_key: None,
            api_secret: None,
            api_url: "https://api.cloudinary.com".to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }
}

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub provider: UploadProvider,
    pub local: LocalConfig,
    pub blob: BlobConfig,
    pub cdn: CdnConfig,
    pub max_upload_bytes: u64,
    pub posts_file: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            provider: UploadProvider::Local,
            local: LocalConfig::default(),
            blob: BlobConfig::default(),
            cdn: CdnConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            posts_file: PathBuf::from("blog-posts.json"),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let timeout_secs = match get("UPLOAD_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "UPLOAD_HTTP_TIMEOUT_SECS must be a positive whole number of seconds, got '{}'",
                        raw
                    ))
                })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        let timeout = Duration::from_secs(timeout_secs);

        let signature_algorithm = match get("CLOUDINARY_SIGNATURE_ALGORITHM") {
            Some(raw) => SignatureAlgorithm::parse(&raw).ok_or_else(|| {
                Error::Configuration(format!(
                    "CLOUDINARY_SIGNATURE_ALGORITHM must be sha1 or sha256, got '{}'",
                    raw
                ))
            })?,
            None => defaults.cdn.signature_algorithm,
        };

        let max_upload_bytes = match get("UPLOAD_MAX_BYTES") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::Configuration(format!(
                    "UPLOAD_MAX_BYTES must be a byte count, got '{}'",
                    raw
                ))
            })?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            provider: UploadProvider::from_setting(get("UPLOAD_PROVIDER").as_deref()),
            local: LocalConfig {
                upload_dir: get("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.local.upload_dir),
                public_path: get("UPLOAD_PUBLIC_PATH")
                    .map(|p| p.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.local.public_path),
            },
            blob: BlobConfig {
                token: get("BLOB_READ_WRITE_TOKEN"),
                api_url: get("BLOB_API_URL").unwrap_or(defaults.blob.api_url),
                timeout,
            },
            cdn: CdnConfig {
                cloud_name: get("CLOUDINARY_CLOUD_NAME"),
                upload_preset: get("CLOUDINARY_UPLOAD_PRESET")
                    .unwrap_or(defaults.cdn.upload_preset),
                folder: get("CLOUDINARY_FOLDER").unwrap_or(defaults.cdn.folder),
                api_key: get("CLOUDINARY_API_KEY"),
                api_secret: get("CLOUDINARY_API_SECRET"),
                api_url: get("CLOUDINARY_API_URL").unwrap_or(defaults.cdn.api_url),
                timeout,
                signature_algorithm,
            },
            max_upload_bytes,
            posts_file: get("BLOG_POSTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.posts_file),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_upload_result_success_serialization() {
        let result = UploadResult::uploaded(StoredImage {
            image_url: "/uploads/ai-tools-1-a.png".to_string(),
            filename: "ai-tools-1-a.png".to_string(),
            size: 4,
            content_type: "image/png".to_string(),
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "imageUrl": "/uploads/ai-tools-1-a.png",
                "filename": "ai-tools-1-a.png",
                "size": 4,
                "contentType": "image/png"
            })
        );
    }

    #[test]
    fn test_upload_result_failure_has_only_error() {
        let result = UploadResult::failed(&Error::InvalidInput("empty".to_string()));

        assert!(!result.success());
        assert!(result.image_url().is_none());
        assert!(result.filename().is_none());
        assert_eq!(result.error(), Some("Invalid input: empty"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Invalid input: empty" })
        );
    }

    #[test]
    fn test_provider_parse_is_exact() {
        assert_eq!(UploadProvider::parse("local"), Some(UploadProvider::Local));
        assert_eq!(
            UploadProvider::parse("vercel-blob"),
            Some(UploadProvider::RemoteBlob)
        );
        assert_eq!(
            UploadProvider::parse("cloudinary"),
            Some(UploadProvider::ExternalCdn)
        );
        assert_eq!(UploadProvider::parse("Local"), None);
        assert_eq!(UploadProvider::parse(" local"), None);
    }

    #[test]
    fn test_provider_fallback_to_local() {
        assert_eq!(UploadProvider::from_setting(None), UploadProvider::Local);
        assert_eq!(
            UploadProvider::from_setting(Some("s3")),
            UploadProvider::Local
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = UploadConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, UploadConfig::default());
        assert_eq!(config.local.public_path, "/uploads");
        assert_eq!(config.cdn.upload_preset, "ai-tools");
        assert!(config.blob.token.is_none());
    }

    #[test]
    fn test_config_reads_backend_settings() {
        let config = UploadConfig::from_lookup(lookup(&[
            ("UPLOAD_PROVIDER", "cloudinary"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_UPLOAD_PRESET", "blog"),
            ("BLOB_READ_WRITE_TOKEN", "   "),
            ("UPLOAD_PUBLIC_PATH", "/media/"),
            ("UPLOAD_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.provider, UploadProvider::ExternalCdn);
        assert_eq!(config.cdn.cloud_name.as_deref(), Some("demo"));
        assert_eq!(config.cdn.upload_preset, "blog");
        assert_eq!(config.blob.token, None);
        assert_eq!(config.local.public_path, "/media");
        assert_eq!(config.cdn.timeout, Duration::from_secs(5));
        assert_eq!(config.blob.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_rejects_bad_timeout() {
        let err = UploadConfig::from_lookup(lookup(&[("UPLOAD_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = UploadConfig::from_lookup(lookup(&[("UPLOAD_HTTP_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_config_signature_algorithm() {
        let config = UploadConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.cdn.signature_algorithm, SignatureAlgorithm::Sha1);

        let config =
            UploadConfig::from_lookup(lookup(&[("CLOUDINARY_SIGNATURE_ALGORITHM", "SHA256")]))
                .unwrap();
        assert_eq!(config.cdn.signature_algorithm, SignatureAlgorithm::Sha256);

        let err = UploadConfig::from_lookup(lookup(&[("CLOUDINARY_SIGNATURE_ALGORITHM", "md5")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_image_file_content_type_resolution() {
        let declared = ImageFile::new(vec![1, 2, 3])
            .with_name("a.png")
            .with_content_type("image/webp");
        assert_eq!(declared.content_type(), "image/webp");

        let by_name = ImageFile::new(vec![1, 2, 3]).with_name("a.GIF");
        assert_eq!(by_name.content_type(), "image/gif");

        let sniffed = ImageFile::new(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(sniffed.content_type(), "image/png");

        let unknown = ImageFile::new(vec![0, 1, 2, 3]);
        assert_eq!(unknown.content_type(), "application/octet-stream");
    }
}
