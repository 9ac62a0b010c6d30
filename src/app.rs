//! Application service tying upload validation, storage and post records
//! together.

use crate::models::{ImageFile, UploadConfig, UploadProvider, UploadResult};
use crate::policy::UploadPolicy;
use crate::posts::PostStore;
use crate::upload::{select_adapter, UploadAdapter};
use crate::{Error, Result};
use serde::Serialize;
use tracing::{error, info, warn};

/// Successful upload plus the alt/title suggestions shown to editors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    #[serde(flatten)]
    pub result: UploadResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub alt_text_suggestion: String,
    pub title_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPost {
    pub id: String,
    pub image_filename: Option<String>,
    /// `false` means the image may now be orphaned in storage.
    pub image_deleted: bool,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub uploads: Box<dyn UploadAdapter>,
    pub posts: PostStore,
    pub policy: UploadPolicy,
}

pub struct App {
    uploads: Box<dyn UploadAdapter>,
    posts: PostStore,
    policy: UploadPolicy,
}

impl App {
    pub fn with_services(services: AppServices) -> Self {
        Self {
            uploads: services.uploads,
            posts: services.posts,
            policy: services.policy,
        }
    }

    pub fn new(config: &UploadConfig) -> Self {
        Self::with_services(AppServices {
            uploads: select_adapter(config),
            posts: PostStore::new(config.posts_file.clone()),
            policy: UploadPolicy::new(config.max_upload_bytes),
        })
    }

    /// Construct an app from environment configuration (`UploadConfig::from_env`).
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(&UploadConfig::from_env()?))
    }

    pub fn provider(&self) -> UploadProvider {
        self.uploads.provider()
    }

    pub fn posts(&self) -> &PostStore {
        &self.posts
    }

    /// Validate and store an image without attaching it to a post.
    pub async fn upload(&self, file: &ImageFile) -> Result<UploadSummary> {
        self.policy.validate(file)?;

        let result = self.uploads.upload_image(file).await;
        if !result.success() {
            let message = result.error().unwrap_or("Upload failed").to_string();
            return Err(Error::Upload(message));
        }

        Ok(summarize(result, file, None))
    }

    /// Upload an image and make it the post's featured image. The post is
    /// only updated once the upload has succeeded; the image it replaces is
    /// deleted afterwards.
    pub async fn attach_image(&self, post_id: &str, file: &ImageFile) -> Result<UploadSummary> {
        if self.posts.find(post_id).await?.is_none() {
            return Err(Error::NotFound(format!("Post '{}'", post_id)));
        }

        let summary = self.upload(file).await?;
        let (image_url, filename) = match (summary.result.image_url(), summary.result.filename())
        {
            (Some(url), Some(filename)) => (url.to_string(), filename.to_string()),
            _ => {
                return Err(Error::Invariant(
                    "Successful upload without URL or filename".to_string(),
                ))
            }
        };

        let previous = match self.posts.set_image(post_id, &image_url, &filename).await {
            Ok(previous) => previous,
            Err(e) => {
                error!(
                    "Could not record image {} on post {}: {}",
                    filename, post_id, e
                );
                if !self.uploads.delete_image(&filename).await {
                    warn!("Uploaded image {} may be orphaned", filename);
                }
                return Err(e);
            }
        };
        info!("Attached image {} to post {}", image_url, post_id);

        if let Some(old) = previous.filter(|old| *old != filename) {
            if !self.uploads.delete_image(&old).await {
                warn!("Replaced image {} could not be deleted", old);
            }
        }

        Ok(UploadSummary {
            post_id: Some(post_id.to_string()),
            ..summary
        })
    }

    pub async fn delete_image(&self, filename: &str) -> bool {
        self.uploads.delete_image(filename).await
    }

    /// Delete a post and the image it references. Returns `None` when no
    /// such post exists.
    pub async fn delete_post(&self, post_id: &str) -> Result<Option<DeletedPost>> {
        let Some(post) = self.posts.delete(post_id).await? else {
            return Ok(None);
        };

        let image_deleted = match post.image_filename.as_deref() {
            Some(filename) => {
                let deleted = self.uploads.delete_image(filename).await;
                if !deleted {
                    warn!(
                        "Post {} deleted but its image {} may be orphaned",
                        post_id, filename
                    );
                }
                deleted
            }
            None => true,
        };

        Ok(Some(DeletedPost {
            id: post.id,
            image_filename: post.image_filename,
            image_deleted,
        }))
    }
}

/// Original name without its last `.ext`, non-alphanumerics replaced by
/// spaces. A dot-file such as `.hidden` has nothing left.
fn readable_name(file: &ImageFile) -> String {
    let name = file.name().unwrap_or("image");
    let stem = match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    };
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect()
}

fn summarize(result: UploadResult, file: &ImageFile, post_id: Option<String>) -> UploadSummary {
    let name = readable_name(file);
    UploadSummary {
        result,
        original_name: file.name().map(str::to_string),
        post_id,
        alt_text_suggestion: format!("AI tools and technology - {}", name),
        title_suggestion: format!("Professional AI Tools Image - {}", name),
    }
}
