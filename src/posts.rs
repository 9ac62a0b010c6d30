//! Flat-file blog post store
//!
//! Posts live in a single pretty-printed JSON array. Uploaded images are
//! referenced from a post by URL plus the backend filename needed to delete
//! them later.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub read_time: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Fields this crate does not interpret (seo, publishedAt, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlogPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            excerpt: String::new(),
            content: content.into(),
            author: String::new(),
            date: None,
            read_time: String::new(),
            category: String::new(),
            featured: false,
            published: false,
            image: None,
            image_filename: None,
            href: String::new(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Date used for newest-first ordering.
    fn sort_date(&self) -> &str {
        self.extra_str("publishedAt")
            .or(self.date.as_deref())
            .or_else(|| self.extra_str("updatedAt"))
            .unwrap_or("1970-01-01")
    }
}

/// URL slug: lower-case, keep `[a-z0-9 -]`, whitespace runs become one `-`.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' => c,
            '-' => '-',
            c if c.is_whitespace() => '-',
            _ => continue,
        };
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }
    slug
}

pub struct PostStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all valid posts, newest first. A missing file is an empty store.
    pub async fn load(&self) -> Result<Vec<BlogPost>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No post file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<Value> = serde_json::from_str(&raw)?;
        let mut posts: Vec<BlogPost> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<BlogPost>(entry) {
                Ok(post) if !post.id.is_empty() && !post.href.is_empty() => Some(post),
                Ok(post) => {
                    warn!("Skipping post without id/href: {:?}", post.title);
                    None
                }
                Err(e) => {
                    warn!("Skipping malformed post entry: {}", e);
                    None
                }
            })
            .collect();

        posts.sort_by(|a, b| b.sort_date().cmp(a.sort_date()));
        Ok(posts)
    }

    pub async fn save(&self, posts: &[BlogPost]) -> Result<()> {
        let json = serde_json::to_vec_pretty(posts)?;

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).await?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };

        tokio::task::spawn_blocking({
            let path = self.path.clone();
            move || replace_file_sync(&dir, &path, &json)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Post save task join error: {}", e)))??;

        info!("Saved {} posts to {}", posts.len(), self.path.display());
        Ok(())
    }

    pub async fn find(&self, id: &str) -> Result<Option<BlogPost>> {
        Ok(self.load().await?.into_iter().find(|p| p.id == id))
    }

    /// Insert or replace a post by id, deriving id and href from the title
    /// when they are missing.
    pub async fn upsert(&self, mut post: BlogPost) -> Result<BlogPost> {
        if post.title.trim().is_empty() || post.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Missing required fields: title or content".to_string(),
            ));
        }

        if post.id.is_empty() {
            post.id = generate_slug(&post.title);
            if post.id.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Cannot derive a slug from title {:?}",
                    post.title
                )));
            }
        }
        if post.href.is_empty() {
            post.href = format!("/blog/{}", post.id);
        }

        let now = chrono::Utc::now().to_rfc3339();
        if post.published && post.extra_str("publishedAt").is_none() {
            post.extra
                .insert("publishedAt".to_string(), Value::String(now.clone()));
        }
        post.extra.insert("updatedAt".to_string(), Value::String(now));

        let _guard = self.write_lock.lock().await;
        let mut posts = self.load().await?;
        match posts.iter().position(|p| p.id == post.id) {
            Some(index) => {
                posts[index] = post.clone();
                info!("Updated existing post: {}", post.id);
            }
            None => {
                posts.insert(0, post.clone());
                info!("Added new post: {}", post.id);
            }
        }
        self.save(&posts).await?;

        Ok(post)
    }

    /// Remove a post, returning it if it existed.
    pub async fn delete(&self, id: &str) -> Result<Option<BlogPost>> {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.load().await?;

        let Some(index) = posts.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let removed = posts.remove(index);
        self.save(&posts).await?;

        info!("Deleted post: {}", id);
        Ok(Some(removed))
    }

    /// Point a post at a newly uploaded image, returning the filename of the
    /// image it replaces.
    pub async fn set_image(
        &self,
        id: &str,
        image_url: &str,
        image_filename: &str,
    ) -> Result<Option<String>> {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.load().await?;

        let post = posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("Post '{}'", id)))?;

        post.image = Some(image_url.to_string());
        let previous = post.image_filename.replace(image_filename.to_string());

        self.save(&posts).await?;
        Ok(previous)
    }
}

/// Write into a uniquely named sibling and rename it over `path`, so
/// concurrent writers never share a temporary file.
fn replace_file_sync(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".posts-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
