use super::{naming, UploadAdapter};
use crate::mime;
use crate::models::{ImageFile, LocalConfig, StoredImage, UploadProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Stores uploads in a directory served by the site as static assets.
#[derive(Debug, Clone)]
pub struct LocalFilesystemAdapter {
    upload_dir: PathBuf,
    public_path: String,
}

impl LocalFilesystemAdapter {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            upload_dir: config.upload_dir,
            public_path: config.public_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.public_path, filename)
    }

    /// Map a stored filename to its path, refusing anything that is not a
    /// single plain path component.
    pub fn resolve_path(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        let is_plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !filename.contains(['/', '\\', '\0']);

        if !is_plain {
            return Err(Error::InvalidInput(format!(
                "Invalid upload filename: {:?}",
                filename
            )));
        }

        Ok(self.upload_dir.join(filename))
    }

    /// Read a stored image back along with the content type it is served as.
    pub async fn read_image(&self, filename: &str) -> Result<(Vec<u8>, &'static str)> {
        let path = self.resolve_path(filename)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok((bytes, mime::content_type_for_filename(filename))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Upload not found: {}", path.display());
                Err(Error::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write into a temporary sibling, then rename over the final name so the
    /// public path never points at a partial file.
    fn write_atomic_sync(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".part")
            .tempfile_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl UploadAdapter for LocalFilesystemAdapter {
    fn provider(&self) -> UploadProvider {
        UploadProvider::Local
    }

    async fn store(&self, file: &ImageFile) -> Result<StoredImage> {
        let filename = naming::filename_now(file);
        let path = self.resolve_path(&filename)?;

        if fs::metadata(&self.upload_dir).await.is_err() {
            info!("Creating uploads directory {}", self.upload_dir.display());
            fs::create_dir_all(&self.upload_dir).await?;
        }

        tokio::task::spawn_blocking({
            let dir = self.upload_dir.clone();
            let path = path.clone();
            let bytes = file.bytes.clone();
            move || Self::write_atomic_sync(&dir, &path, &bytes)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Upload write task join error: {}", e)))??;

        debug!("Wrote {} bytes to {}", file.len(), path.display());

        Ok(StoredImage {
            image_url: self.public_url(&filename),
            filename,
            size: file.len() as u64,
            content_type: file.content_type(),
        })
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        let path = self.resolve_path(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Upload already absent: {}", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
