use super::{naming, UploadAdapter};
use crate::models::{ImageFile, StoredImage, UploadProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory adapter for exercising callers without touching disk or network.
#[derive(Clone)]
pub struct MockUploadAdapter {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    base_url: String,
    upload_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
    fail_uploads: Arc<Mutex<bool>>,
    fail_deletes: Arc<Mutex<bool>>,
}

impl MockUploadAdapter {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-uploads.example.com".to_string(),
            upload_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
            fail_uploads: Arc::new(Mutex::new(false)),
            fail_deletes: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_file(self, filename: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(filename, content);
        self
    }

    pub fn with_upload_failure(self, should_fail: bool) -> Self {
        *self.fail_uploads.lock().unwrap() = should_fail;
        self
    }

    pub fn with_delete_failure(self, should_fail: bool) -> Self {
        *self.fail_deletes.lock().unwrap() = should_fail;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.lock().unwrap().contains_key(filename)
    }
}

impl Default for MockUploadAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadAdapter for MockUploadAdapter {
    fn provider(&self) -> UploadProvider {
        UploadProvider::Local
    }

    async fn store(&self, file: &ImageFile) -> Result<StoredImage> {
        *self.upload_count.lock().unwrap() += 1;

        if *self.fail_uploads.lock().unwrap() {
            return Err(Error::Backend("Mock upload failure".to_string()));
        }

        let filename = naming::filename_now(file);
        self.files
            .lock()
            .unwrap()
            .insert(filename.clone(), file.bytes.clone());

        Ok(StoredImage {
            image_url: format!("{}/{}", self.base_url, filename),
            filename,
            size: file.len() as u64,
            content_type: file.content_type(),
        })
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        *self.delete_count.lock().unwrap() += 1;

        if *self.fail_deletes.lock().unwrap() {
            return Err(Error::Backend("Mock delete failure".to_string()));
        }

        self.files.lock().unwrap().remove(filename);
        Ok(())
    }
}
