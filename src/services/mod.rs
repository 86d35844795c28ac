pub mod media;
pub mod notify;
pub mod s3;
pub mod storage_path;
pub mod uploader;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::error::AppError;
    use crate::services::s3::BlobStore;

    /// In-memory `BlobStore` double with switchable failure modes.
    pub(crate) struct MemoryBlobStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_uploads: AtomicBool,
        pub fail_removals: AtomicBool,
        pub fail_probes: AtomicBool,
        pub upload_attempts: AtomicUsize,
    }

    impl MemoryBlobStore {
        pub(crate) fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                fail_uploads: AtomicBool::new(false),
                fail_removals: AtomicBool::new(false),
                fail_probes: AtomicBool::new(false),
                upload_attempts: AtomicUsize::new(0),
            }
        }

        fn object_key(bucket: &str, key: &str) -> String {
            format!("{}/{}", bucket, key)
        }

        pub(crate) fn seed(&self, bucket: &str, key: &str, data: Vec<u8>) {
            self.objects
                .lock()
                .unwrap()
                .insert(Self::object_key(bucket, key), data);
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        fn default_bucket(&self) -> &str {
            "project-media"
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            data: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), AppError> {
            self.upload_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(AppError::StorageError("simulated upload outage".to_string()));
            }
            let mut objects = self.objects.lock().unwrap();
            let full_key = Self::object_key(bucket, key);
            if objects.contains_key(&full_key) {
                return Err(AppError::StorageError(format!("{} already exists", key)));
            }
            objects.insert(full_key, data);
            Ok(())
        }

        async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
            if self.fail_removals.load(Ordering::SeqCst) {
                return Err(AppError::StorageError("simulated removal outage".to_string()));
            }
            let mut objects = self.objects.lock().unwrap();
            for key in keys {
                objects.remove(&Self::object_key(bucket, key));
            }
            Ok(())
        }

        async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, AppError> {
            if self.fail_probes.load(Ordering::SeqCst) {
                return Err(AppError::StorageError("simulated probe outage".to_string()));
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .contains_key(&Self::object_key(bucket, key)))
        }

        async fn get_presigned_url(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> Result<String, AppError> {
            Ok(format!(
                "https://signed.test/{}/{}?expires={}",
                bucket,
                key,
                expires_in.as_secs()
            ))
        }
    }
}
