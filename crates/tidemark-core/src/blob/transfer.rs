//! Attachment upload/download over a [`BlobStore`].

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::models::{AttachmentRef, OwnerId};

use super::content_path::{derive_remote_path, FileIdentity};
use super::object_store::BlobStore;
use super::recompress::prepare_for_upload;

/// Moves attachment content between local files and a blob store.
///
/// Uploads are deduplicated against the store by derived remote path;
/// downloads land in a flat local cache directory and are served from it
/// on every later request for the same object.
pub struct BlobTransferService<S: BlobStore> {
    store: S,
    cache_dir: PathBuf,
}

impl<S: BlobStore> BlobTransferService<S> {
    pub fn new(store: S, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            cache_dir: cache_dir.into(),
        }
    }

    /// Upload one local file, returning its remote path.
    ///
    /// If an object already exists at the derived path the upload is
    /// skipped entirely; the file is not even read.
    pub async fn upload_file(&self, owner: &OwnerId, local_path: &Path) -> Result<String> {
        let identity = file_identity(local_path).await?;
        let remote_path = derive_remote_path(owner, &identity);

        let existing = self.store.list_keys(&remote_path).await?;
        if existing.iter().any(|key| key == &remote_path) {
            tracing::debug!("Blob already uploaded, skipping: {remote_path}");
            return Ok(remote_path);
        }

        let bytes = tokio::fs::read(local_path).await?;
        let (bytes, content_type) = prepare_for_upload(&identity.name, bytes)?;
        self.store.put(&remote_path, bytes, content_type).await?;

        tracing::debug!("Uploaded blob: {remote_path}");
        Ok(remote_path)
    }

    /// Fetch an object into the local cache, returning the cached file path.
    ///
    /// Returns `Ok(None)` when the object no longer exists remotely.
    /// A cache hit never touches the store.
    pub async fn download_to_cache(&self, remote_path: &str) -> Result<Option<PathBuf>> {
        let cached = self.cache_path(remote_path);
        if tokio::fs::try_exists(&cached).await? {
            return Ok(Some(cached));
        }

        let bytes = match self.store.get(remote_path).await {
            Ok(bytes) => bytes,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        };

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Stage through a temp file: the cache path must never hold a
        // partial object, since a later pass trusts any file found there.
        let staging = self.cache_dir.join(format!(".{}.part", uuid::Uuid::now_v7()));
        if let Err(error) = tokio::fs::write(&staging, bytes).await {
            tokio::fs::remove_file(&staging).await.ok();
            return Err(error.into());
        }
        tokio::fs::rename(&staging, &cached).await?;
        Ok(Some(cached))
    }

    /// Delete a remote object and evict its cached copy.
    ///
    /// Returns `false` when the object was already gone remotely; the
    /// cache is evicted either way.
    pub async fn delete_remote(&self, remote_path: &str) -> Result<bool> {
        let cached = self.cache_path(remote_path);
        if tokio::fs::try_exists(&cached).await? {
            tokio::fs::remove_file(&cached).await?;
        }

        let existing = self.store.list_keys(remote_path).await?;
        if !existing.iter().any(|key| key == remote_path) {
            return Ok(false);
        }

        self.store.delete(remote_path).await?;
        Ok(true)
    }

    /// Upload every attachment that has a local file but no remote path.
    ///
    /// Returns the updated list and whether any attachment gained a remote
    /// path. Per-file failures are logged and leave that attachment
    /// untouched for the next pass.
    pub async fn upload_attachments(
        &self,
        owner: &OwnerId,
        attachments: &[AttachmentRef],
    ) -> Result<(Vec<AttachmentRef>, bool)> {
        let mut updated = Vec::with_capacity(attachments.len());
        let mut changed = false;

        for attachment in attachments {
            let mut attachment = attachment.clone();

            if !attachment.is_uploaded() {
                if let Some(local_path) = attachment.local_file_path() {
                    match self.upload_file(owner, &local_path).await {
                        Ok(remote_path) => {
                            attachment.remote_path = Some(remote_path);
                            changed = true;
                        }
                        Err(error) => {
                            tracing::warn!(
                                "Attachment upload failed for {}: {error}",
                                local_path.display()
                            );
                        }
                    }
                }
            }

            updated.push(attachment);
        }

        Ok((updated, changed))
    }

    /// Hydrate every uploaded attachment that has no local file yet.
    ///
    /// Returns the updated list and whether any attachment gained a local
    /// URI. Missing remote objects and per-file failures are logged and
    /// leave that attachment untouched.
    pub async fn download_attachments(
        &self,
        attachments: &[AttachmentRef],
    ) -> Result<(Vec<AttachmentRef>, bool)> {
        let mut updated = Vec::with_capacity(attachments.len());
        let mut changed = false;

        for attachment in attachments {
            let mut attachment = attachment.clone();

            if attachment.uri.is_none() {
                if let Some(remote_path) = attachment.remote_path.clone() {
                    match self.download_to_cache(&remote_path).await {
                        Ok(Some(cached)) => {
                            attachment.uri = Some(format!("file://{}", cached.display()));
                            changed = true;
                        }
                        Ok(None) => {
                            tracing::warn!("Remote blob missing, leaving attachment: {remote_path}");
                        }
                        Err(error) => {
                            tracing::warn!("Attachment download failed for {remote_path}: {error}");
                        }
                    }
                }
            }

            updated.push(attachment);
        }

        Ok((updated, changed))
    }

    /// Flat cache file name: path separators are not valid in file names.
    fn cache_path(&self, remote_path: &str) -> PathBuf {
        self.cache_dir.join(remote_path.replace('/', "__"))
    }
}

async fn file_identity(local_path: &Path) -> Result<FileIdentity> {
    let name = local_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| {
            Error::InvalidInput(format!("Not a file path: {}", local_path.display()))
        })?;

    let metadata = tokio::fs::metadata(local_path).await?;
    let mtime_ms = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
        });

    Ok(FileIdentity {
        name,
        size: metadata.len(),
        mtime_ms,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[derive(Default)]
    struct FakeBlobStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        put_calls: AtomicUsize,
        get_calls: AtomicUsize,
        fail_puts: AtomicBool,
    }

    impl FakeBlobStore {
        fn insert(&self, key: &str, bytes: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
        }

        fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }
    }

    impl BlobStore for &FakeBlobStore {
        async fn put(&self, object_key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(Error::Transfer("injected put failure".to_string()));
            }
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .insert(object_key.to_string(), bytes);
            Ok(())
        }

        async fn get(&self, object_key: &str) -> Result<Vec<u8>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .get(object_key)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("blob object: {object_key}")))
        }

        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn delete(&self, object_key: &str) -> Result<()> {
            self.objects.lock().unwrap().remove(object_key);
            Ok(())
        }
    }

    fn owner() -> OwnerId {
        OwnerId::new("user-1").unwrap()
    }

    fn write_local_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_file_is_deduplicated_by_content_path() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        let file = write_local_file(tmp.path(), "report.txt", b"quarterly numbers");

        let first = service.upload_file(&owner(), &file).await.unwrap();
        let second = service.upload_file(&owner(), &file).await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("user-1/"));
        assert!(first.ends_with("_report.txt"));
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn modified_file_uploads_under_a_new_path() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        let file = write_local_file(tmp.path(), "draft.txt", b"v1");
        let first = service.upload_file(&owner(), &file).await.unwrap();

        // Changed size guarantees a different identity even if mtime
        // resolution is coarse.
        std::fs::write(&file, b"v2 with more text").unwrap();
        let second = service.upload_file(&owner(), &file).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_serves_repeat_requests_from_cache() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        store.insert("user-1/abc123_photo.jpg", b"jpeg bytes");

        let first = service
            .download_to_cache("user-1/abc123_photo.jpg")
            .await
            .unwrap()
            .unwrap();
        let second = service
            .download_to_cache("user-1/abc123_photo.jpg")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"jpeg bytes");
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
        // Flat cache layout: no nested directories.
        assert_eq!(
            first.file_name().unwrap().to_string_lossy(),
            "user-1__abc123_photo.jpg"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_leaves_no_staging_files_and_ignores_stale_partials() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let cache = tmp.path().join("cache");
        let service = BlobTransferService::new(&store, &cache);

        store.insert("user-1/abc123_photo.jpg", b"jpeg bytes");

        // A partial file left behind by an interrupted download must not
        // be served as a cache hit under the final name.
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join(".01890000-dead-beef.part"), b"jp").unwrap();

        let cached = service
            .download_to_cache("user-1/abc123_photo.jpg")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(std::fs::read(&cached).unwrap(), b"jpeg bytes");

        // The completed object was renamed into place; this pass left no
        // staging file of its own behind.
        let mut names: Vec<String> = std::fs::read_dir(&cache)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                ".01890000-dead-beef.part".to_string(),
                "user-1__abc123_photo.jpg".to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_missing_object_returns_none() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        let result = service.download_to_cache("user-1/gone_file.txt").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_remote_is_idempotent() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        store.insert("user-1/abc123_old.txt", b"stale");
        let cached = service
            .download_to_cache("user-1/abc123_old.txt")
            .await
            .unwrap()
            .unwrap();

        assert!(service.delete_remote("user-1/abc123_old.txt").await.unwrap());
        assert!(!store.contains("user-1/abc123_old.txt"));
        assert!(!cached.exists());
        assert!(!service.delete_remote("user-1/abc123_old.txt").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_attachments_fills_remote_paths_and_keeps_uris() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        let file = write_local_file(tmp.path(), "lease.pdf", b"pdf bytes");
        let local = AttachmentRef::local(format!("file://{}", file.display()));
        let already = AttachmentRef {
            uri: Some("file:///elsewhere/done.txt".to_string()),
            remote_path: Some("user-1/feedface0123_done.txt".to_string()),
        };

        let (updated, changed) = service
            .upload_attachments(&owner(), &[local.clone(), already.clone()])
            .await
            .unwrap();

        assert!(changed);
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0].uri, local.uri);
        assert!(updated[0].remote_path.as_deref().unwrap().ends_with("_lease.pdf"));
        assert_eq!(updated[1], already);
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_attachments_keeps_failed_entries_for_retry() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        let file = write_local_file(tmp.path(), "photo.txt", b"bytes");
        let local = AttachmentRef::local(format!("file://{}", file.display()));
        store.fail_puts.store(true, Ordering::SeqCst);

        let (updated, changed) = service
            .upload_attachments(&owner(), &[local.clone()])
            .await
            .unwrap();

        assert!(!changed);
        assert_eq!(updated, vec![local]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_attachments_hydrates_missing_local_files() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        store.insert("user-1/abc123_scan.jpg", b"jpeg");
        let remote_only = AttachmentRef {
            uri: None,
            remote_path: Some("user-1/abc123_scan.jpg".to_string()),
        };

        let (updated, changed) = service
            .download_attachments(&[remote_only])
            .await
            .unwrap();

        assert!(changed);
        let uri = updated[0].uri.as_deref().unwrap();
        assert!(uri.starts_with("file://"));
        let cached = updated[0].local_file_path().unwrap();
        assert_eq!(std::fs::read(cached).unwrap(), b"jpeg");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_attachments_skips_missing_remote_objects() {
        let tmp = tempdir().unwrap();
        let store = FakeBlobStore::default();
        let service = BlobTransferService::new(&store, tmp.path().join("cache"));

        let dangling = AttachmentRef {
            uri: None,
            remote_path: Some("user-1/ffffffffffff_gone.jpg".to_string()),
        };

        let (updated, changed) = service
            .download_attachments(&[dangling.clone()])
            .await
            .unwrap();

        assert!(!changed);
        assert_eq!(updated, vec![dangling]);
    }
}
