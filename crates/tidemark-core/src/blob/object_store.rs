//! R2-backed blob store and its storage trait.

use std::env;
use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use crate::error::{Error, Result};

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";

/// Objects are content-addressed, so a stored object never changes.
const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Longest expiry S3-compatible presigning accepts.
const PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Object storage operations the transfer layer needs.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Store object bytes under a key, overwriting any existing object.
    async fn put(&self, object_key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch object bytes. Returns [`Error::NotFound`] for a missing key.
    async fn get(&self, object_key: &str) -> Result<Vec<u8>>;

    /// List object keys under a prefix.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, object_key: &str) -> Result<()>;
}

/// Cloudflare R2 configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// R2 implementation of [`BlobStore`].
///
/// Uploads go directly through the S3-compatible API; downloads presign a
/// GET and stream it over plain HTTPS, which keeps the read path identical
/// to what a CDN in front of the bucket would serve.
#[derive(Clone)]
pub struct R2BlobStore {
    config: R2Config,
    http: reqwest::Client,
}

impl R2BlobStore {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    fn s3_client(&self) -> Client {
        let credentials = Credentials::new(
            self.config.access_key_id.clone(),
            self.config.secret_access_key.clone(),
            None,
            None,
            "tidemark-r2-blob-store",
        );

        let sdk_config = aws_sdk_s3::config::Builder::new()
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .endpoint_url(self.config.endpoint_url())
            .force_path_style(true)
            .build();

        Client::from_conf(sdk_config)
    }

    /// Presign a GET for the object, valid for [`PRESIGN_TTL`].
    pub async fn presign_get(&self, object_key: &str) -> Result<String> {
        let object_key = normalize_object_key(object_key)?;
        let presigning = PresigningConfig::expires_in(PRESIGN_TTL)
            .map_err(|error| Error::Transfer(format!("Invalid presign expiry: {error}")))?;

        let presigned = self
            .s3_client()
            .get_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .presigned(presigning)
            .await
            .map_err(|error| {
                storage_error("presign_get", &self.config.bucket, Some(&object_key), error)
            })?;

        Ok(presigned.uri().to_string())
    }
}

impl BlobStore for R2BlobStore {
    async fn put(&self, object_key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;

        self.s3_client()
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .cache_control(CACHE_CONTROL)
            .send()
            .await
            .map_err(|error| {
                storage_error("put_object", &self.config.bucket, Some(&object_key), error)
            })?;

        Ok(())
    }

    async fn get(&self, object_key: &str) -> Result<Vec<u8>> {
        let url = self.presign_get(object_key).await?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| Error::Transfer(format!("Blob download failed: {error}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("blob object: {object_key}")));
        }
        if !response.status().is_success() {
            return Err(Error::Transfer(format!(
                "Blob download failed with HTTP {} for {object_key}",
                response.status().as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| Error::Transfer(format!("Failed to read blob bytes: {error}")))?;
        Ok(bytes.to_vec())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let client = self.s3_client();
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|error| {
                storage_error("list_objects_v2", &self.config.bucket, Some(prefix), error)
            })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(ToOwned::to_owned),
            );

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn delete(&self, object_key: &str) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;

        self.s3_client()
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error(
                    "delete_object",
                    &self.config.bucket,
                    Some(&object_key),
                    error,
                )
            })?;

        Ok(())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let account_id = lookup(ENV_ACCOUNT_ID).map(|value| value.trim().to_string());
    let bucket = lookup(ENV_BUCKET).map(|value| value.trim().to_string());
    let access_key_id = lookup(ENV_ACCESS_KEY_ID).map(|value| value.trim().to_string());
    let secret_access_key = lookup(ENV_SECRET_ACCESS_KEY).map(|value| value.trim().to_string());

    let any_present = account_id.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some();

    if !any_present {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if account_id.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_ACCOUNT_ID);
    }
    if bucket.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_BUCKET);
    }
    if access_key_id.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_ACCESS_KEY_ID);
    }
    if secret_access_key.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_SECRET_ACCESS_KEY);
    }

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    Ok(Some(R2Config {
        account_id: account_id.expect("validated above"),
        bucket: bucket.expect("validated above"),
        access_key_id: access_key_id.expect("validated above"),
        secret_access_key: secret_access_key.expect("validated above"),
    }))
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Transfer(format!("R2 {operation} failed for {target}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput(
            "Blob object_key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}
