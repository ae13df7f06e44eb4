//! Client Facade (spec.md §4.6): the public operation surface, holding the
//! two executor pools and the key provider.
//!
//! Grounded in the teacher's `S3Service` (`s3/service.rs`) plus
//! `s3/client.rs::build_s3_client`, generalized to own an HTTP-pool
//! semaphore and an internal scheduled pool instead of the teacher's single
//! implicit Tokio runtime (spec.md §4.6).

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::{ClientConfig, CopyOptions, DownloadOptions, ListOptions, UploadOptions};
use crate::crypto::{EnvelopeState, KeyProvider};
use crate::error::{Error, Result};
use crate::metadata::{KeyWrapping, ObjectMetadata};
use crate::orchestrator::{copy, download, upload, Cancellation, S3File};
use crate::retry::RetryPolicy;
use crate::sdk::{AwsSdkAdapter, ObjectAclGrant, ObjectSummary, PendingUpload, SdkAdapter};
use crate::walker;

/// Public entry point. Construction validates and freezes configuration;
/// per spec.md §9, there is no post-construction mutation.
pub struct S3LibClient {
    sdk: Arc<dyn SdkAdapter>,
    key_provider: KeyProvider,
    retry_policy: RetryPolicy,
    http_pool: Arc<Semaphore>,
    internal_pool_size: usize,
    default_chunk_size: u64,
    bandwidth_limit_bytes_per_sec: Option<u64>,
}

impl S3LibClient {
    /// Build a client against the real AWS/S3-compatible SDK using
    /// environment-sourced credentials (mirrors the teacher's
    /// `build_s3_client`).
    pub async fn from_config(config: ClientConfig) -> Result<Self> {
        let sdk = AwsSdkAdapter::from_env(&config.region, config.endpoint.as_deref()).await;
        Self::new(Arc::new(sdk), config)
    }

    /// Build a client over an arbitrary [`SdkAdapter`] (a `FakeSdk` test
    /// double, for instance), per spec.md §4.7's portability requirement.
    pub fn new(sdk: Arc<dyn SdkAdapter>, config: ClientConfig) -> Result<Self> {
        let retry_policy = RetryPolicy::new(config.retry_cap, config.retry_client_exception)?;
        let key_provider = match &config.key_directory {
            Some(dir) => KeyProvider::load_from_dir(dir)?,
            None => match KeyProvider::default_dir() {
                Ok(dir) if dir.exists() => KeyProvider::load_from_dir(&dir)?,
                _ => KeyProvider::default(),
            },
        };

        Ok(Self {
            sdk,
            key_provider,
            retry_policy,
            http_pool: Arc::new(Semaphore::new(config.http_pool_size)),
            internal_pool_size: config.internal_pool_size,
            default_chunk_size: config.default_chunk_size,
            bandwidth_limit_bytes_per_sec: config.bandwidth_limit_bytes_per_sec,
        })
    }

    pub fn default_chunk_size(&self) -> u64 {
        self.default_chunk_size
    }

    /// Upload a single local file (spec.md §4.4 "Upload").
    pub async fn upload(&self, options: &UploadOptions) -> Result<S3File> {
        let cancellation = Cancellation::new();
        upload::upload(
            Arc::clone(&self.sdk),
            &self.key_provider,
            self.retry_policy,
            self.internal_pool_size,
            &cancellation,
            options,
            self.bandwidth_limit_bytes_per_sec,
        )
        .await
    }

    /// Upload every file under a local directory, fanning out one `upload`
    /// per discovered file over the HTTP pool's concurrency limit (spec.md
    /// §4.4 "Directory variants").
    pub async fn upload_dir(&self, bucket: &str, key_prefix: &str, local_dir: &std::path::Path) -> Result<Vec<S3File>> {
        let files = walker::walk(local_dir).await?;
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let _permit = self.http_pool.acquire().await.expect("http pool not closed");
            let key = format!("{}/{}", key_prefix.trim_end_matches('/'), file.relative_key);
            let options = crate::config::UploadOptionsBuilder::new()
                .bucket(bucket)
                .key(key)
                .local_path(file.path)
                .build(self.default_chunk_size)?;
            results.push(self.upload(&options).await?);
        }
        Ok(results)
    }

    /// Download a single object (spec.md §4.4 "Download").
    pub async fn download(&self, options: &DownloadOptions) -> Result<S3File> {
        let cancellation = Cancellation::new();
        download::download(
            Arc::clone(&self.sdk),
            &self.key_provider,
            self.retry_policy,
            self.internal_pool_size,
            &cancellation,
            options,
            self.bandwidth_limit_bytes_per_sec,
        )
        .await
    }

    /// Server-side copy (spec.md §4.4 "Copy").
    pub async fn copy(&self, options: &CopyOptions) -> Result<S3File> {
        let cancellation = Cancellation::new();
        copy::copy(
            Arc::clone(&self.sdk),
            self.retry_policy,
            self.internal_pool_size,
            &cancellation,
            options,
        )
        .await
    }

    /// List objects under a prefix, transparently paginating every
    /// continuation token (spec.md SPEC_FULL "Pagination-correct listing").
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<ObjectSummary>> {
        let mut results = Vec::new();
        let mut token = None;
        loop {
            let page = self
                .sdk
                .list_objects(
                    &options.bucket,
                    options.prefix.as_deref().unwrap_or(""),
                    options.delimiter.as_deref(),
                    token.as_deref(),
                )
                .await?;
            results.extend(page.keys);
            match page.continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(results)
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        self.sdk.list_buckets().await
    }

    pub async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.sdk.delete(bucket, key).await
    }

    pub async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.sdk.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// Fetch an object's ACL grants (spec.md §4.7 `getObjectAcl`). S3 only
    /// hands back a grantee/permission list on read, never the canned-ACL
    /// name the object was written with.
    pub async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Vec<ObjectAclGrant>> {
        self.sdk.get_object_acl(bucket, key).await
    }

    /// Replace an object's ACL with one of the canned values (spec.md §4.7
    /// `setObjectAcl`, §6 canned ACL set).
    pub async fn set_object_acl(&self, bucket: &str, key: &str, acl: crate::config::CannedAcl) -> Result<()> {
        self.sdk.set_object_acl(bucket, key, acl.as_str()).await
    }

    pub async fn list_pending_uploads(&self, bucket: &str) -> Result<Vec<PendingUpload>> {
        self.sdk.list_multipart(bucket).await
    }

    pub async fn abort_pending_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.sdk.abort_multipart(bucket, key, upload_id).await
    }

    /// Read–modify–write: add a new key-pair wrapping of an object's
    /// existing symmetric key (spec.md §4.2 "AddEncryptedKey").
    pub async fn add_encrypted_key(&self, bucket: &str, key: &str, new_key_name: &str) -> Result<()> {
        let head = self.sdk.head_object(bucket, key).await?;
        let mut object_metadata = ObjectMetadata::from_metadata(&head.metadata)?;
        if !object_metadata.is_encrypted() {
            return Err(Error::Usage(format!("{bucket}/{key} is not encrypted")));
        }

        let envelope = EnvelopeState::unwrap_any(&self.key_provider, &object_metadata.wrappings)?;
        let new_wrapping = envelope.wrap_for(&self.key_provider, new_key_name)?;
        object_metadata.add_wrapping(new_wrapping);

        self.rewrite_metadata(bucket, key, &object_metadata).await
    }

    /// Read–modify–write: remove a key-pair wrapping (spec.md §4.2
    /// "RemoveEncryptedKey").
    pub async fn remove_encrypted_key(&self, bucket: &str, key: &str, key_name: &str) -> Result<()> {
        let head = self.sdk.head_object(bucket, key).await?;
        let mut object_metadata = ObjectMetadata::from_metadata(&head.metadata)?;
        object_metadata.remove_wrapping(key_name)?;
        self.rewrite_metadata(bucket, key, &object_metadata).await
    }

    async fn rewrite_metadata(&self, bucket: &str, key: &str, object_metadata: &ObjectMetadata) -> Result<()> {
        // Metadata cannot be mutated in place on S3-compatible stores; a
        // same-bucket, same-key copy carrying the updated metadata is the
        // standard way to "edit" it, mirroring the SDK's own
        // `copyObject` + `REPLACE` metadata directive.
        let copy_options = crate::config::CopyOptionsBuilder::new()
            .source(bucket, key)
            .dest(bucket, key)
            .metadata_override(object_metadata.clone())
            .build()?;
        let cancellation = Cancellation::new();
        copy::copy(
            Arc::clone(&self.sdk),
            self.retry_policy,
            self.internal_pool_size,
            &cancellation,
            &copy_options,
        )
        .await?;
        Ok(())
    }

    /// Drain the HTTP pool and release the SDK client. Per spec.md §4.6,
    /// a failure tearing down one resource must not prevent the others.
    pub async fn shutdown(self) {
        let _ = self.http_pool.close();
        drop(self.sdk);
    }

    /// Access the key-wrapping helper for a given wrapping, useful to
    /// callers building their own metadata inspection tooling.
    pub fn wrapping_for<'a>(metadata: &'a ObjectMetadata, key_name: &str) -> Option<&'a KeyWrapping> {
        metadata.wrapping_for(key_name)
    }
}
