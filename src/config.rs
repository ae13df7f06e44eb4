//! Validated configuration records (spec.md §9 "Builder objects for
//! options"): construction validates eagerly and fails fast with
//! `Error::Usage`, replacing the "multiple overloaded entry points per
//! operation" pattern the design notes call out.

use crate::chunk::AES_BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, DEFAULT_RETRY_CAP};

/// Default chunk size per spec.md §6.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Canned ACL set, spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    #[default]
    BucketOwnerFullControl,
}

impl CannedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(match value {
            "private" => CannedAcl::Private,
            "public-read" => CannedAcl::PublicRead,
            "public-read-write" => CannedAcl::PublicReadWrite,
            "authenticated-read" => CannedAcl::AuthenticatedRead,
            "bucket-owner-read" => CannedAcl::BucketOwnerRead,
            "bucket-owner-full-control" => CannedAcl::BucketOwnerFullControl,
            other => return Err(Error::Usage(format!("unknown canned ACL: {other}"))),
        })
    }
}

/// Facade-level configuration (spec.md §4.6, §9: "initialise at
/// construction; treat post-construction mutation as unsupported").
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub key_directory: Option<std::path::PathBuf>,
    pub http_pool_size: usize,
    pub internal_pool_size: usize,
    pub default_chunk_size: u64,
    pub retry_cap: u32,
    pub retry_client_exception: bool,
    pub bandwidth_limit_bytes_per_sec: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            key_directory: None,
            http_pool_size: 10,
            internal_pool_size: 50,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            retry_cap: DEFAULT_RETRY_CAP,
            retry_client_exception: false,
            bandwidth_limit_bytes_per_sec: None,
        }
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                region: region.into(),
                ..ClientConfig::default()
            },
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn key_directory(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.key_directory = Some(dir.into());
        self
    }

    pub fn http_pool_size(mut self, size: usize) -> Self {
        self.config.http_pool_size = size;
        self
    }

    pub fn internal_pool_size(mut self, size: usize) -> Self {
        self.config.internal_pool_size = size;
        self
    }

    pub fn default_chunk_size(mut self, size: u64) -> Self {
        self.config.default_chunk_size = size;
        self
    }

    pub fn retry_cap(mut self, cap: u32) -> Self {
        self.config.retry_cap = cap;
        self
    }

    pub fn retry_client_exception(mut self, retry: bool) -> Self {
        self.config.retry_client_exception = retry;
        self
    }

    pub fn bandwidth_limit_bytes_per_sec(mut self, limit: u64) -> Self {
        self.config.bandwidth_limit_bytes_per_sec = Some(limit);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        if self.config.region.is_empty() {
            return Err(Error::Usage("region must not be empty".into()));
        }
        if self.config.http_pool_size == 0 {
            return Err(Error::Usage("http_pool_size must be greater than zero".into()));
        }
        if self.config.internal_pool_size == 0 {
            return Err(Error::Usage("internal_pool_size must be greater than zero".into()));
        }
        RetryPolicy::new(self.config.retry_cap, self.config.retry_client_exception)?;
        validate_chunk_size(self.config.default_chunk_size, false)?;
        Ok(self.config)
    }
}

fn validate_chunk_size(chunk_size: u64, encrypted: bool) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Usage("chunk size must be greater than zero".into()));
    }
    if encrypted && chunk_size % AES_BLOCK_SIZE != 0 {
        return Err(Error::Usage(format!(
            "chunk size {chunk_size} must be a multiple of {AES_BLOCK_SIZE} when encryption is enabled"
        )));
    }
    Ok(())
}

/// Options for `upload` (spec.md §4.4 Phase 1 Upload).
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub bucket: String,
    pub key: String,
    pub local_path: std::path::PathBuf,
    pub chunk_size: u64,
    pub encrypt_with_key: Option<String>,
    pub acl: CannedAcl,
    pub retry_cap: Option<u32>,
}

pub struct UploadOptionsBuilder {
    bucket: Option<String>,
    key: Option<String>,
    local_path: Option<std::path::PathBuf>,
    chunk_size: Option<u64>,
    encrypt_with_key: Option<String>,
    acl: CannedAcl,
    retry_cap: Option<u32>,
}

impl UploadOptionsBuilder {
    pub fn new() -> Self {
        Self {
            bucket: None,
            key: None,
            local_path: None,
            chunk_size: None,
            encrypt_with_key: None,
            acl: CannedAcl::default(),
            retry_cap: None,
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn local_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn encrypt_with_key(mut self, key_name: impl Into<String>) -> Self {
        self.encrypt_with_key = Some(key_name.into());
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = acl;
        self
    }

    pub fn retry_cap(mut self, cap: u32) -> Self {
        self.retry_cap = Some(cap);
        self
    }

    pub fn build(self, default_chunk_size: u64) -> Result<UploadOptions> {
        let bucket = self
            .bucket
            .ok_or_else(|| Error::Usage("bucket is required".into()))?;
        let key = self.key.ok_or_else(|| Error::Usage("key is required".into()))?;
        let local_path = self
            .local_path
            .ok_or_else(|| Error::Usage("local_path is required".into()))?;
        if bucket.is_empty() {
            return Err(Error::Usage("bucket must not be empty".into()));
        }
        if key.is_empty() {
            return Err(Error::Usage("key must not be empty".into()));
        }
        let chunk_size = self.chunk_size.unwrap_or(default_chunk_size);
        validate_chunk_size(chunk_size, self.encrypt_with_key.is_some())?;
        if let Some(cap) = self.retry_cap {
            RetryPolicy::new(cap, false)?;
        }

        Ok(UploadOptions {
            bucket,
            key,
            local_path,
            chunk_size,
            encrypt_with_key: self.encrypt_with_key,
            acl: self.acl,
            retry_cap: self.retry_cap,
        })
    }
}

impl Default for UploadOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for `download` (spec.md §4.4 Phase 1 Download).
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub local_path: std::path::PathBuf,
    pub key_name: Option<String>,
    pub retry_cap: Option<u32>,
}

pub struct DownloadOptionsBuilder {
    bucket: Option<String>,
    key: Option<String>,
    version_id: Option<String>,
    local_path: Option<std::path::PathBuf>,
    key_name: Option<String>,
    retry_cap: Option<u32>,
}

impl DownloadOptionsBuilder {
    pub fn new() -> Self {
        Self {
            bucket: None,
            key: None,
            version_id: None,
            local_path: None,
            key_name: None,
            retry_cap: None,
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn local_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn retry_cap(mut self, cap: u32) -> Self {
        self.retry_cap = Some(cap);
        self
    }

    pub fn build(self) -> Result<DownloadOptions> {
        let bucket = self
            .bucket
            .ok_or_else(|| Error::Usage("bucket is required".into()))?;
        let key = self.key.ok_or_else(|| Error::Usage("key is required".into()))?;
        let local_path = self
            .local_path
            .ok_or_else(|| Error::Usage("local_path is required".into()))?;
        if let Some(cap) = self.retry_cap {
            RetryPolicy::new(cap, false)?;
        }
        Ok(DownloadOptions {
            bucket,
            key,
            version_id: self.version_id,
            local_path,
            key_name: self.key_name,
            retry_cap: self.retry_cap,
        })
    }
}

impl Default for DownloadOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for `copy` (spec.md §4.4 Phase 1 Copy).
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub source_bucket: String,
    pub source_key: String,
    pub source_version_id: Option<String>,
    pub dest_bucket: String,
    pub dest_key: String,
    pub acl: CannedAcl,
    pub retry_cap: Option<u32>,
    /// When set, write this metadata on the destination instead of the
    /// metadata derived from the source object. Used internally by
    /// `add_encrypted_key`/`remove_encrypted_key` to perform a same-key
    /// copy that replaces only the `s3tool-*` wrapping fields.
    pub metadata_override: Option<crate::metadata::ObjectMetadata>,
}

pub struct CopyOptionsBuilder {
    source_bucket: Option<String>,
    source_key: Option<String>,
    source_version_id: Option<String>,
    dest_bucket: Option<String>,
    dest_key: Option<String>,
    acl: CannedAcl,
    retry_cap: Option<u32>,
    metadata_override: Option<crate::metadata::ObjectMetadata>,
}

impl CopyOptionsBuilder {
    pub fn new() -> Self {
        Self {
            source_bucket: None,
            source_key: None,
            source_version_id: None,
            dest_bucket: None,
            dest_key: None,
            acl: CannedAcl::default(),
            retry_cap: None,
            metadata_override: None,
        }
    }

    pub fn metadata_override(mut self, metadata: crate::metadata::ObjectMetadata) -> Self {
        self.metadata_override = Some(metadata);
        self
    }

    pub fn source(mut self, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        self.source_bucket = Some(bucket.into());
        self.source_key = Some(key.into());
        self
    }

    pub fn source_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.source_version_id = Some(version_id.into());
        self
    }

    pub fn dest(mut self, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        self.dest_bucket = Some(bucket.into());
        self.dest_key = Some(key.into());
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = acl;
        self
    }

    pub fn retry_cap(mut self, cap: u32) -> Self {
        self.retry_cap = Some(cap);
        self
    }

    pub fn build(self) -> Result<CopyOptions> {
        let source_bucket = self
            .source_bucket
            .ok_or_else(|| Error::Usage("source bucket is required".into()))?;
        let source_key = self
            .source_key
            .ok_or_else(|| Error::Usage("source key is required".into()))?;
        let dest_bucket = self
            .dest_bucket
            .ok_or_else(|| Error::Usage("destination bucket is required".into()))?;
        let dest_key = self
            .dest_key
            .ok_or_else(|| Error::Usage("destination key is required".into()))?;
        if let Some(cap) = self.retry_cap {
            RetryPolicy::new(cap, false)?;
        }
        Ok(CopyOptions {
            source_bucket,
            source_key,
            source_version_id: self.source_version_id,
            dest_bucket,
            dest_key,
            acl: self.acl,
            retry_cap: self.retry_cap,
            metadata_override: self.metadata_override,
        })
    }
}

impl Default for CopyOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for `list` (spec.md §4.7 `listObjects`).
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub bucket: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

pub struct ListOptionsBuilder {
    bucket: Option<String>,
    prefix: Option<String>,
    delimiter: Option<String>,
}

impl ListOptionsBuilder {
    pub fn new() -> Self {
        Self {
            bucket: None,
            prefix: None,
            delimiter: None,
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn build(self) -> Result<ListOptions> {
        let bucket = self
            .bucket
            .ok_or_else(|| Error::Usage("bucket is required".into()))?;
        Ok(ListOptions {
            bucket,
            prefix: self.prefix,
            delimiter: self.delimiter,
        })
    }
}

impl Default for ListOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
