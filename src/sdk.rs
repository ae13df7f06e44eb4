//! The only module that touches `aws-sdk-s3` types directly. Everything
//! above this layer talks to [`SdkAdapter`], so the orchestrator, part
//! worker, and client facade are portable to any S3-compatible backend
//! that can implement the trait.
//!
//! Grounded in the teacher's direct `aws_sdk_s3::Client` calls scattered
//! through `s3/service.rs` and `s3/helpers.rs`; this module collects them
//! behind one seam per spec.md §4.7.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;

use crate::error::{Error, Result};

/// One page of `ListObjectsV2`.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub keys: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadObject {
    pub content_length: u64,
    pub metadata: HashMap<String, String>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletedPartInfo {
    pub part_number: i32,
    pub e_tag: String,
}

#[derive(Debug, Clone, Default)]
pub struct PendingUpload {
    pub key: String,
    pub upload_id: String,
}

/// One grant from an object's ACL, as returned by `GetObjectAcl`. S3 does not
/// hand canned-ACL names back on read, only a grantee/permission list, so
/// this is the portable shape the adapter exposes for that side of the
/// capability (spec.md §4.7).
#[derive(Debug, Clone, Default)]
pub struct ObjectAclGrant {
    pub grantee: String,
    pub permission: String,
}

/// The capability set the orchestrator and part worker require from an
/// S3-compatible backend (spec.md §4.7).
#[async_trait]
pub trait SdkAdapter: Send + Sync {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObject>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage>;

    async fn list_buckets(&self) -> Result<Vec<String>>;

    async fn initiate_multipart(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
        acl: &str,
    ) -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<CompletedPartInfo>;

    async fn copy_part(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        upload_id: &str,
        part_number: i32,
        byte_range: Option<(u64, u64)>,
    ) -> Result<CompletedPartInfo>;

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartInfo],
    ) -> Result<String>;

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;

    async fn list_multipart(&self, bucket: &str) -> Result<Vec<PendingUpload>>;

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<Vec<u8>>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: &HashMap<String, String>,
        acl: &str,
    ) -> Result<String>;

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Vec<ObjectAclGrant>>;

    async fn set_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<()>;
}

/// Thin wrapper around `aws_sdk_s3::Client`, grounded in the teacher's
/// `s3/client.rs::build_s3_client` and the inline calls across
/// `s3/service.rs`.
pub struct AwsSdkAdapter {
    client: AwsS3Client,
}

impl AwsSdkAdapter {
    pub fn new(client: AwsS3Client) -> Self {
        Self { client }
    }

    pub async fn from_env(region: &str, endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()));
        if let Some(ep) = endpoint {
            loader = loader.endpoint_url(ep);
        }
        let config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if endpoint.is_some() {
            builder = builder.force_path_style(true);
        }
        Self::new(AwsS3Client::from_conf(builder.build()))
    }
}

/// Classify an AWS SDK error into the crate's error kinds using the HTTP
/// status code carried on the raw response, falling back to treating
/// dispatch-level failures (no response at all, e.g. timeouts) as transient.
fn classify<E>(err: aws_sdk_s3::error::SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = err.to_string();
    let status = err.raw_response().map(|r| r.status().as_u16());
    match &err {
        aws_sdk_s3::error::SdkError::TimeoutError(_)
        | aws_sdk_s3::error::SdkError::DispatchFailure(_) => Error::Transient(message),
        _ => classify_status(status, message),
    }
}

fn classify_status(status: Option<u16>, message: String) -> Error {
    match status {
        Some(404) => Error::NotFound(message),
        Some(429) | Some(500..=599) => Error::Transient(message),
        Some(400..=499) => Error::ClientSide(message),
        _ => Error::Sdk(message),
    }
}

#[async_trait]
impl SdkAdapter for AwsSdkAdapter {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObject> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(HeadObject {
            content_length: resp.content_length().unwrap_or(0).max(0) as u64,
            metadata: resp.metadata().cloned().unwrap_or_default(),
            etag: resp.e_tag().map(str::to_string),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage> {
        let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(d) = delimiter {
            req = req.delimiter(d);
        }
        if let Some(t) = continuation_token {
            req = req.continuation_token(t);
        }
        let resp = req.send().await.map_err(classify)?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|o| {
                Some(ObjectSummary {
                    key: o.key()?.to_string(),
                    size: o.size().unwrap_or(0).max(0) as u64,
                    etag: o.e_tag().map(str::to_string),
                })
            })
            .collect();
        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let continuation_token = if resp.is_truncated() == Some(true) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            keys,
            common_prefixes,
            continuation_token,
        })
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let resp = self.client.list_buckets().send().await.map_err(classify)?;
        Ok(resp
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn initiate_multipart(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
        acl: &str,
    ) -> Result<String> {
        let mut req = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .acl(acl.into());
        for (k, v) in metadata {
            req = req.metadata(k, v);
        }
        let resp = req.send().await.map_err(classify)?;
        resp.upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Sdk("no upload_id returned from create_multipart_upload".into()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<CompletedPartInfo> {
        let resp = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(classify)?;
        let e_tag = resp
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| Error::Sdk("no ETag returned from upload_part".into()))?;
        Ok(CompletedPartInfo { part_number, e_tag })
    }

    async fn copy_part(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        upload_id: &str,
        part_number: i32,
        byte_range: Option<(u64, u64)>,
    ) -> Result<CompletedPartInfo> {
        let copy_source = format!("{src_bucket}/{src_key}");
        let mut req = self
            .client
            .upload_part_copy()
            .bucket(dest_bucket)
            .key(dest_key)
            .upload_id(upload_id)
            .part_number(part_number)
            .copy_source(copy_source);
        if let Some((start, end)) = byte_range {
            req = req.copy_source_range(format!("bytes={start}-{end}"));
        }
        let resp = req.send().await.map_err(classify)?;
        let e_tag = resp
            .copy_part_result()
            .and_then(|r| r.e_tag())
            .map(str::to_string)
            .ok_or_else(|| Error::Sdk("no ETag returned from upload_part_copy".into()))?;
        Ok(CompletedPartInfo { part_number, e_tag })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartInfo],
    ) -> Result<String> {
        let mut sorted = parts.to_vec();
        sorted.sort_by_key(|p| p.part_number);
        let completed_parts = sorted
            .iter()
            .map(|p| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.e_tag)
                    .build()
            })
            .collect();
        let upload = aws_sdk_s3::types::CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();
        let resp = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(classify)?;
        Ok(resp.e_tag().unwrap_or_default().to_string())
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_multipart(&self, bucket: &str) -> Result<Vec<PendingUpload>> {
        let resp = self
            .client
            .list_multipart_uploads()
            .bucket(bucket)
            .send()
            .await
            .map_err(classify)?;
        Ok(resp
            .uploads()
            .iter()
            .filter_map(|u| {
                Some(PendingUpload {
                    key: u.key()?.to_string(),
                    upload_id: u.upload_id()?.to_string(),
                })
            })
            .collect())
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={start}-{end_inclusive}"))
            .send()
            .await
            .map_err(classify)?;
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| Error::Transient(e.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: &HashMap<String, String>,
        acl: &str,
    ) -> Result<String> {
        let mut req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(acl.into())
            .body(ByteStream::from(body));
        for (k, v) in metadata {
            req = req.metadata(k, v);
        }
        let resp = req.send().await.map_err(classify)?;
        Ok(resp.e_tag().unwrap_or_default().to_string())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Vec<ObjectAclGrant>> {
        let resp = self
            .client
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(resp
            .grants()
            .iter()
            .map(|g| {
                let grantee = g
                    .grantee()
                    .and_then(|gr| gr.display_name().or_else(|| gr.id()).or_else(|| gr.uri()))
                    .unwrap_or_default()
                    .to_string();
                let permission = g
                    .permission()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                ObjectAclGrant { grantee, permission }
            })
            .collect())
    }

    async fn set_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<()> {
        self.client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(acl.into())
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
