//! In-memory [`s3lib::sdk::SdkAdapter`] test double, used when
//! `S3LIB_TEST_MINIO` is unset so the integration suite can run without a
//! live bucket. Grounded in the shape of the teacher's `TestContext`
//! (`tests/common/mod.rs`) but backed by a `Mutex<HashMap<...>>` store
//! instead of a real `aws_sdk_s3::Client`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use s3lib::error::{Error, Result};
use s3lib::sdk::{
    CompletedPartInfo, HeadObject, ListPage, ObjectAclGrant, ObjectSummary, PendingUpload, SdkAdapter,
};

#[derive(Clone)]
struct StoredObject {
    body: Vec<u8>,
    metadata: HashMap<String, String>,
    etag: String,
    acl: String,
}

#[derive(Default)]
struct Bucket {
    objects: HashMap<String, StoredObject>,
    uploads: HashMap<String, PendingMultipart>,
}

struct PendingMultipart {
    key: String,
    metadata: HashMap<String, String>,
    parts: HashMap<i32, Vec<u8>>,
    acl: String,
}

/// An in-memory S3-compatible backend, plus a failure-injection knob for
/// exercising the retry executor (spec.md §8 scenario 6: "forced 5xx on
/// part 2 that clears after two retries").
pub struct FakeSdk {
    buckets: Mutex<HashMap<String, Bucket>>,
    next_upload_id: AtomicU32,
    fail_upload_part_times: Mutex<HashMap<(String, i32), u32>>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            next_upload_id: AtomicU32::new(1),
            fail_upload_part_times: Mutex::new(HashMap::new()),
        }
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.lock().unwrap().entry(bucket.to_string()).or_default();
    }

    /// Make the next `times` `upload_part` calls for `(key, part_number)`
    /// fail with a transient error before succeeding.
    pub fn fail_upload_part_n_times(&self, key: &str, part_number: i32, times: u32) {
        self.fail_upload_part_times
            .lock()
            .unwrap()
            .insert((key.to_string(), part_number), times);
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.body.clone())
    }
}

impl Default for FakeSdk {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SdkAdapter for FakeSdk {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObject> {
        let buckets = self.buckets.lock().unwrap();
        let object = buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key} not found")))?;
        Ok(HeadObject {
            content_length: object.body.len() as u64,
            metadata: object.metadata.clone(),
            etag: Some(object.etag.clone()),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        _delimiter: Option<&str>,
        _continuation_token: Option<&str>,
    ) -> Result<ListPage> {
        let buckets = self.buckets.lock().unwrap();
        let keys = buckets
            .get(bucket)
            .map(|b| {
                b.objects
                    .iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| ObjectSummary {
                        key: k.clone(),
                        size: v.body.len() as u64,
                        etag: Some(v.etag.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ListPage {
            keys,
            common_prefixes: Vec::new(),
            continuation_token: None,
        })
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.buckets.lock().unwrap().keys().cloned().collect())
    }

    async fn initiate_multipart(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
        acl: &str,
    ) -> Result<String> {
        let upload_id = format!("upload-{}", self.next_upload_id.fetch_add(1, Ordering::SeqCst));
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(bucket.to_string()).or_default();
        bucket.uploads.insert(
            upload_id.clone(),
            PendingMultipart {
                key: key.to_string(),
                metadata: metadata.clone(),
                parts: HashMap::new(),
                acl: acl.to_string(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<CompletedPartInfo> {
        {
            let mut failures = self.fail_upload_part_times.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&(key.to_string(), part_number)) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Transient(format!(
                        "injected failure for part {part_number}"
                    )));
                }
            }
        }

        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::ClientSide(format!("bucket {bucket} not found")))?;
        let upload = bucket
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| Error::ClientSide(format!("upload {upload_id} not found")))?;
        upload.parts.insert(part_number, body);
        Ok(CompletedPartInfo {
            part_number,
            e_tag: format!("etag-{part_number}"),
        })
    }

    async fn copy_part(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        _dest_key: &str,
        upload_id: &str,
        part_number: i32,
        byte_range: Option<(u64, u64)>,
    ) -> Result<CompletedPartInfo> {
        let source = self
            .get_object(src_bucket, src_key)
            .ok_or_else(|| Error::NotFound(format!("{src_bucket}/{src_key} not found")))?;
        let bytes = match byte_range {
            Some((start, end)) => source[start as usize..=(end as usize).min(source.len() - 1)].to_vec(),
            None => Vec::new(),
        };
        self.upload_part(dest_bucket, "", upload_id, part_number, bytes).await
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPartInfo],
    ) -> Result<String> {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket_entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::ClientSide(format!("bucket {bucket} not found")))?;
        let upload = bucket_entry
            .uploads
            .remove(upload_id)
            .ok_or_else(|| Error::ClientSide(format!("upload {upload_id} not found")))?;

        let mut sorted_numbers: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        sorted_numbers.sort_unstable();

        let mut body = Vec::new();
        for n in sorted_numbers {
            if let Some(bytes) = upload.parts.get(&n) {
                body.extend_from_slice(bytes);
            }
        }

        let etag = format!("complete-etag-{upload_id}");
        bucket_entry.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                metadata: upload.metadata,
                etag: etag.clone(),
                acl: upload.acl,
            },
        );
        Ok(etag)
    }

    async fn abort_multipart(&self, bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        if let Some(bucket) = self.buckets.lock().unwrap().get_mut(bucket) {
            bucket.uploads.remove(upload_id);
        }
        Ok(())
    }

    async fn list_multipart(&self, bucket: &str) -> Result<Vec<PendingUpload>> {
        let buckets = self.buckets.lock().unwrap();
        Ok(buckets
            .get(bucket)
            .map(|b| {
                b.uploads
                    .iter()
                    .map(|(upload_id, u)| PendingUpload {
                        key: u.key.clone(),
                        upload_id: upload_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_range(&self, bucket: &str, key: &str, start: u64, end_inclusive: u64) -> Result<Vec<u8>> {
        let body = self
            .get_object(bucket, key)
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key} not found")))?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let end = (end_inclusive as usize).min(body.len() - 1);
        Ok(body[start as usize..=end].to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        if let Some(bucket) = self.buckets.lock().unwrap().get_mut(bucket) {
            bucket.objects.remove(key);
        }
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
        let etag = format!("put-etag-{key}");
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(bucket.to_string()).or_default();
        bucket.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                metadata: metadata.clone(),
                etag: etag.clone(),
                acl: acl.to_string(),
            },
        );
        Ok(etag)
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Vec<ObjectAclGrant>> {
        let buckets = self.buckets.lock().unwrap();
        let object = buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key} not found")))?;
        Ok(vec![ObjectAclGrant {
            grantee: "owner".to_string(),
            permission: object.acl.clone(),
        }])
    }

    async fn set_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::NotFound(format!("bucket {bucket} not found")))?;
        let object = bucket
            .objects
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("{key} not found")))?;
        object.acl = acl.to_string();
        Ok(())
    }
}
