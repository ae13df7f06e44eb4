//! Copy orchestration (spec.md §4.4 "Copy"): server-side `copyPart`, no
//! local I/O, no crypto — ciphertext travels through the store opaquely.

use std::sync::Arc;

use crate::chunk;
use crate::config::CopyOptions;
use crate::error::Result;
use crate::metadata::ObjectMetadata;
use crate::orchestrator::{run_parts_concurrently, Cancellation, S3File};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::sdk::SdkAdapter;
use crate::worker;

pub async fn copy(
    sdk: Arc<dyn SdkAdapter>,
    retry_policy: RetryPolicy,
    concurrency: usize,
    cancellation: &Cancellation,
    options: &CopyOptions,
) -> Result<S3File> {
    let retry_policy = match options.retry_cap {
        Some(cap) => RetryPolicy::new(cap, retry_policy.retry_client_exception)?,
        None => retry_policy,
    };

    // Phase 1 — Initiate: fetch source metadata; synthesise a plain-object
    // plan if the source has no `s3tool-version`; open a destination
    // multipart session carrying the (possibly synthesised) metadata.
    let head = {
        let sdk = Arc::clone(&sdk);
        let bucket = options.source_bucket.clone();
        let key = options.source_key.clone();
        retry_with_backoff(retry_policy, "head source object", move || {
            let sdk = Arc::clone(&sdk);
            let bucket = bucket.clone();
            let key = key.clone();
            async move { sdk.head_object(&bucket, &key).await }
        })
        .await?
    };

    let object_metadata = match &options.metadata_override {
        Some(overridden) => overridden.clone(),
        None if head.metadata.contains_key(crate::metadata::KEY_VERSION) => {
            ObjectMetadata::from_metadata(&head.metadata)?
        }
        None => ObjectMetadata::plain(crate::config::DEFAULT_CHUNK_SIZE, head.content_length),
    };

    let source_is_empty = head.content_length == 0;
    let parts = chunk::plan(
        object_metadata.file_length,
        object_metadata.chunk_size,
        object_metadata.is_encrypted(),
    )?;

    let dest_bucket = options.dest_bucket.clone();
    let dest_key = options.dest_key.clone();
    let acl = options.acl.as_str().to_string();
    let metadata_map = object_metadata.to_metadata();

    let upload_id = {
        let sdk = Arc::clone(&sdk);
        retry_with_backoff(retry_policy, "initiate destination multipart upload", move || {
            let sdk = Arc::clone(&sdk);
            let dest_bucket = dest_bucket.clone();
            let dest_key = dest_key.clone();
            let acl = acl.clone();
            let metadata_map = metadata_map.clone();
            async move {
                sdk.initiate_multipart(&dest_bucket, &dest_key, &metadata_map, &acl)
                    .await
            }
        })
        .await?
    };

    // Phase 2 — Parts-In-Flight.
    let completed = {
        let sdk = Arc::clone(&sdk);
        let src_bucket = options.source_bucket.clone();
        let src_key = options.source_key.clone();
        let dest_bucket = options.dest_bucket.clone();
        let dest_key = options.dest_key.clone();
        let upload_id = upload_id.clone();

        run_parts_concurrently(parts, concurrency, cancellation, move |part| {
            let sdk = Arc::clone(&sdk);
            let src_bucket = src_bucket.clone();
            let src_key = src_key.clone();
            let dest_bucket = dest_bucket.clone();
            let dest_key = dest_key.clone();
            let upload_id = upload_id.clone();

            async move {
                retry_with_backoff(
                    retry_policy,
                    &format!("copy part {}", part.part_number),
                    move || {
                        let sdk = Arc::clone(&sdk);
                        let src_bucket = src_bucket.clone();
                        let src_key = src_key.clone();
                        let dest_bucket = dest_bucket.clone();
                        let dest_key = dest_key.clone();
                        let upload_id = upload_id.clone();
                        async move {
                            worker::copy_part(
                                sdk.as_ref(),
                                &src_bucket,
                                &src_key,
                                &dest_bucket,
                                &dest_key,
                                &upload_id,
                                &part,
                                source_is_empty,
                            )
                            .await
                        }
                    },
                )
                .await
            }
        })
        .await
    };

    let completed_parts = match completed {
        Ok(parts) => parts,
        Err(err) => {
            let _ = sdk
                .abort_multipart(&options.dest_bucket, &options.dest_key, &upload_id)
                .await;
            return Err(err);
        }
    };

    // Phase 3 — Complete.
    let etag = {
        let sdk_for_retry = Arc::clone(&sdk);
        let bucket = options.dest_bucket.clone();
        let key = options.dest_key.clone();
        let upload_id_for_retry = upload_id.clone();
        let completed_parts = completed_parts.clone();

        let result = retry_with_backoff(retry_policy, "complete destination multipart upload", move || {
            let sdk = Arc::clone(&sdk_for_retry);
            let bucket = bucket.clone();
            let key = key.clone();
            let upload_id = upload_id_for_retry.clone();
            let completed_parts = completed_parts.clone();
            async move { sdk.complete_multipart(&bucket, &key, &upload_id, &completed_parts).await }
        })
        .await;

        match result {
            Ok(etag) => etag,
            Err(err) => {
                let _ = sdk
                    .abort_multipart(&options.dest_bucket, &options.dest_key, &upload_id)
                    .await;
                return Err(err);
            }
        }
    };

    Ok(S3File {
        bucket: options.dest_bucket.clone(),
        key: options.dest_key.clone(),
        etag,
        local_file: None,
        size: Some(object_metadata.file_length),
    })
}
