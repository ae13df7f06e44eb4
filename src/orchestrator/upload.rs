//! Upload orchestration (spec.md §4.4 "Upload").

use std::sync::Arc;

use crate::chunk;
use crate::config::UploadOptions;
use crate::crypto::{EnvelopeState, KeyProvider};
use crate::error::Result;
use crate::metadata::ObjectMetadata;
use crate::orchestrator::{run_parts_concurrently, Cancellation, S3File};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::sdk::SdkAdapter;
use crate::worker;

pub async fn upload(
    sdk: Arc<dyn SdkAdapter>,
    key_provider: &KeyProvider,
    retry_policy: RetryPolicy,
    concurrency: usize,
    cancellation: &Cancellation,
    options: &UploadOptions,
    bandwidth_limit: Option<u64>,
) -> Result<S3File> {
    let retry_policy = match options.retry_cap {
        Some(cap) => RetryPolicy::new(cap, retry_policy.retry_client_exception)?,
        None => retry_policy,
    };

    let file_length = tokio::fs::metadata(&options.local_path).await?.len();

    // Phase 1 — Initiate: generate metadata (wrapping the symmetric key if
    // encryption is on), open a multipart session, receive an upload-id.
    let envelope = match &options.encrypt_with_key {
        Some(key_name) => Some(EnvelopeState::generate(key_provider, key_name)?),
        None => None,
    };

    let object_metadata = match &envelope {
        Some((_, wrapping)) => {
            ObjectMetadata::encrypted(options.chunk_size, file_length, wrapping.clone())
        }
        None => ObjectMetadata::plain(options.chunk_size, file_length),
    };

    let parts = chunk::plan(file_length, options.chunk_size, envelope.is_some())?;

    let bucket = options.bucket.clone();
    let key = options.key.clone();
    let acl = options.acl.as_str().to_string();
    let metadata_map = object_metadata.to_metadata();

    let upload_id = {
        let sdk = Arc::clone(&sdk);
        retry_with_backoff(retry_policy, "initiate multipart upload", move || {
            let sdk = Arc::clone(&sdk);
            let bucket = bucket.clone();
            let key = key.clone();
            let acl = acl.clone();
            let metadata_map = metadata_map.clone();
            async move { sdk.initiate_multipart(&bucket, &key, &metadata_map, &acl).await }
        })
        .await?
    };

    // Phase 2 — Parts-In-Flight: submit every part concurrently, each
    // independently retried; abort on first unrecoverable part failure.
    let part_key: worker::PartKey = envelope.as_ref().map(|(state, _)| Arc::new(state.symmetric_key));

    let completed = {
        let sdk = Arc::clone(&sdk);
        let bucket = options.bucket.clone();
        let key = options.key.clone();
        let upload_id = upload_id.clone();
        let local_path = options.local_path.clone();

        run_parts_concurrently(parts, concurrency, cancellation, move |part| {
            let sdk = Arc::clone(&sdk);
            let bucket = bucket.clone();
            let key = key.clone();
            let upload_id = upload_id.clone();
            let local_path = local_path.clone();
            let part_key = part_key.clone();

            async move {
                retry_with_backoff(
                    retry_policy,
                    &format!("upload part {}", part.part_number),
                    move || {
                        let sdk = Arc::clone(&sdk);
                        let bucket = bucket.clone();
                        let key = key.clone();
                        let upload_id = upload_id.clone();
                        let local_path = local_path.clone();
                        let part_key = part_key.clone();
                        async move {
                            worker::upload_part(
                                sdk.as_ref(),
                                &bucket,
                                &key,
                                &upload_id,
                                &part,
                                &local_path,
                                &part_key,
                                bandwidth_limit,
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
            let _ = sdk.abort_multipart(&options.bucket, &options.key, &upload_id).await;
            return Err(err);
        }
    };

    // Phase 3 — Complete.
    let etag = {
        let sdk_for_retry = Arc::clone(&sdk);
        let bucket = options.bucket.clone();
        let key = options.key.clone();
        let upload_id_for_retry = upload_id.clone();
        let completed_parts = completed_parts.clone();

        let result = retry_with_backoff(retry_policy, "complete multipart upload", move || {
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
                let _ = sdk.abort_multipart(&options.bucket, &options.key, &upload_id).await;
                return Err(err);
            }
        }
    };

    Ok(S3File {
        bucket: options.bucket.clone(),
        key: options.key.clone(),
        etag,
        local_file: Some(options.local_path.clone()),
        size: Some(file_length),
    })
}
