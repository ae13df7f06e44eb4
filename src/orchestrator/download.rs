//! Download orchestration (spec.md §4.4 "Download").

use std::sync::Arc;

use crate::chunk;
use crate::config::DownloadOptions;
use crate::crypto::{EnvelopeState, KeyProvider};
use crate::error::{Error, Result};
use crate::metadata::{ObjectMetadata, CURRENT_VERSION};
use crate::orchestrator::{run_parts_concurrently, Cancellation, S3File};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::sdk::SdkAdapter;
use crate::worker;

pub async fn download(
    sdk: Arc<dyn SdkAdapter>,
    key_provider: &KeyProvider,
    retry_policy: RetryPolicy,
    concurrency: usize,
    cancellation: &Cancellation,
    options: &DownloadOptions,
    bandwidth_limit: Option<u64>,
) -> Result<S3File> {
    let retry_policy = match options.retry_cap {
        Some(cap) => RetryPolicy::new(cap, retry_policy.retry_client_exception)?,
        None => retry_policy,
    };

    // Phase 1 — Initiate: fetch object metadata; validate format version;
    // unwrap symmetric key if encrypted; derive chunk size and file length.
    let head = {
        let sdk = Arc::clone(&sdk);
        let bucket = options.bucket.clone();
        let key = options.key.clone();
        retry_with_backoff(retry_policy, "head object", move || {
            let sdk = Arc::clone(&sdk);
            let bucket = bucket.clone();
            let key = key.clone();
            async move { sdk.head_object(&bucket, &key).await }
        })
        .await?
    };

    let (file_length, chunk_size, part_key) = if head.metadata.contains_key(crate::metadata::KEY_VERSION) {
        let object_metadata = ObjectMetadata::from_metadata(&head.metadata)?;
        if object_metadata.version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(object_metadata.version));
        }
        let part_key = if object_metadata.is_encrypted() {
            let envelope = match &options.key_name {
                Some(name) => {
                    let wrapping = object_metadata
                        .wrapping_for(name)
                        .ok_or_else(|| Error::MissingKey(name.clone()))?;
                    EnvelopeState::unwrap(key_provider, wrapping)?
                }
                None => EnvelopeState::unwrap_any(key_provider, &object_metadata.wrappings)?,
            };
            Some(Arc::new(envelope.symmetric_key))
        } else {
            None
        };
        (object_metadata.file_length, object_metadata.chunk_size, part_key)
    } else {
        // Object not written by this system: treat as a plain object using
        // its reported length (spec.md §4.4 Download phase 1, fallback arm).
        let default_chunk_size = crate::config::DEFAULT_CHUNK_SIZE;
        (head.content_length, default_chunk_size, None)
    };

    let parts = chunk::plan(file_length, chunk_size, part_key.is_some())?;

    // Pre-create/truncate the destination file (spec.md §7: "a local file
    // that has been truncated and re-created at operation start").
    let dest_file = tokio::fs::File::create(&options.local_path).await?;
    dest_file.set_len(file_length).await?;
    drop(dest_file);

    // Phase 2 — Parts-In-Flight.
    let completed = {
        let sdk = Arc::clone(&sdk);
        let bucket = options.bucket.clone();
        let key = options.key.clone();
        let local_path = options.local_path.clone();

        run_parts_concurrently(parts, concurrency, cancellation, move |part| {
            let sdk = Arc::clone(&sdk);
            let bucket = bucket.clone();
            let key = key.clone();
            let local_path = local_path.clone();
            let part_key = part_key.clone();

            async move {
                retry_with_backoff(
                    retry_policy,
                    &format!("download part {}", part.part_number),
                    move || {
                        let sdk = Arc::clone(&sdk);
                        let bucket = bucket.clone();
                        let key = key.clone();
                        let local_path = local_path.clone();
                        let part_key = part_key.clone();
                        async move {
                            worker::download_part(
                                sdk.as_ref(),
                                &bucket,
                                &key,
                                &part,
                                &local_path,
                                &part_key,
                                bandwidth_limit,
                            )
                            .await?;
                            Ok(crate::sdk::CompletedPartInfo {
                                part_number: part.part_number as i32,
                                e_tag: String::new(),
                            })
                        }
                    },
                )
                .await
            }
        })
        .await
    };

    if let Err(err) = completed {
        return Err(err);
    }

    Ok(S3File {
        bucket: options.bucket.clone(),
        key: options.key.clone(),
        etag: head.etag.unwrap_or_default(),
        local_file: Some(options.local_path.clone()),
        size: Some(file_length),
    })
}
