//! Transfer Orchestrator (spec.md §4.4): the three-phase state machine
//! (`Planned → Initiated → Parts-In-Flight → Completed`, or `Aborted`)
//! shared by upload, download, and copy.
//!
//! The teacher has three independent, largely duplicated functions for this
//! shape (`upload_file_multipart`, `download`, `copy_single_or_multipart` in
//! `s3/helpers.rs`/`s3/service.rs`); this module factors the one part all
//! three share — submit every part concurrently, wait for all of them,
//! abort on first unrecoverable failure — into [`run_parts_concurrently`],
//! and leaves the per-operation phase 1/phase 3 logic to `upload.rs`,
//! `download.rs`, `copy.rs`.

pub mod copy;
pub mod download;
pub mod upload;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::chunk::Part;
use crate::error::{Error, Result};
use crate::sdk::CompletedPartInfo;

/// Cooperative cancellation handle (spec.md §5 "Cancellation"). Cloning
/// shares the same underlying flag; any clone can request cancellation and
/// every in-flight phase observes it before starting new work.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a completed transfer (spec.md §4.4 "Construction of the
/// `S3File` result").
#[derive(Debug, Clone)]
pub struct S3File {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub local_file: Option<std::path::PathBuf>,
    pub size: Option<u64>,
}

/// Phase 2 (spec.md §4.4 "Parts-In-Flight"): submit every part concurrently
/// up to `concurrency`, retrying each independently inside `op`. If any part
/// fails after exhausting its own retries, cancellation is requested so the
/// remaining scheduled-but-not-yet-started parts don't begin, and the first
/// error is returned once every spawned part has settled.
pub async fn run_parts_concurrently<F, Fut>(
    parts: Vec<Part>,
    concurrency: usize,
    cancellation: &Cancellation,
    op: F,
) -> Result<Vec<CompletedPartInfo>>
where
    F: Fn(Part) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CompletedPartInfo>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let op = Arc::new(op);
    let mut set = tokio::task::JoinSet::new();

    for part in parts {
        let semaphore = Arc::clone(&semaphore);
        let op = Arc::clone(&op);
        let cancellation = cancellation.clone();

        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            if cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }
            op(part).await
        });
    }

    let mut completed = Vec::new();
    let mut first_error: Option<Error> = None;

    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(|e| Error::Sdk(format!("part task panicked: {e}")))?;
        match result {
            Ok(info) => completed.push(info),
            Err(err) => {
                cancellation.cancel();
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(completed),
    }
}
