//! Chunked, parallel, optionally-encrypted multipart transfers for
//! S3-compatible object stores.
//!
//! The orchestration layer — not the HTTP calls themselves — is the point
//! of this crate: splitting a byte range into parts, driving concurrent
//! part transfers, coordinating the initiate/parts/complete multipart
//! lifecycle, and applying an envelope-encryption scheme compatible with a
//! fixed object-metadata contract. All vendor SDK types stay behind
//! [`sdk::SdkAdapter`]; everything above it is portable to any
//! S3-compatible backend that implements the trait.

pub mod chunk;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod retry;
pub mod sdk;
pub mod uri;
pub mod walker;
pub mod worker;

pub use client::S3LibClient;
pub use config::{
    CannedAcl, ClientConfig, ClientConfigBuilder, CopyOptions, CopyOptionsBuilder, DownloadOptions,
    DownloadOptionsBuilder, ListOptions, ListOptionsBuilder, UploadOptions, UploadOptionsBuilder,
};
pub use error::{Error, Result};
pub use orchestrator::S3File;
pub use uri::S3Uri;
