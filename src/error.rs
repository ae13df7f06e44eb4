use std::fmt;

/// Crate-wide result alias, mirroring the teacher's `Result<T, FmError>` convention.
pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds from the error handling design: usage mistakes are never
/// retried, transient failures are retried by [`crate::retry`], and the rest
/// surface to the caller as-is once classified.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied invalid arguments: missing bucket, invalid ACL, unknown key name.
    #[error("usage error: {0}")]
    Usage(String),

    /// The key provider has no matching key pair.
    #[error("missing key: {0}")]
    MissingKey(String),

    /// `s3tool-version` on the object does not match the version this crate writes.
    #[error("unsupported object format version: {0}")]
    UnsupportedVersion(String),

    /// The requested object (or bucket) does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Network timeout, 5xx, throttling: safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// 4xx other than throttling: not retried unless `retry_client_exception` is set.
    #[error("client error: {0}")]
    ClientSide(String),

    /// RSA unwrap failure, AES decrypt failure, unexpected ciphertext length.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Unexpected EOF while reading a part, short write locally.
    #[error("integrity I/O error: {0}")]
    IntegrityIo(String),

    /// Cooperative cancellation requested mid-transfer.
    #[error("cancelled")]
    Cancelled,

    /// The last wrapping of a multi-key-wrapped symmetric key cannot be removed.
    #[error("cannot remove the last key wrapping on an encrypted object")]
    LastKeyRemoval,

    /// A local I/O failure not otherwise classified (open/seek/read/write of the local file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Passthrough for SDK adapter failures not yet classified more precisely.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// Wraps an inner error with a human-readable description of the operation
    /// that failed, per the propagation policy in the error handling design:
    /// "every error carries a human-readable context string ... the originating
    /// cause is preserved".
    #[error("{context}: {source}")]
    Contextual {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach a human-readable description (thunk description + URI, typically)
    /// to an error without discarding the original cause.
    pub fn context(self, context: impl fmt::Display) -> Self {
        Error::Contextual {
            context: context.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether the retry executor should treat this as a client-side error,
    /// i.e. not retry unless `retry_client_exception` overrides that.
    pub fn is_client_side(&self) -> bool {
        match self {
            Error::ClientSide(_) | Error::Usage(_) | Error::MissingKey(_) | Error::NotFound(_) => {
                true
            }
            Error::Contextual { source, .. } => source.is_client_side(),
            _ => false,
        }
    }

    /// Whether the retry executor should retry this error at all (client-side
    /// errors are excluded unless explicitly opted back in by the caller).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Sdk(_) => true,
            Error::Contextual { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

pub(crate) trait ResultExt<T> {
    fn context(self, context: impl fmt::Display) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl fmt::Display) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
}
