//! `s3://bucket/key[?versionId=...]` parsing (spec.md §6 "URI scheme").

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
}

impl std::fmt::Display for S3Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)?;
        if let Some(v) = &self.version_id {
            write!(f, "?versionId={v}")?;
        }
        Ok(())
    }
}

pub fn parse(uri: &str) -> Result<S3Uri> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| Error::Usage(format!("not an s3:// URI: {uri}")))?;

    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    let (bucket, key) = path
        .split_once('/')
        .ok_or_else(|| Error::Usage(format!("s3 URI missing key: {uri}")))?;

    if bucket.is_empty() {
        return Err(Error::Usage(format!("s3 URI missing bucket: {uri}")));
    }
    if key.is_empty() {
        return Err(Error::Usage(format!("s3 URI missing key: {uri}")));
    }

    let mut version_id = None;
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some(v) = pair.strip_prefix("versionId=") {
                version_id = Some(v.to_string());
            }
        }
    }

    Ok(S3Uri {
        bucket: bucket.to_string(),
        key: key.to_string(),
        version_id,
    })
}
