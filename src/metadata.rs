//! Object metadata codec (spec.md §3, §6): serialises and parses the
//! `s3tool-*` keys stamped on every object this crate writes.
//!
//! Shaped after the teacher's `EncryptionParams::to_metadata`/`from_metadata`
//! in `s3/crypto.rs`, which round-trips a handful of named fields through a
//! `HashMap<String, String>` the same way `aws-sdk-s3` exposes object
//! metadata. The key names and the multi-wrapping list format differ
//! entirely, since this crate's envelope scheme is RSA+AES-CBC rather than
//! the teacher's Argon2-derived whole-file cipher.

use std::collections::HashMap;

use base64::Engine;

use crate::error::{Error, Result};

/// The format version this build writes; see spec.md §6: "the current
/// format version is fixed at build time".
pub const CURRENT_VERSION: &str = "1";

pub const KEY_VERSION: &str = "s3tool-version";
pub const KEY_KEY_NAME: &str = "s3tool-key-name";
pub const KEY_SYMMETRIC_KEY: &str = "s3tool-symmetric-key";
pub const KEY_CHUNK_SIZE: &str = "s3tool-chunk-size";
pub const KEY_FILE_LENGTH: &str = "s3tool-file-length";

const LIST_SEPARATOR: char = ',';

/// A single RSA wrapping of the per-object symmetric key, keyed by the
/// key-pair name that can unwrap it (spec.md §4.2 AddEncryptedKey).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWrapping {
    pub key_name: String,
    pub wrapped_symmetric_key: Vec<u8>,
}

/// Parsed view of the metadata this crate understands. Other metadata keys
/// pass through untouched and are not modeled here; callers that need them
/// keep the raw `HashMap` alongside this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub version: String,
    pub chunk_size: u64,
    pub file_length: u64,
    pub wrappings: Vec<KeyWrapping>,
}

impl ObjectMetadata {
    pub fn is_encrypted(&self) -> bool {
        !self.wrappings.is_empty()
    }

    pub fn plain(chunk_size: u64, file_length: u64) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            chunk_size,
            file_length,
            wrappings: Vec::new(),
        }
    }

    pub fn encrypted(chunk_size: u64, file_length: u64, wrapping: KeyWrapping) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            chunk_size,
            file_length,
            wrappings: vec![wrapping],
        }
    }

    /// Serialise into the flat string map the SDK adapter attaches as
    /// object metadata.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(KEY_VERSION.to_string(), self.version.clone());
        map.insert(KEY_CHUNK_SIZE.to_string(), self.chunk_size.to_string());
        map.insert(KEY_FILE_LENGTH.to_string(), self.file_length.to_string());

        if !self.wrappings.is_empty() {
            let names = self
                .wrappings
                .iter()
                .map(|w| w.key_name.as_str())
                .collect::<Vec<_>>()
                .join(&LIST_SEPARATOR.to_string());
            let keys = self
                .wrappings
                .iter()
                .map(|w| base64::engine::general_purpose::STANDARD.encode(&w.wrapped_symmetric_key))
                .collect::<Vec<_>>()
                .join(&LIST_SEPARATOR.to_string());
            map.insert(KEY_KEY_NAME.to_string(), names);
            map.insert(KEY_SYMMETRIC_KEY.to_string(), keys);
        }

        map
    }

    /// Parse from a raw metadata map fetched via `headObject`/`getObject`.
    ///
    /// Returns `Error::UnsupportedVersion` if `s3tool-version` is present but
    /// does not match [`CURRENT_VERSION`]. If `s3tool-version` is absent
    /// entirely, the object was not written by this system; callers should
    /// synthesise a plain-object plan from the object's reported length
    /// instead of calling this function (spec.md §4.4 Copy phase).
    pub fn from_metadata(map: &HashMap<String, String>) -> Result<Self> {
        let version = map
            .get(KEY_VERSION)
            .ok_or_else(|| Error::Usage(format!("{KEY_VERSION} missing from object metadata")))?
            .clone();
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let chunk_size = map
            .get(KEY_CHUNK_SIZE)
            .ok_or_else(|| Error::Usage(format!("{KEY_CHUNK_SIZE} missing from object metadata")))?
            .parse::<u64>()
            .map_err(|e| Error::Usage(format!("invalid {KEY_CHUNK_SIZE}: {e}")))?;

        let file_length = map
            .get(KEY_FILE_LENGTH)
            .ok_or_else(|| Error::Usage(format!("{KEY_FILE_LENGTH} missing from object metadata")))?
            .parse::<u64>()
            .map_err(|e| Error::Usage(format!("invalid {KEY_FILE_LENGTH}: {e}")))?;

        let wrappings = match (map.get(KEY_KEY_NAME), map.get(KEY_SYMMETRIC_KEY)) {
            (Some(names), Some(keys)) => {
                let names: Vec<&str> = names.split(LIST_SEPARATOR).collect();
                let keys: Vec<&str> = keys.split(LIST_SEPARATOR).collect();
                if names.len() != keys.len() {
                    return Err(Error::Crypto(format!(
                        "{KEY_KEY_NAME} and {KEY_SYMMETRIC_KEY} list lengths differ ({} vs {})",
                        names.len(),
                        keys.len()
                    )));
                }
                names
                    .into_iter()
                    .zip(keys)
                    .map(|(name, key)| {
                        let wrapped = base64::engine::general_purpose::STANDARD
                            .decode(key.trim())
                            .map_err(|e| {
                                Error::Crypto(format!("invalid base64 in {KEY_SYMMETRIC_KEY}: {e}"))
                            })?;
                        Ok(KeyWrapping {
                            key_name: name.trim().to_string(),
                            wrapped_symmetric_key: wrapped,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            (None, None) => Vec::new(),
            _ => {
                return Err(Error::Crypto(format!(
                    "{KEY_KEY_NAME} and {KEY_SYMMETRIC_KEY} must be present together or not at all"
                )))
            }
        };

        Ok(Self {
            version,
            chunk_size,
            file_length,
            wrappings,
        })
    }

    /// Look up a specific wrapping by key-pair name.
    pub fn wrapping_for(&self, key_name: &str) -> Option<&KeyWrapping> {
        self.wrappings.iter().find(|w| w.key_name == key_name)
    }

    /// Append a new wrapping (spec.md §4.2 AddEncryptedKey); the caller is
    /// responsible for having verified it decrypts to the same symmetric key.
    pub fn add_wrapping(&mut self, wrapping: KeyWrapping) {
        self.wrappings.retain(|w| w.key_name != wrapping.key_name);
        self.wrappings.push(wrapping);
    }

    /// Remove a wrapping by name (spec.md §4.2 RemoveEncryptedKey). Fails
    /// with `LastKeyRemoval` if this would remove the only remaining
    /// wrapping.
    pub fn remove_wrapping(&mut self, key_name: &str) -> Result<()> {
        if self.wrappings.len() <= 1 {
            return Err(Error::LastKeyRemoval);
        }
        let before = self.wrappings.len();
        self.wrappings.retain(|w| w.key_name != key_name);
        if self.wrappings.len() == before {
            return Err(Error::MissingKey(key_name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_round_trips() {
        let original = ObjectMetadata::plain(5 * 1024 * 1024, 12_582_912);
        let map = original.to_metadata();
        let parsed = ObjectMetadata::from_metadata(&map).unwrap();
        assert_eq!(original, parsed);
        assert!(!parsed.is_encrypted());
    }

    #[test]
    fn encrypted_object_round_trips() {
        let wrapping = KeyWrapping {
            key_name: "alice".to_string(),
            wrapped_symmetric_key: vec![1, 2, 3, 4, 5],
        };
        let original = ObjectMetadata::encrypted(4 * 1024 * 1024, 12_582_912, wrapping);
        let map = original.to_metadata();
        let parsed = ObjectMetadata::from_metadata(&map).unwrap();
        assert_eq!(original, parsed);
        assert!(parsed.is_encrypted());
    }

    #[test]
    fn multi_wrapping_round_trips_in_order() {
        let mut meta = ObjectMetadata::encrypted(
            1024,
            4096,
            KeyWrapping {
                key_name: "alice".to_string(),
                wrapped_symmetric_key: vec![1, 2, 3],
            },
        );
        meta.add_wrapping(KeyWrapping {
            key_name: "bob".to_string(),
            wrapped_symmetric_key: vec![4, 5, 6],
        });

        let map = meta.to_metadata();
        let parsed = ObjectMetadata::from_metadata(&map).unwrap();
        assert_eq!(parsed.wrappings.len(), 2);
        assert_eq!(parsed.wrapping_for("alice").unwrap().wrapped_symmetric_key, vec![1, 2, 3]);
        assert_eq!(parsed.wrapping_for("bob").unwrap().wrapped_symmetric_key, vec![4, 5, 6]);
    }

    #[test]
    fn rejects_mismatched_format_version() {
        let mut map = ObjectMetadata::plain(1024, 4096).to_metadata();
        map.insert(KEY_VERSION.to_string(), "99".to_string());
        let result = ObjectMetadata::from_metadata(&map);
        assert!(matches!(result, Err(Error::UnsupportedVersion(v)) if v == "99"));
    }

    #[test]
    fn rejects_missing_version() {
        let mut map = ObjectMetadata::plain(1024, 4096).to_metadata();
        map.remove(KEY_VERSION);
        assert!(ObjectMetadata::from_metadata(&map).is_err());
    }

    #[test]
    fn cannot_remove_last_wrapping() {
        let mut meta = ObjectMetadata::encrypted(
            1024,
            4096,
            KeyWrapping {
                key_name: "alice".to_string(),
                wrapped_symmetric_key: vec![1],
            },
        );
        assert!(matches!(
            meta.remove_wrapping("alice"),
            Err(Error::LastKeyRemoval)
        ));
    }

    #[test]
    fn can_remove_non_last_wrapping() {
        let mut meta = ObjectMetadata::encrypted(
            1024,
            4096,
            KeyWrapping {
                key_name: "alice".to_string(),
                wrapped_symmetric_key: vec![1],
            },
        );
        meta.add_wrapping(KeyWrapping {
            key_name: "bob".to_string(),
            wrapped_symmetric_key: vec![2],
        });
        meta.remove_wrapping("alice").unwrap();
        assert_eq!(meta.wrappings.len(), 1);
        assert_eq!(meta.wrappings[0].key_name, "bob");
    }

    #[test]
    fn removing_unknown_key_name_errors() {
        let mut meta = ObjectMetadata::encrypted(
            1024,
            4096,
            KeyWrapping {
                key_name: "alice".to_string(),
                wrapped_symmetric_key: vec![1],
            },
        );
        meta.add_wrapping(KeyWrapping {
            key_name: "bob".to_string(),
            wrapped_symmetric_key: vec![2],
        });
        assert!(matches!(
            meta.remove_wrapping("carol"),
            Err(Error::MissingKey(_))
        ));
    }
}
