//! RSA wrap/unwrap and the key provider (spec.md §4.2, §6 "Key file
//! layout").
//!
//! RSA key generation is grounded in
//! `get-convex-convex-backend/crates/keybroker/src/testing.rs`'s
//! `rsa::RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 2048)`. Padding mode
//! is PKCS#1 v1.5 (`rsa::Pkcs1v15Encrypt`) per SPEC_FULL's resolution of
//! spec.md §9's open padding question.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{Error, Result};

const RSA_KEY_BITS: usize = 2048;

/// A named asymmetric key pair as loaded from the key directory. The
/// private half may be absent for a key this provider only holds the
/// public half of (spec.md §3: "Keys never leave the key provider; only
/// references do").
#[derive(Clone)]
pub struct KeyPair {
    pub name: String,
    pub public: RsaPublicKey,
    pub private: Option<RsaPrivateKey>,
}

impl KeyPair {
    /// Build a fresh in-memory key pair, used by unit tests that don't want
    /// to touch the filesystem.
    #[cfg(test)]
    pub fn generate_for_test(name: &str) -> Self {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_KEY_BITS)
            .expect("RSA key generation");
        let public = RsaPublicKey::from(&private);
        Self {
            name: name.to_string(),
            public,
            private: Some(private),
        }
    }
}

/// Loads key pairs from a directory (default `~/.s3lib-keys`, spec.md §6).
/// File naming convention: `<name>.pub.pem` for the public half,
/// `<name>.pem` for the private half. A name with only a `.pub.pem` file is
/// a public-only entry (wrap-only, no unwrap).
#[derive(Clone, Default)]
pub struct KeyProvider {
    pairs: HashMap<String, KeyPair>,
}

impl KeyProvider {
    pub fn from_pairs(pairs: Vec<KeyPair>) -> Self {
        Self {
            pairs: pairs.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    /// Load every `<name>.pem` / `<name>.pub.pem` pair found directly under
    /// `dir`. Missing directory is reported as `Error::Usage`; unreadable or
    /// malformed key files surface as `Error::Crypto`.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::Usage(format!("cannot read key directory {}: {e}", dir.display())))?;

        let mut names = std::collections::BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(name) = file_name.strip_suffix(".pub.pem") {
                names.insert(name.to_string());
            } else if let Some(name) = file_name.strip_suffix(".pem") {
                names.insert(name.to_string());
            }
        }

        let mut pairs = Vec::with_capacity(names.len());
        for name in names {
            pairs.push(Self::load_pair(dir, &name)?);
        }
        Ok(Self::from_pairs(pairs))
    }

    fn load_pair(dir: &Path, name: &str) -> Result<KeyPair> {
        let private_path = dir.join(format!("{name}.pem"));
        let public_path = dir.join(format!("{name}.pub.pem"));

        let private = if private_path.exists() {
            let pem = std::fs::read_to_string(&private_path)?;
            Some(
                RsaPrivateKey::from_pkcs1_pem(&pem)
                    .map_err(|e| Error::Crypto(format!("invalid private key {name}: {e}")))?,
            )
        } else {
            None
        };

        let public = if public_path.exists() {
            let pem = std::fs::read_to_string(&public_path)?;
            RsaPublicKey::from_pkcs1_pem(&pem)
                .map_err(|e| Error::Crypto(format!("invalid public key {name}: {e}")))?
        } else {
            let private = private.as_ref().ok_or_else(|| {
                Error::Crypto(format!("key {name} has neither a public nor a private half"))
            })?;
            RsaPublicKey::from(private)
        };

        Ok(KeyPair {
            name: name.to_string(),
            public,
            private,
        })
    }

    /// Default key directory per spec.md §6.
    pub fn default_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Usage("cannot determine home directory for key store".into()))?;
        Ok(home.join(".s3lib-keys"))
    }

    pub fn key_pair(&self, name: &str) -> Result<&KeyPair> {
        self.pairs
            .get(name)
            .ok_or_else(|| Error::MissingKey(name.to_string()))
    }

    pub fn public_key(&self, name: &str) -> Result<RsaPublicKey> {
        Ok(self.key_pair(name)?.public.clone())
    }

    pub fn private_key(&self, name: &str) -> Result<RsaPrivateKey> {
        self.key_pair(name)?
            .private
            .clone()
            .ok_or_else(|| Error::MissingKey(format!("{name} (public key only, no private half)")))
    }
}

/// RSA-encrypt `plaintext` (the symmetric key) under `public_key`
/// (spec.md §4.2 step 3: PKCS#1 v1.5 padding).
pub fn wrap_key(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    public_key
        .encrypt(&mut rand::rngs::OsRng, rsa::Pkcs1v15Encrypt, plaintext)
        .map_err(|e| Error::Crypto(format!("RSA wrap failed: {e}")))
}

/// RSA-decrypt a wrapped symmetric key with `private_key`.
pub fn unwrap_key(private_key: &RsaPrivateKey, wrapped: &[u8]) -> Result<Vec<u8>> {
    private_key
        .decrypt(rsa::Pkcs1v15Encrypt, wrapped)
        .map_err(|e| Error::Crypto(format!("RSA unwrap failed: {e}")))
}

/// Export a freshly generated key pair to PEM, used by tooling/tests that
/// need to seed a key directory; not part of the core contract.
pub fn generate_key_pair(name: &str) -> Result<KeyPair> {
    let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_KEY_BITS)
        .map_err(|e| Error::Crypto(format!("RSA key generation failed: {e}")))?;
    let public = RsaPublicKey::from(&private);
    Ok(KeyPair {
        name: name.to_string(),
        public,
        private: Some(private),
    })
}

/// Write a key pair's PEM files into a key directory (tooling/test helper;
/// not part of the core contract — see [`KeyProvider::load_from_dir`] for
/// the corresponding reader).
pub fn write_key_pair(dir: &Path, pair: &KeyPair) -> Result<()> {
    if let Some(private) = &pair.private {
        let pem = private
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .map_err(|e| Error::Crypto(format!("encoding private key: {e}")))?;
        std::fs::write(dir.join(format!("{}.pem", pair.name)), pem.as_bytes())?;
    }
    let pem = pair
        .public
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|e| Error::Crypto(format!("encoding public key: {e}")))?;
    std::fs::write(dir.join(format!("{}.pub.pem", pair.name)), pem.as_bytes())?;
    Ok(())
}
