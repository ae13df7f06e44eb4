//! Per-part AES-CBC stream cipher with a prepended IV (spec.md §4.2 "Per-part
//! streaming cipher").
//!
//! Grounded in
//! `get-convex-convex-backend/crates/fivetran_destination/src/aes.rs`'s
//! `cbc::Decryptor<aes::Aes256Dec>` + `Pkcs7` pattern, but buffer-oriented
//! rather than an `AsyncRead` adapter: the part worker already holds each
//! part's bytes in memory (bounded by `chunk_size`, spec.md §6's multiple-
//! of-16 requirement), so encrypting/decrypting a whole part buffer at once
//! is the natural fit rather than a byte-streaming state machine.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::error::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

/// Encrypt one part's plaintext under `key`, returning `IV || ciphertext`
/// (spec.md §4.2: "IV is prepended to each part's ciphertext as the first
/// full cipher block"). Each call uses a fresh random IV and an independent
/// CBC session, matching "Part streams are independent".
pub fn encrypt_part(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let encryptor = Aes256CbcEnc::new(key.into(), &iv.into());
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt `IV || ciphertext` back to the original plaintext (spec.md §4.2:
/// "read the first block from the stream as IV, then decrypt the
/// remainder").
pub fn decrypt_part(key: &[u8; 32], iv_and_ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv_and_ciphertext.len() < IV_LEN {
        return Err(Error::Crypto(format!(
            "ciphertext shorter than the IV block ({} < {IV_LEN})",
            iv_and_ciphertext.len()
        )));
    }
    let (iv, ciphertext) = iv_and_ciphertext.split_at(IV_LEN);

    let decryptor = Aes256CbcDec::new(key.into(), iv.into());
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| Error::Crypto(format!("AES-CBC decrypt failed: {e}")))
}
