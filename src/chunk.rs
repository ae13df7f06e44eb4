//! Chunk planner (spec.md §4.3): pure offset arithmetic, no I/O.
//!
//! The plaintext plan and the ciphertext plan must agree byte-for-byte
//! between the upload and download paths, so both walk through this one
//! module rather than recomputing offsets inline the way the teacher's
//! `upload_file_multipart` computes `part_size`/`start`/`end` ad hoc in
//! `s3/helpers.rs`.

use crate::error::{Error, Result};

/// AES block size in bytes; the ciphertext stride is derived from this.
pub const AES_BLOCK_SIZE: u64 = 16;

/// One element of a multipart transfer's plan.
///
/// `part_number` is 1-based externally (matching the S3 `PartNumber` the
/// SDK expects); callers index `0..plan.len()` and add 1 when calling the
/// adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub part_number: u32,
    pub plaintext_start: u64,
    pub plaintext_len: u64,
    pub ciphertext_start: u64,
    pub ciphertext_len: u64,
}

impl Part {
    pub fn plaintext_end_exclusive(&self) -> u64 {
        self.plaintext_start + self.plaintext_len
    }

    pub fn ciphertext_end_inclusive(&self) -> u64 {
        self.ciphertext_start + self.ciphertext_len - 1
    }
}

/// The S3 multipart-upload ceiling this crate plans against (spec.md's
/// "dynamic part-size floor" supplement).
pub const MAX_PARTS: usize = 10_000;

/// Compute the full part plan for a file of plaintext length `file_length`,
/// chunked at `chunk_size` bytes, optionally encrypted.
///
/// For `encrypted`, `chunk_size` must already be a multiple of
/// [`AES_BLOCK_SIZE`] (validated by [`crate::config`] at the options-builder
/// boundary, per spec.md §6); this function re-validates since it is also
/// called directly by tests and other internal callers.
pub fn plan(file_length: u64, chunk_size: u64, encrypted: bool) -> Result<Vec<Part>> {
    if chunk_size == 0 {
        return Err(Error::Usage("chunk size must be greater than zero".into()));
    }
    if encrypted && chunk_size % AES_BLOCK_SIZE != 0 {
        return Err(Error::Usage(format!(
            "chunk size {chunk_size} must be a multiple of the AES block size ({AES_BLOCK_SIZE}) when encryption is enabled"
        )));
    }

    let part_count = if file_length == 0 {
        1
    } else {
        file_length.div_ceil(chunk_size) as usize
    };

    if part_count > MAX_PARTS {
        if encrypted {
            return Err(Error::Usage(format!(
                "chunk size {chunk_size} produces {part_count} parts for a {file_length}-byte \
                 object, exceeding the {MAX_PARTS}-part limit; choose a larger chunk size \
                 (the encrypted ciphertext stride is derived from the configured chunk size, \
                 so it cannot be grown automatically without desynchronizing readers)"
            )));
        }
        // Unencrypted transfers may grow the part size to stay under the
        // ceiling; callers wanting this floor applied should call
        // `floor_chunk_size_for_unencrypted` before `plan`.
        return Err(Error::Usage(format!(
            "chunk size {chunk_size} produces {part_count} parts for a {file_length}-byte \
             object, exceeding the {MAX_PARTS}-part limit"
        )));
    }

    let mut parts = Vec::with_capacity(part_count);
    let stride = AES_BLOCK_SIZE * (chunk_size / AES_BLOCK_SIZE + 2);

    for i in 0..part_count as u64 {
        let plaintext_start = i * chunk_size;
        let plaintext_len = if file_length == 0 {
            0
        } else {
            std::cmp::min(file_length - plaintext_start, chunk_size)
        };

        let (ciphertext_start, ciphertext_len) = if encrypted {
            let len = AES_BLOCK_SIZE * (plaintext_len / AES_BLOCK_SIZE + 2);
            (i * stride, len)
        } else {
            (plaintext_start, plaintext_len)
        };

        parts.push(Part {
            part_number: (i + 1) as u32,
            plaintext_start,
            plaintext_len,
            ciphertext_start,
            ciphertext_len,
        });
    }

    Ok(parts)
}

/// Apply the teacher's dynamic part-size floor (`max(configured, file_length
/// / 10_000 + 1)`) for the unencrypted path only (spec.md SPEC_FULL
/// supplement: the encrypted path must not grow its chunk size silently).
pub fn floor_chunk_size_for_unencrypted(file_length: u64, chunk_size: u64) -> u64 {
    std::cmp::max(chunk_size, file_length / MAX_PARTS as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_file_has_one_empty_part() {
        let parts = plan(0, 5 * 1024 * 1024, false).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].plaintext_start, 0);
        assert_eq!(parts[0].plaintext_len, 0);
    }

    #[test]
    fn exact_multiple_of_chunk_size_has_distinct_plan_from_zero() {
        // fileLength % chunkSize == 0 with fileLength > 0: N full parts, no
        // trailing empty part, distinct from the L=0 case above.
        let chunk_size = 4 * 1024 * 1024;
        let parts = plan(3 * chunk_size, chunk_size, false).unwrap();
        assert_eq!(parts.len(), 3);
        for p in &parts {
            assert_eq!(p.plaintext_len, chunk_size);
        }
    }

    #[test]
    fn plaintext_plan_covers_range_with_no_gaps_or_overlaps() {
        let file_length = 12_582_912u64; // 3 * 4 MiB
        let parts = plan(file_length, 4 * 1024 * 1024, false).unwrap();
        let mut cursor = 0u64;
        for p in &parts {
            assert_eq!(p.plaintext_start, cursor);
            cursor = p.plaintext_end_exclusive();
        }
        assert_eq!(cursor, file_length);
    }

    #[test]
    fn ciphertext_lengths_match_spec_example() {
        // spec.md §8 scenario 2: 3 * 4 MiB file, 4 MiB chunks, encrypted.
        let chunk_size = 4 * 1024 * 1024u64;
        let parts = plan(3 * chunk_size, chunk_size, true).unwrap();
        assert_eq!(parts.len(), 3);
        for p in &parts {
            assert_eq!(p.ciphertext_len, 16 * (chunk_size / 16 + 2));
            assert_eq!(p.ciphertext_len, 4_194_336);
        }
    }

    #[test]
    fn ciphertext_stride_is_constant_between_non_final_parts() {
        let chunk_size = 1024 * 1024u64;
        let parts = plan(10 * chunk_size, chunk_size, true).unwrap();
        let stride = AES_BLOCK_SIZE * (chunk_size / AES_BLOCK_SIZE + 2);
        for w in parts.windows(2) {
            assert_eq!(w[1].ciphertext_start - w[0].ciphertext_start, stride);
        }
    }

    #[test]
    fn rejects_non_block_aligned_chunk_size_when_encrypted() {
        assert!(plan(100, 17, true).is_err());
        assert!(plan(100, 16, true).is_ok());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(plan(100, 0, false).is_err());
    }

    #[test]
    fn rejects_encrypted_plan_exceeding_part_ceiling() {
        let result = plan(MAX_PARTS as u64 * 16 * 2, 16, true);
        assert!(matches!(result, Err(Error::Usage(_))));
    }

    #[test]
    fn floor_only_grows_when_needed() {
        assert_eq!(floor_chunk_size_for_unencrypted(1000, 5_000_000), 5_000_000);
        let huge = MAX_PARTS as u64 * 1_000_000;
        assert!(floor_chunk_size_for_unencrypted(huge, 16) > 16);
    }

    proptest::proptest! {
        #[test]
        fn plaintext_plan_never_gaps_or_overlaps(
            file_length in 0u64..50_000_000,
            chunk_size in 16u64..10_000_000,
        ) {
            let chunk_size = chunk_size - (chunk_size % 16) + 16; // keep block-aligned
            if let Ok(parts) = plan(file_length, chunk_size, false) {
                let mut cursor = 0u64;
                for p in &parts {
                    proptest::prop_assert_eq!(p.plaintext_start, cursor);
                    proptest::prop_assert!(p.plaintext_len <= chunk_size);
                    cursor = p.plaintext_end_exclusive();
                }
                proptest::prop_assert_eq!(cursor, file_length.max(0));
            }
        }

        #[test]
        fn ciphertext_stride_invariant_holds(
            file_length in 16u64..50_000_000,
            chunk_blocks in 1u64..600_000,
        ) {
            let chunk_size = chunk_blocks * AES_BLOCK_SIZE;
            if let Ok(parts) = plan(file_length, chunk_size, true) {
                let stride = AES_BLOCK_SIZE * (chunk_size / AES_BLOCK_SIZE + 2);
                for w in parts.windows(2) {
                    proptest::prop_assert_eq!(w[1].ciphertext_start - w[0].ciphertext_start, stride);
                }
            }
        }
    }
}
