//! Single-owner advisory locking for the merge queue, with a TTL so a dead
//! holder can never wedge the queue shut.
//!
//! `TableLock` is the portable implementation: a row in the `queue_locks`
//! table carrying acquire/release/holder-identity state.
//! [`advisory`] sketches a native-Postgres alternative behind an
//! `advisory_locks` feature flag — not wired to a live connection pool,
//! since this crate ships the table-based lock only.

pub mod advisory;

use std::sync::Arc;
use std::time::Duration;

use converge_store::ConvergeStore;
use converge_types::{ConvergeError, QueueLock};

/// Default TTL for a queue lock: 5 minutes, matching the config default.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Identifies the current process as a lock holder: hostname + pid packed
/// into an i64 so it fits the store's `holder_pid` column, and is stable
/// for the process's whole lifetime.
pub fn current_holder_id() -> i64 {
    let pid = std::process::id() as i64;
    let host_hash: i64 = gethostname::gethostname()
        .to_string_lossy()
        .bytes()
        .fold(0i64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as i64));
    (host_hash << 20) ^ pid
}

/// A held lock. Dropping it does NOT release it — locks are TTL-bounded and
/// released explicitly via [`TableLock::release`] or left to expire, the
/// same discipline the table-based reference implementation uses (no
/// `Drop`-based auto-release, since a panicking worker must not silently
/// free a lock whose in-flight work is actually still unsafe to resume).
pub struct TableLock {
    store: Arc<dyn ConvergeStore>,
    holder_id: i64,
}

impl TableLock {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        TableLock { store, holder_id: current_holder_id() }
    }

    pub fn with_holder_id(store: Arc<dyn ConvergeStore>, holder_id: i64) -> Self {
        TableLock { store, holder_id }
    }

    /// Tries to acquire `lock_name`. Returns `false` if another live holder
    /// already has it (its TTL hasn't elapsed).
    pub fn acquire(&self, lock_name: &str, ttl: Duration) -> Result<bool, ConvergeError> {
        self.store.acquire_queue_lock(lock_name, self.holder_id, ttl)
    }

    /// Releases `lock_name`, but only if this process is the current holder.
    /// Returns `false` if the lock was already gone or held by someone else.
    pub fn release(&self, lock_name: &str) -> Result<bool, ConvergeError> {
        self.store.release_queue_lock(lock_name, self.holder_id)
    }

    /// Unconditionally clears `lock_name` regardless of holder — an
    /// operator escape hatch for a wedged lock, never called automatically.
    pub fn force_release(&self, lock_name: &str) -> Result<bool, ConvergeError> {
        self.store.force_release_queue_lock(lock_name)
    }

    pub fn info(&self, lock_name: &str) -> Result<Option<QueueLock>, ConvergeError> {
        self.store.get_queue_lock_info(lock_name)
    }

    /// Runs `f` while holding `lock_name`, releasing it afterward regardless
    /// of whether `f` succeeded. Returns `Ok(None)` without running `f` if
    /// the lock could not be acquired.
    pub fn with_lock<T>(
        &self,
        lock_name: &str,
        ttl: Duration,
        f: impl FnOnce() -> Result<T, ConvergeError>,
    ) -> Result<Option<T>, ConvergeError> {
        if !self.acquire(lock_name, ttl)? {
            return Ok(None);
        }
        let result = f();
        self.release(lock_name)?;
        result.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_store::SqliteStore;

    fn lock(holder: i64) -> TableLock {
        TableLock::with_holder_id(Arc::new(SqliteStore::open_in_memory().unwrap()), holder)
    }

    fn shared_store() -> Arc<dyn ConvergeStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    #[test]
    fn second_acquire_fails_while_first_holds() {
        let store = shared_store();
        let a = TableLock::with_holder_id(store.clone(), 1);
        let b = TableLock::with_holder_id(store.clone(), 2);

        assert!(a.acquire("queue", Duration::from_secs(60)).unwrap());
        assert!(!b.acquire("queue", Duration::from_secs(60)).unwrap());
    }

    #[test]
    fn release_by_non_holder_is_a_no_op() {
        let store = shared_store();
        let a = TableLock::with_holder_id(store.clone(), 1);
        let b = TableLock::with_holder_id(store.clone(), 2);

        a.acquire("queue", Duration::from_secs(60)).unwrap();
        assert!(!b.release("queue").unwrap());
        assert!(a.release("queue").unwrap());
    }

    #[test]
    fn with_lock_runs_closure_and_releases_after() {
        let l = lock(1);
        let ran = l.with_lock("queue", Duration::from_secs(60), || Ok(42)).unwrap();
        assert_eq!(ran, Some(42));
        assert!(l.info("queue").unwrap().is_none());
    }

    #[test]
    fn with_lock_returns_none_when_contended() {
        let store = shared_store();
        let a = TableLock::with_holder_id(store.clone(), 1);
        let b = TableLock::with_holder_id(store.clone(), 2);

        a.acquire("queue", Duration::from_secs(60)).unwrap();
        let ran = b.with_lock("queue", Duration::from_secs(60), || Ok(())).unwrap();
        assert_eq!(ran, None);
    }

    #[test]
    fn force_release_clears_regardless_of_holder() {
        let store = shared_store();
        let a = TableLock::with_holder_id(store.clone(), 1);
        let b = TableLock::with_holder_id(store.clone(), 2);

        a.acquire("queue", Duration::from_secs(60)).unwrap();
        assert!(b.force_release("queue").unwrap());
        assert!(b.acquire("queue", Duration::from_secs(60)).unwrap());
    }
}
