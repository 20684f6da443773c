//! Lock Manager (命名互斥锁)
//!
//! At most one holder per key at a time, across every instance sharing the
//! backend. A holder gets a lease: if it never releases (task dropped,
//! process crashed) the key frees itself when the lease runs out.
//!
//! # Backends
//!
//! - [`LocalLockManager`] - in-process, for a single instance and tests
//! - `RedisLockManager` - `SET NX PX` + compare-and-delete (feature `redis`)

pub mod keys;
mod local;
#[cfg(feature = "redis")]
mod redis;

pub use local::LocalLockManager;
#[cfg(feature = "redis")]
pub use self::redis::RedisLockManager;

use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;

/// Wait and lease timeouts for one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// How long `acquire` may block before giving up
    pub wait: Duration,
    /// How long the lock stays held if never released
    pub lease: Duration,
}

impl LockOptions {
    pub fn new(wait: Duration, lease: Duration) -> Self {
        Self { wait, lease }
    }

    /// Same wait, different lease
    pub fn with_lease(self, lease: Duration) -> Self {
        Self { lease, ..self }
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(5_000),
            lease: Duration::from_millis(3_000),
        }
    }
}

/// Proof of ownership returned by `acquire`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    holder: String,
}

impl LockToken {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            holder: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Could not acquire lock {key} within {wait_ms}ms")]
    AcquisitionTimeout { key: String, wait_ms: u64 },

    #[error("Lock backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Block up to `options.wait` for `key`
    async fn acquire(&self, key: &str, options: LockOptions) -> Result<LockToken, LockError>;

    /// Release if still held by `token`; `false` means the lease already ran out
    async fn release(&self, token: &LockToken) -> Result<bool, LockError>;
}

/// Run `f` while holding `key`.
///
/// Fails with [`LockError::AcquisitionTimeout`] (converted into `E`) without
/// running `f` if the lock is not obtained within `options.wait`. The lock is
/// released after `f` returns `Ok`, returns `Err` or panics; a panic is
/// resumed after the release. If the returned future is dropped while `f`
/// is running, the lease is what frees the key.
pub async fn with_lock<T, E, F, Fut>(
    manager: &dyn LockManager,
    key: &str,
    options: LockOptions,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let token = manager.acquire(key, options).await?;

    let outcome = AssertUnwindSafe(async move { f().await }).catch_unwind().await;

    match manager.release(&token).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(key, "Lock lease expired before release"),
        Err(e) => tracing::warn!(key, error = %e, "Failed to release lock"),
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    enum TestError {
        Lock(LockError),
        Work,
    }

    impl From<LockError> for TestError {
        fn from(e: LockError) -> Self {
            TestError::Lock(e)
        }
    }

    fn quick() -> LockOptions {
        LockOptions::new(Duration::from_millis(50), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn releases_after_ok_and_err() {
        let locks = LocalLockManager::new();

        let ok: Result<i32, TestError> = with_lock(&locks, "k", quick(), || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
        assert!(!locks.is_locked("k"));

        let err: Result<i32, TestError> =
            with_lock(&locks, "k", quick(), || async { Err(TestError::Work) }).await;
        assert!(matches!(err, Err(TestError::Work)));
        assert!(!locks.is_locked("k"));
    }

    #[tokio::test]
    async fn releases_after_panic_and_resumes_it() {
        let locks = Arc::new(LocalLockManager::new());
        let inner = locks.clone();
        let handle = tokio::spawn(async move {
            let _: Result<(), TestError> = with_lock(inner.as_ref(), "k", quick(), || async {
                panic!("boom");
            })
            .await;
        });
        let joined = handle.await;
        assert!(joined.unwrap_err().is_panic());
        assert!(!locks.is_locked("k"));
    }

    #[tokio::test]
    async fn timeout_does_not_run_work() {
        let locks = LocalLockManager::new();
        let held = locks.acquire("k", quick()).await.unwrap();

        let ran = AtomicUsize::new(0);
        let result: Result<(), TestError> = with_lock(&locks, "k", quick(), || async {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(TestError::Lock(LockError::AcquisitionTimeout { .. }))
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(locks.release(&held).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serializes_same_key() {
        let locks = Arc::new(LocalLockManager::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let opts = LockOptions::new(Duration::from_secs(5), Duration::from_secs(5));
                let r: Result<(), TestError> = with_lock(locks.as_ref(), "shared", opts, || async {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
                r.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
