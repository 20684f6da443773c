//! In-process lock backend

use super::{LockError, LockManager, LockOptions, LockToken};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

struct Holder {
    holder: String,
    expires_at: Instant,
}

/// Lease-aware lock table for a single process
///
/// Waiters park on a [`Notify`] and are woken by every release; a waiter
/// whose key is held by an expired lease also wakes at the expiry instant
/// and takes the key over.
#[derive(Default)]
pub struct LocalLockManager {
    holders: DashMap<String, Holder>,
    released: Notify,
}

impl LocalLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is held by an unexpired lease
    pub fn is_locked(&self, key: &str) -> bool {
        self.holders
            .get(key)
            .is_some_and(|h| h.expires_at > Instant::now())
    }

    /// Take the key, or report when the current lease ends
    fn try_acquire(&self, key: &str, lease: Duration) -> Result<LockToken, Instant> {
        let now = Instant::now();
        let token = LockToken::new(key);
        let holder = Holder {
            holder: token.holder().to_string(),
            expires_at: now + lease,
        };
        match self.holders.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().expires_at > now {
                    return Err(held.get().expires_at);
                }
                tracing::warn!(key, "Taking over lock with expired lease");
                held.insert(holder);
            }
            Entry::Vacant(slot) => {
                slot.insert(holder);
            }
        }
        Ok(token)
    }
}

#[async_trait]
impl LockManager for LocalLockManager {
    async fn acquire(&self, key: &str, options: LockOptions) -> Result<LockToken, LockError> {
        let deadline = Instant::now() + options.wait;
        loop {
            // Register interest before checking, so a release between the
            // check and the await is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let lease_end = match self.try_acquire(key, options.lease) {
                Ok(token) => return Ok(token),
                Err(lease_end) => lease_end,
            };

            if Instant::now() >= deadline {
                return Err(LockError::AcquisitionTimeout {
                    key: key.to_string(),
                    wait_ms: options.wait.as_millis() as u64,
                });
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(lease_end.min(deadline)) => {}
            }
        }
    }

    async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
        let removed = self
            .holders
            .remove_if(token.key(), |_, h| h.holder == token.holder())
            .is_some();
        if removed {
            self.released.notify_waiters();
        }
        Ok(removed)
    }
}
