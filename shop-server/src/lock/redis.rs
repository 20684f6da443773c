//! Redis lock backend (`SET key holder NX PX lease` / compare-and-delete)

use super::{LockError, LockManager, LockOptions, LockToken};
use async_trait::async_trait;
use rand::Rng;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::Instant;

/// Base backoff between acquisition attempts
const BACKOFF_BASE: Duration = Duration::from_millis(5);
/// Maximum backoff between acquisition attempts
const BACKOFF_MAX: Duration = Duration::from_millis(100);

/// Deletes the key only if it still carries our holder id
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisLockManager {
    conn: ConnectionManager,
    release_script: redis::Script,
}

impl RedisLockManager {
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        }
    }

    async fn try_acquire(&self, token: &LockToken, lease: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(token.key())
            .arg(token.holder())
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(reply.is_some())
    }
}

fn backend(e: redis::RedisError) -> LockError {
    LockError::Backend(e.to_string())
}

/// 0-20ms of jitter so competing instances do not poll in lockstep
fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=20))
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn acquire(&self, key: &str, options: LockOptions) -> Result<LockToken, LockError> {
        let deadline = Instant::now() + options.wait;
        let token = LockToken::new(key);
        let mut backoff = BACKOFF_BASE;

        loop {
            if self.try_acquire(&token, options.lease).await? {
                return Ok(token);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::AcquisitionTimeout {
                    key: key.to_string(),
                    wait_ms: options.wait.as_millis() as u64,
                });
            }
            let delay = (backoff.min(BACKOFF_MAX) + jitter()).min(deadline - now);
            tokio::time::sleep(delay).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release_script
            .key(token.key())
            .arg(token.holder())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(deleted == 1)
    }
}
