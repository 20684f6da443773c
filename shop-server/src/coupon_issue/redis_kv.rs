//! Redis-backed [`KvStore`]

use super::kv::{KvError, KvResult, KvStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue};

#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self { conn })
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn run<T: FromRedisValue>(&self, cmd: &Cmd) -> KvResult<T> {
        let mut conn = self.conn.clone();
        cmd.query_async(&mut conn).await.map_err(backend)
    }
}

fn backend(e: redis::RedisError) -> KvError {
    if e.kind() == redis::ErrorKind::TypeError {
        return KvError::WrongType(e.to_string());
    }
    KvError::Backend(e.to_string())
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set_add(&self, key: &str, member: &str) -> KvResult<bool> {
        let added: i64 = self.run(redis::cmd("SADD").arg(key).arg(member)).await?;
        Ok(added == 1)
    }

    async fn set_add_with_size(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        // MULTI/EXEC: no other client can change the set between the two
        let mut conn = self.conn.clone();
        let (added, size): (i64, u64) = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(key)
            .arg(member)
            .cmd("SCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok((added == 1).then_some(size))
    }

    async fn set_remove(&self, key: &str, member: &str) -> KvResult<bool> {
        let removed: i64 = self.run(redis::cmd("SREM").arg(key).arg(member)).await?;
        Ok(removed == 1)
    }

    async fn set_size(&self, key: &str) -> KvResult<u64> {
        self.run(redis::cmd("SCARD").arg(key)).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> KvResult<bool> {
        self.run(redis::cmd("SISMEMBER").arg(key).arg(member)).await
    }

    async fn set_members(&self, key: &str) -> KvResult<Vec<String>> {
        self.run(redis::cmd("SMEMBERS").arg(key)).await
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.run(redis::cmd("SET").arg(key).arg(value)).await
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let _: i64 = self.run(redis::cmd("DEL").arg(key)).await?;
        Ok(())
    }

    async fn list_push(&self, key: &str, values: &[String]) -> KvResult<u64> {
        if values.is_empty() {
            return self.list_len(key).await;
        }
        self.run(redis::cmd("RPUSH").arg(key).arg(values)).await
    }

    async fn list_pop(&self, key: &str, count: usize) -> KvResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        // LPOP with a count replies nil on a missing key
        let popped: Option<Vec<String>> = self.run(redis::cmd("LPOP").arg(key).arg(count)).await?;
        Ok(popped.unwrap_or_default())
    }

    async fn list_len(&self, key: &str) -> KvResult<u64> {
        self.run(redis::cmd("LLEN").arg(key)).await
    }

    async fn list_range(&self, key: &str) -> KvResult<Vec<String>> {
        self.run(redis::cmd("LRANGE").arg(key).arg(0).arg(-1)).await
    }

    async fn sorted_incr(&self, key: &str, member: &str, delta: f64) -> KvResult<f64> {
        self.run(redis::cmd("ZINCRBY").arg(key).arg(delta).arg(member)).await
    }

    async fn sorted_top(&self, key: &str, limit: usize) -> KvResult<Vec<(String, f64)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.run(
            redis::cmd("ZREVRANGE")
                .arg(key)
                .arg(0)
                .arg(limit as isize - 1)
                .arg("WITHSCORES"),
        )
        .await
    }
}
