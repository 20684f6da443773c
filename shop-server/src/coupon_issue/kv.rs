//! In-memory key-value store abstraction
//!
//! Each call is atomic on its own; nothing here spans several keys.
//! [`KvStore::set_add_with_size`] is the one compound call: admission needs
//! the add and the cardinality it produced as a single step.
//! [`MemoryKvStore`] backs a single instance and the tests; the Redis
//! backend (feature `redis`) is the multi-instance deployment.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Key {0} holds a value of another type")]
    WrongType(String),

    #[error("Malformed value at {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type KvResult<T> = Result<T, KvError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Add to a set; `false` if already a member
    async fn set_add(&self, key: &str, member: &str) -> KvResult<bool>;
    /// Remove from a set; `false` if it was not a member
    /// Add to a set and return its size right after the add, in one atomic
    /// step; `None` if already a member
    async fn set_add_with_size(&self, key: &str, member: &str) -> KvResult<Option<u64>>;
    async fn set_remove(&self, key: &str, member: &str) -> KvResult<bool>;
    async fn set_size(&self, key: &str) -> KvResult<u64>;
    async fn set_contains(&self, key: &str, member: &str) -> KvResult<bool>;
    async fn set_members(&self, key: &str) -> KvResult<Vec<String>>;

    async fn get(&self, key: &str) -> KvResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> KvResult<()>;
    async fn delete(&self, key: &str) -> KvResult<()>;

    /// Append to the tail of a list; returns the new length
    async fn list_push(&self, key: &str, values: &[String]) -> KvResult<u64>;
    /// Remove and return up to `count` values from the head
    async fn list_pop(&self, key: &str, count: usize) -> KvResult<Vec<String>>;
    async fn list_len(&self, key: &str) -> KvResult<u64>;
    /// Whole list, head first, without removing anything
    async fn list_range(&self, key: &str) -> KvResult<Vec<String>>;

    /// Add `delta` to a member's score; returns the new score
    async fn sorted_incr(&self, key: &str, member: &str, delta: f64) -> KvResult<f64>;
    /// Highest scores first
    async fn sorted_top(&self, key: &str, limit: usize) -> KvResult<Vec<(String, f64)>>;
}

enum Value {
    Str(String),
    Set(HashSet<String>),
    List(VecDeque<String>),
    Sorted(HashMap<String, f64>),
}

/// Process-local store; a single mutex makes every call atomic
#[derive(Default)]
pub struct MemoryKvStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str) -> KvError {
    KvError::WrongType(key.to_string())
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set_add(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut data = self.data.lock();
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_add_with_size(&self, key: &str, member: &str) -> KvResult<Option<u64>> {
        let mut data = self.data.lock();
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(set) => Ok(set.insert(member.to_string()).then(|| set.len() as u64)),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut data = self.data.lock();
        let (removed, now_empty) = match data.get_mut(key) {
            None => return Ok(false),
            Some(Value::Set(set)) => (set.remove(member), set.is_empty()),
            Some(_) => return Err(wrong_type(key)),
        };
        if now_empty {
            data.remove(key);
        }
        Ok(removed)
    }

    async fn set_size(&self, key: &str) -> KvResult<u64> {
        match self.data.lock().get(key) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> KvResult<bool> {
        match self.data.lock().get(key) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> KvResult<Vec<String>> {
        match self.data.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        match self.data.lock().get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.data
            .lock()
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    async fn list_push(&self, key: &str, values: &[String]) -> KvResult<u64> {
        let mut data = self.data.lock();
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(list) => {
                list.extend(values.iter().cloned());
                Ok(list.len() as u64)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn list_pop(&self, key: &str, count: usize) -> KvResult<Vec<String>> {
        let mut data = self.data.lock();
        let (popped, now_empty) = match data.get_mut(key) {
            None => return Ok(Vec::new()),
            Some(Value::List(list)) => {
                let n = count.min(list.len());
                (list.drain(..n).collect::<Vec<_>>(), list.is_empty())
            }
            Some(_) => return Err(wrong_type(key)),
        };
        if now_empty {
            data.remove(key);
        }
        Ok(popped)
    }

    async fn list_len(&self, key: &str) -> KvResult<u64> {
        match self.data.lock().get(key) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_range(&self, key: &str) -> KvResult<Vec<String>> {
        match self.data.lock().get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sorted_incr(&self, key: &str, member: &str, delta: f64) -> KvResult<f64> {
        let mut data = self.data.lock();
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Sorted(HashMap::new()))
        {
            Value::Sorted(scores) => {
                let score = scores.entry(member.to_string()).or_insert(0.0);
                *score += delta;
                Ok(*score)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn sorted_top(&self, key: &str, limit: usize) -> KvResult<Vec<(String, f64)>> {
        let mut entries: Vec<(String, f64)> = match self.data.lock().get(key) {
            None => return Ok(Vec::new()),
            Some(Value::Sorted(scores)) => scores.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            Some(_) => return Err(wrong_type(key)),
        };
        // Highest score first, ties by member for a stable order
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_add_reports_duplicates_and_cleans_up() {
        let kv = MemoryKvStore::new();
        assert!(kv.set_add("s", "1").await.unwrap());
        assert!(!kv.set_add("s", "1").await.unwrap());
        assert!(kv.set_add("s", "2").await.unwrap());
        assert_eq!(kv.set_size("s").await.unwrap(), 2);
        assert!(kv.set_contains("s", "2").await.unwrap());

        assert!(kv.set_remove("s", "1").await.unwrap());
        assert!(!kv.set_remove("s", "1").await.unwrap());
        assert!(kv.set_remove("s", "2").await.unwrap());
        assert_eq!(kv.set_size("s").await.unwrap(), 0);
        assert!(kv.set_members("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_add_with_size_counts_the_new_member() {
        let kv = MemoryKvStore::new();
        assert_eq!(kv.set_add_with_size("s", "1").await.unwrap(), Some(1));
        assert_eq!(kv.set_add_with_size("s", "2").await.unwrap(), Some(2));
        assert_eq!(kv.set_add_with_size("s", "1").await.unwrap(), None);
        kv.set_remove("s", "1").await.unwrap();
        assert_eq!(kv.set_add_with_size("s", "3").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn list_is_fifo_and_pop_is_bounded() {
        let kv = MemoryKvStore::new();
        let values: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(kv.list_push("q", &values).await.unwrap(), 5);

        assert_eq!(kv.list_pop("q", 2).await.unwrap(), vec!["0", "1"]);
        assert_eq!(kv.list_range("q").await.unwrap(), vec!["2", "3", "4"]);
        assert_eq!(kv.list_pop("q", 10).await.unwrap(), vec!["2", "3", "4"]);
        assert_eq!(kv.list_len("q").await.unwrap(), 0);
        assert!(kv.list_pop("q", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn type_mismatch_is_an_error() {
        let kv = MemoryKvStore::new();
        kv.set("k", "10").await.unwrap();
        assert!(matches!(kv.set_add("k", "1").await, Err(KvError::WrongType(_))));
        assert!(matches!(kv.list_len("k").await, Err(KvError::WrongType(_))));
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("10"));
        kv.delete("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sorted_top_orders_by_score() {
        let kv = MemoryKvStore::new();
        kv.sorted_incr("z", "a", 0.5).await.unwrap();
        kv.sorted_incr("z", "b", 0.25).await.unwrap();
        assert_eq!(kv.sorted_incr("z", "b", 0.5).await.unwrap(), 0.75);
        kv.sorted_incr("z", "c", 0.1).await.unwrap();

        let top = kv.sorted_top("z", 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "b");
        assert_eq!(top[1].0, "a");
    }
}
