//! In-memory store backend for tests and storeless development

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Result, StateStore, StoreError};

#[derive(Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, Vec<String>>,
    lists: HashMap<String, VecDeque<String>>,
    strings: HashMap<String, String>,
}

/// A [`StateStore`] held entirely in process memory.
///
/// Key expiry is accepted and ignored; nothing in the routing core reads a
/// key back after its intended expiry within one test run.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let inner = self.inner.lock();
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let set = inner.sets.entry(key.to_string()).or_default();
        if !set.iter().any(|m| m == member) {
            set.push(member.to_string());
        }
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(set) = inner.sets.get_mut(key) {
            set.retain(|m| m != member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner.sets.get(key).cloned().unwrap_or_default())
    }

    async fn list_push_tail(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn list_pop_head(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock();
        Ok(inner.lists.get_mut(key).and_then(|list| list.pop_front()))
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<usize> {
        let mut inner = self.inner.lock();
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|v| v != value);
        Ok(before - list.len())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock();
        Ok(inner.strings.get(key).cloned())
    }

    async fn string_set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn counter_incr(&self, key: &str) -> Result<i64> {
        let mut inner = self.inner.lock();
        let current = match inner.strings.get(key) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::Command(format!("key {key} holds a non-integer")))?,
            None => 0,
        };
        let next = current + 1;
        inner.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn key_expire(&self, _key: &str, _seconds: usize) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_are_fifo() {
        let store = MemoryStore::new();
        store.list_push_tail("k", "a").await.unwrap();
        store.list_push_tail("k", "b").await.unwrap();
        store.list_push_tail("k", "c").await.unwrap();

        assert_eq!(store.list_range("k").await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.list_pop_head("k").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.list_pop_head("k").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.list_pop_head("k").await.unwrap(), Some("c".to_string()));
        assert_eq!(store.list_pop_head("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_remove_reports_count() {
        let store = MemoryStore::new();
        store.list_push_tail("k", "x").await.unwrap();
        store.list_push_tail("k", "y").await.unwrap();
        store.list_push_tail("k", "x").await.unwrap();

        assert_eq!(store.list_remove("k", "x").await.unwrap(), 2);
        assert_eq!(store.list_remove("k", "x").await.unwrap(), 0);
        assert_eq!(store.list_range("k").await.unwrap(), vec!["y"]);
    }

    #[tokio::test]
    async fn sets_ignore_duplicates() {
        let store = MemoryStore::new();
        store.set_add("s", "alice").await.unwrap();
        store.set_add("s", "alice").await.unwrap();
        store.set_add("s", "bob").await.unwrap();

        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["alice", "bob"]);

        store.set_remove("s", "alice").await.unwrap();
        assert_eq!(store.set_members("s").await.unwrap(), vec!["bob"]);
    }

    #[tokio::test]
    async fn hashes_merge_fields() {
        let store = MemoryStore::new();
        store
            .hash_set_all("h", &[("a".into(), "1".into()), ("b".into(), "2".into())])
            .await
            .unwrap();
        store.hash_set_all("h", &[("b".into(), "3".into())]).await.unwrap();

        let hash = store.hash_get_all("h").await.unwrap();
        assert_eq!(hash.get("a").map(String::as_str), Some("1"));
        assert_eq!(hash.get("b").map(String::as_str), Some("3"));
        assert!(store.hash_get_all("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counters_start_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.counter_incr("c").await.unwrap(), 1);
        assert_eq!(store.counter_incr("c").await.unwrap(), 2);
        store.key_expire("c", 60).await.unwrap();
    }
}
