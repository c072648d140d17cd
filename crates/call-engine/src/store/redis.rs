//! Redis store backend

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::info;

use super::{Result, StateStore, StoreError};
use crate::config::RedisConfig;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// [`StateStore`] backed by a Redis server.
///
/// The connection is multiplexed; clones share one socket, so every operation
/// works on a cheap clone of the handle.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client =
            Client::open(config.url()).map_err(|e| StoreError::Connection(e.to_string()))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("🗄️ Connected to state store at {}:{}", config.host, config.port);
        Ok(Self { connection })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut connection = self.connection.clone();
        Ok(connection.hgetall(key).await?)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        Ok(connection.smembers(key).await?)
    }

    async fn list_push_tail(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.rpush(key, value).await?;
        Ok(())
    }

    async fn list_pop_head(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        Ok(connection.lpop(key, None).await?)
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<usize> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection.lrem(key, 0, value).await?;
        Ok(removed.max(0) as usize)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        Ok(connection.lrange(key, 0, -1).await?)
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        Ok(connection.get(key).await?)
    }

    async fn string_set(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(key, value).await?;
        Ok(())
    }

    async fn counter_incr(&self, key: &str) -> Result<i64> {
        let mut connection = self.connection.clone();
        Ok(connection.incr(key, 1i64).await?)
    }

    async fn key_expire(&self, key: &str, seconds: usize) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.expire(key, seconds as i64).await?;
        Ok(())
    }
}
