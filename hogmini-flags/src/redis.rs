use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError};
use thiserror::Error;
use tokio::time::timeout;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Timeout error")]
    Timeout,
    #[error("Redis error: {0}")]
    Other(String),
}

impl From<RedisError> for CustomRedisError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Other(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for CustomRedisError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CustomRedisError::Timeout
    }
}

/// A simple redis wrapper over the handful of string commands the flag
/// service needs. Values are JSON-encoded strings written by the CRUD layer.
#[async_trait]
pub trait Client {
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError>;
    /// Writes `v` only when `k` is absent. Returns whether the write happened.
    async fn set_nx(&self, k: String, v: String) -> Result<bool, CustomRedisError>;
}

pub struct RedisClient {
    client: redis::Client,
    timeout: Duration,
}

impl RedisClient {
    /// `timeout` bounds each command, not the connection setup.
    pub fn new(addr: String, timeout: Duration) -> Result<RedisClient, CustomRedisError> {
        let client = redis::Client::open(addr)?;

        Ok(RedisClient { client, timeout })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.get::<_, Option<String>>(k);
        let fut = timeout(self.timeout, results).await??;

        fut.ok_or(CustomRedisError::NotFound)
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.set::<_, _, ()>(k, v);
        timeout(self.timeout, results).await??;

        Ok(())
    }

    async fn set_nx(&self, k: String, v: String) -> Result<bool, CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.set_nx::<_, _, bool>(k, v);
        let fut = timeout(self.timeout, results).await??;

        Ok(fut)
    }
}

/// In-memory stand-in for redis. Clones share the same keyspace, so a test can
/// seed data through one handle and hand another to the router.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    store: Arc<Mutex<HashMap<String, String>>>,
    failure: Option<CustomRedisError>,
}

impl MockRedisClient {
    pub fn new() -> MockRedisClient {
        Self::default()
    }

    /// Every command on the returned client fails with `err`.
    pub fn failing(err: CustomRedisError) -> MockRedisClient {
        MockRedisClient {
            store: Arc::default(),
            failure: Some(err),
        }
    }

    fn check_failure(&self) -> Result<(), CustomRedisError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        self.check_failure()?;
        self.lock_store()
            .get(&k)
            .cloned()
            .ok_or(CustomRedisError::NotFound)
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        self.check_failure()?;
        self.lock_store().insert(k, v);
        Ok(())
    }

    async fn set_nx(&self, k: String, v: String) -> Result<bool, CustomRedisError> {
        self.check_failure()?;
        let mut store = self.lock_store();
        if store.contains_key(&k) {
            return Ok(false);
        }
        store.insert(k, v);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_redis_url_is_rejected() {
        assert!(RedisClient::new("not a redis url".to_string(), Duration::from_millis(10)).is_err());
        assert!(
            RedisClient::new("redis://localhost:6379/".to_string(), Duration::from_millis(10))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_mock_get_missing_key_is_not_found() {
        let client = MockRedisClient::new();

        match client.get("nope".to_string()).await {
            Err(CustomRedisError::NotFound) => (),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mock_set_nx_only_writes_once() {
        let client = MockRedisClient::new();

        assert!(client
            .set_nx("slug".to_string(), "first".to_string())
            .await
            .unwrap());
        assert!(!client
            .set_nx("slug".to_string(), "second".to_string())
            .await
            .unwrap());
        assert_eq!(client.get("slug".to_string()).await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_mock_clones_share_keyspace() {
        let client = MockRedisClient::new();
        let other = client.clone();

        client
            .set("key".to_string(), "value".to_string())
            .await
            .unwrap();
        assert_eq!(other.get("key".to_string()).await.unwrap(), "value");
    }

    #[tokio::test]
    async fn test_failing_mock_returns_configured_error() {
        let client = MockRedisClient::failing(CustomRedisError::Timeout);

        match client.set("key".to_string(), "value".to_string()).await {
            Err(CustomRedisError::Timeout) => (),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }
}
