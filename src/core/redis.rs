use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client, RedisError};
use tokio::sync::RwLock;

/// Shared Redis connection. The service keeps running when Redis is down;
/// callers see cache misses and the job store falls back to memory.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        *self.manager.write().await = None;
    }

    /// Snapshot of the managed connection, if one was ever established.
    pub(crate) async fn manager(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.manager().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    pub(crate) async fn get_string(&self, key: &str) -> Result<Option<String>, RedisError> {
        match self.manager().await {
            Some(mut manager) => manager.get(key).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn set_string(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), RedisError> {
        match self.manager().await {
            Some(mut manager) => manager.set_ex(key, value, ttl_seconds).await,
            None => Ok(()),
        }
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<(), RedisError> {
        match self.manager().await {
            Some(mut manager) => manager.del(key).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};

    #[tokio::test]
    async fn disconnected_handle_reports_disconnected() {
        let redis = RedisHandle::new("redis://localhost:6379/0".to_string());
        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
    }

    #[tokio::test]
    async fn disconnected_handle_degrades_to_cache_misses() {
        let redis = RedisHandle::new("redis://localhost:6379/0".to_string());

        assert!(redis.get_string("quiz-bundle:any").await.expect("get").is_none());
        redis.set_string("quiz-bundle:any", "{}", 60).await.expect("set");
        redis.delete("quiz-bundle:any").await.expect("delete");
        assert!(redis.manager().await.is_none());
    }
}
