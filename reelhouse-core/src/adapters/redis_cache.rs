//! Redis-backed lookup cache for catalogued entities.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use reelhouse_model::MediaEntity;
use tracing::{debug, info};

use crate::error::{MediaError, Result};
use crate::ports::MediaCache;

const KEY_PREFIX: &str = "reelhouse:media:";

#[derive(Clone)]
pub struct RedisMediaCache {
    conn: ConnectionManager,
    ttl: Option<Duration>,
}

impl fmt::Debug for RedisMediaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisMediaCache")
            .field("connection", &"ConnectionManager")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl RedisMediaCache {
    pub async fn connect(redis_url: &str, ttl: Option<Duration>) -> Result<Self> {
        info!("Connecting to Redis cache at {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| MediaError::Cache(format!("Failed to create Redis client: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| MediaError::Cache(format!("Failed to connect to Redis: {e}")))?;

        info!("Successfully connected to Redis cache");

        Ok(Self { conn, ttl })
    }

    fn key(relative_path: &str) -> String {
        format!("{KEY_PREFIX}{relative_path}")
    }
}

#[async_trait]
impl MediaCache for RedisMediaCache {
    async fn get(&self, relative_path: &str) -> Result<Option<MediaEntity>> {
        let key = Self::key(relative_path);
        let mut conn = self.conn.clone();

        let data: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| MediaError::Cache(format!("Redis GET failed: {e}")))?;

        match data {
            Some(json) => {
                debug!("Cache HIT: {}", key);
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn put(&self, entity: &MediaEntity) -> Result<()> {
        let key = Self::key(&entity.relative_path);
        let json = serde_json::to_string(entity)?;
        let mut conn = self.conn.clone();

        match self.ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(&key, json, ttl.as_secs())
                .await
                .map_err(|e| MediaError::Cache(format!("Redis SETEX failed: {e}")))?,
            None => conn
                .set::<_, _, ()>(&key, json)
                .await
                .map_err(|e| MediaError::Cache(format!("Redis SET failed: {e}")))?,
        }

        Ok(())
    }

    async fn invalidate(&self, relative_path: &str) -> Result<()> {
        let key = Self::key(relative_path);
        let mut conn = self.conn.clone();

        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| MediaError::Cache(format!("Redis DEL failed: {e}")))?;

        debug!("Cache DELETE: {}", key);
        Ok(())
    }
}
