use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use ridebook_core::repository::LocalCache;
use ridebook_core::BoxError;
use tracing::debug;

/// Redis-backed local cache for booking drafts, plus request rate limiting.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get_draft(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn set_draft(&self, key: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        debug!("Cached draft under {}", key);
        Ok(())
    }

    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl LocalCache for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.get_draft(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        Ok(self.set_draft(key, value).await?)
    }
}
