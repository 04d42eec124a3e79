//! Redis-backed fixed-window rate limiter for the auth endpoints

use redis::{AsyncCommands, Client};

use crate::{
    config::RateLimitConfig,
    error::{AppError, AppResult},
};

/// Redis key counting requests from `ip` during the window containing `now_secs`
pub fn window_key(ip: &str, now_secs: u64, window_secs: u64) -> String {
    let window = now_secs / window_secs.max(1);
    format!("ratelimit:{}:{}", ip, window)
}

#[derive(Clone)]
pub struct RateLimiter {
    client: Client,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Connect to Redis and check the server answers
    pub async fn new(url: &str, config: RateLimitConfig) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client, config })
    }

    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis ping failed: {}", e)))?;
        Ok(())
    }

    /// Count one request from `ip`; `RateLimited` once the window is full
    pub async fn check(&self, ip: &str) -> AppResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))?;

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let key = window_key(ip, now, self.config.window_secs);

        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to count request in Redis: {}", e)))?;

        if count == 1 {
            conn.expire::<_, ()>(&key, self.config.window_secs as i64)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to set rate limit expiry: {}", e)))?;
        }

        if count > self.config.max_requests {
            tracing::warn!("Rate limit exceeded for {}", ip);
            return Err(AppError::RateLimited(
                "Too many requests, please try again later".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_window_same_key() {
        assert_eq!(window_key("10.0.0.1", 120, 60), window_key("10.0.0.1", 179, 60));
        assert_ne!(window_key("10.0.0.1", 179, 60), window_key("10.0.0.1", 180, 60));
    }

    #[test]
    fn test_key_format() {
        assert_eq!(window_key("127.0.0.1", 125, 60), "ratelimit:127.0.0.1:2");
    }

    #[test]
    fn test_zero_window_does_not_divide_by_zero() {
        assert_eq!(window_key("::1", 5, 0), "ratelimit:::1:5");
    }
}
