use crate::config::settings::SessionConfig;
use crate::models::session::{Message, SessionMeta};
use crate::utils::error::{ApiError, Dependency};
use chrono::Utc;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use std::time::Duration;
use uuid::Uuid;

const TTL_RESET_SECONDS: i64 = 60 * 60 * 24 * 30;

/// Sentinel session-id used when the store is unreachable; C13 proceeds
/// without history rather than failing the query (§4.10 degradation path).
pub const NO_SESSION: &str = "no-session";

/// C10. Redis-backed session log: a metadata hash per session, an ordered
/// list of JSON-encoded messages per session, and a sorted set per user
/// scored by last-activity epoch seconds.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, user_id: &str, first_message: Option<&str>) -> Result<String, ApiError>;
    async fn append(&self, session_id: &str, message: Message) -> Result<(), ApiError>;
    /// Returns the last `limit` messages oldest-to-newest.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError>;
    async fn list_sessions(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<SessionMeta>, ApiError>;
    async fn delete(&self, session_id: &str, user_id: &str) -> Result<(), ApiError>;
    async fn touch(&self, session_id: &str) -> Result<(), ApiError>;
    /// Returns the owning user-id, or `None` if the session does not exist
    /// (or has expired). Used by the history/session handlers to tell a
    /// missing session apart from one owned by someone else.
    async fn owner(&self, session_id: &str) -> Result<Option<String>, ApiError>;
    /// Cheap liveness probe for `/readiness`; does not imply history is retained.
    async fn ping(&self) -> Result<(), ApiError>;
}

pub struct RedisSessionStore {
    pool: Pool,
    ttl_seconds: i64,
}

impl RedisSessionStore {
    pub fn new(cfg: &SessionConfig, redis_url: &str, pool_max_size: usize) -> Result<Self, ApiError> {
        let mut redis_cfg = Config::from_url(redis_url);
        redis_cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_max_size));
        let pool = redis_cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, false, e.to_string()))?;

        Ok(Self {
            pool,
            ttl_seconds: cfg.ttl_days * 60 * 60 * 24,
        })
    }

    fn session_key(session_id: &str) -> String {
        format!("chat:session:{session_id}")
    }

    fn messages_key(session_id: &str) -> String {
        format!("chat:session:{session_id}:messages")
    }

    fn user_sessions_key(user_id: &str) -> String {
        format!("chat:user:{user_id}:sessions")
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, ApiError> {
        self.pool
            .get()
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_session(&self, user_id: &str, first_message: Option<&str>) -> Result<String, ApiError> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let title = first_message
            .map(crate::models::session::derive_title)
            .unwrap_or_default();

        let mut conn = self.conn().await?;
        let session_key = Self::session_key(&session_id);

        let _: () = conn
            .hset_multiple(
                &session_key,
                &[
                    ("user_id", user_id.to_string()),
                    ("created_at", now.to_rfc3339()),
                    ("last_activity_at", now.to_rfc3339()),
                    ("title", title),
                    ("message_count", "0".to_string()),
                ],
            )
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        let _: () = conn
            .expire(&session_key, self.ttl_seconds)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        let _: () = conn
            .zadd(Self::user_sessions_key(user_id), &session_id, now.timestamp())
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        Ok(session_id)
    }

    async fn append(&self, session_id: &str, message: Message) -> Result<(), ApiError> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| ApiError::Internal(format!("failed to serialize message: {e}")))?;

        let mut conn = self.conn().await?;
        let session_key = Self::session_key(session_id);
        let messages_key = Self::messages_key(session_id);
        let now = Utc::now();

        let user_id: Option<String> = conn
            .hget(&session_key, "user_id")
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        let _: () = conn
            .rpush(&messages_key, payload)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        let _: () = conn
            .hincr(&session_key, "message_count", 1)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        let _: () = conn
            .hset(&session_key, "last_activity_at", now.to_rfc3339())
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        let _: () = conn
            .expire(&session_key, self.ttl_seconds)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        let _: () = conn
            .expire(&messages_key, self.ttl_seconds)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        if let Some(user_id) = user_id {
            let _: () = conn
                .zadd(Self::user_sessions_key(&user_id), session_id, now.timestamp())
                .await
                .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        }

        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        let mut conn = self.conn().await?;
        let messages_key = Self::messages_key(session_id);
        let start = -(limit as isize);

        let raw: Vec<String> = conn
            .lrange(&messages_key, start, -1)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        raw.into_iter()
            .map(|s| serde_json::from_str(&s).map_err(|e| ApiError::Internal(format!("corrupt session message: {e}"))))
            .collect()
    }

    async fn list_sessions(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<SessionMeta>, ApiError> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn
            .zrevrange(
                Self::user_sessions_key(user_id),
                offset as isize,
                (offset + limit).saturating_sub(1) as isize,
            )
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let session_key = Self::session_key(&id);
            let fields: Vec<(String, String)> = conn
                .hgetall(&session_key)
                .await
                .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
            if fields.is_empty() {
                continue; // expired between zset read and hash read
            }
            out.push(session_meta_from_fields(id, fields)?);
        }
        Ok(out)
    }

    async fn delete(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .del(Self::session_key(session_id))
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        let _: () = conn
            .del(Self::messages_key(session_id))
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        let _: () = conn
            .zrem(Self::user_sessions_key(user_id), session_id)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> Result<(), ApiError> {
        let mut conn = self.conn().await?;
        let session_key = Self::session_key(session_id);
        let now = Utc::now();

        let user_id: Option<String> = conn
            .hget(&session_key, "user_id")
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        let _: () = conn
            .hset(&session_key, "last_activity_at", now.to_rfc3339())
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        let _: () = conn
            .expire(&session_key, self.ttl_seconds)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;

        if let Some(user_id) = user_id {
            let _: () = conn
                .zadd(Self::user_sessions_key(&user_id), session_id, now.timestamp())
                .await
                .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        }
        Ok(())
    }

    async fn owner(&self, session_id: &str) -> Result<Option<String>, ApiError> {
        let mut conn = self.conn().await?;
        let user_id: Option<String> = conn
            .hget(Self::session_key(session_id), "user_id")
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        Ok(user_id)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let mut conn = self.conn().await?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ApiError::dependency(Dependency::SessionStore, true, e.to_string()))?;
        Ok(())
    }
}

fn session_meta_from_fields(session_id: String, fields: Vec<(String, String)>) -> Result<SessionMeta, ApiError> {
    let mut title = String::new();
    let mut last_activity_at = Utc::now();
    let mut message_count = 0u64;
    let mut created_at = Utc::now();
    let mut user_id = String::new();

    for (k, v) in fields {
        match k.as_str() {
            "title" => title = v,
            "message_count" => message_count = v.parse().unwrap_or(0),
            "last_activity_at" => {
                last_activity_at = chrono::DateTime::parse_from_rfc3339(&v)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
            }
            "created_at" => {
                created_at = chrono::DateTime::parse_from_rfc3339(&v)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
            }
            "user_id" => user_id = v,
            _ => {}
        }
    }
    let _ = user_id;
    let _ = created_at;

    Ok(SessionMeta {
        session_id,
        title,
        last_activity_at,
        message_count,
    })
}

/// In-memory degradation stand-in used when Redis is unreachable; every
/// session collapses to [`NO_SESSION`] and history is never retained, per
/// the §4.10 degradation clause.
pub struct NullSessionStore;

#[async_trait::async_trait]
impl SessionStore for NullSessionStore {
    async fn create_session(&self, _user_id: &str, _first_message: Option<&str>) -> Result<String, ApiError> {
        tracing::warn!("session store unavailable; issuing no-session sentinel");
        Ok(NO_SESSION.to_string())
    }

    async fn append(&self, _session_id: &str, _message: Message) -> Result<(), ApiError> {
        Ok(())
    }

    async fn recent(&self, _session_id: &str, _limit: usize) -> Result<Vec<Message>, ApiError> {
        Ok(Vec::new())
    }

    async fn list_sessions(&self, _user_id: &str, _limit: usize, _offset: usize) -> Result<Vec<SessionMeta>, ApiError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _session_id: &str, _user_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn touch(&self, _session_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn owner(&self, _session_id: &str) -> Result<Option<String>, ApiError> {
        Ok(None)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        Err(ApiError::dependency(Dependency::SessionStore, true, "session store degraded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_store_returns_no_session_sentinel() {
        let store = NullSessionStore;
        let id = store.create_session("u1", None).await.unwrap();
        assert_eq!(id, NO_SESSION);
        assert!(store.recent(&id, 6).await.unwrap().is_empty());
    }
}
