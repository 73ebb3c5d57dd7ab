//! Session persistence: one live record per user
//!
//! Two backends share the [`SessionStore`] contract: Redis for deployments
//! with several server instances, and an in-process map for development and
//! tests. Both apply each write atomically, so concurrent writes for one user
//! are ordered by arrival. A refresh only lands on the login it was issued
//! for: it never recreates a session that a logout removed, and never
//! overwrites a newer login.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script, SetExpiry, SetOptions};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{claims::Claims, session::SessionRecord},
};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create or replace the session of `user_id`
    async fn put(&self, user_id: &str, claims: &Claims, expiry: DateTime<Utc>) -> AppResult<SessionRecord>;

    /// Replace claims and expiry of the session `claims` were issued for.
    ///
    /// `None` when that session is gone or a newer login has replaced it.
    async fn refresh(
        &self,
        user_id: &str,
        claims: &Claims,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<SessionRecord>>;

    /// Live session of `user_id`, if any
    async fn get(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Option<SessionRecord>>;

    /// Remove the session; removing an absent session is not an error
    async fn delete(&self, user_id: &str) -> AppResult<()>;

    async fn is_logged_out(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self.get(user_id, now).await?.is_none())
    }
}

/// Random label naming one login
pub fn new_session_label() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(Sha256::digest(bytes))
}

fn session_key(user_id: &str) -> String {
    format!("session:{}", user_id)
}

// Swap the record only if it is still byte-for-byte the one that was read.
const COMPARE_AND_SET: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'EXAT', ARGV[3])
    return 1
end
return 0
"#;

/// Redis-backed sessions; records expire server-side at their expiry instant
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
    compare_and_set: Arc<Script>,
}

impl RedisSessionStore {
    /// Connect and check the server answers
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Configuration(format!("Failed to create Redis client: {}", e)))?;

        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await
            .map_err(|e| AppError::Storage(format!("Redis connection test failed: {}", e)))?;

        Ok(Self {
            connection,
            compare_and_set: Arc::new(Script::new(COMPARE_AND_SET)),
        })
    }

    fn encode(record: &SessionRecord) -> AppResult<String> {
        serde_json::to_string(record)
            .map_err(|e| AppError::Internal(format!("Failed to serialize session: {}", e)))
    }

    fn expire_at(expiry: DateTime<Utc>) -> SetExpiry {
        SetExpiry::EXAT(Self::expiry_seconds(expiry))
    }

    fn expiry_seconds(expiry: DateTime<Utc>) -> usize {
        expiry.timestamp().max(1) as usize
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, user_id: &str, claims: &Claims, expiry: DateTime<Utc>) -> AppResult<SessionRecord> {
        let record = SessionRecord {
            user_id: user_id.to_string(),
            token: new_session_label(),
            claims: claims.clone(),
            expiry,
        };

        let mut conn = self.connection.clone();
        let options = SetOptions::default().with_expiration(Self::expire_at(expiry));
        conn.set_options::<_, _, ()>(session_key(user_id), Self::encode(&record)?, options)
            .await?;

        Ok(record)
    }

    async fn refresh(
        &self,
        user_id: &str,
        claims: &Claims,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<SessionRecord>> {
        let mut conn = self.connection.clone();
        let key = session_key(user_id);

        let stored: Option<String> = conn.get(&key).await?;
        let Some(stored) = stored else {
            return Ok(None);
        };
        let current: SessionRecord = serde_json::from_str(&stored)
            .map_err(|e| AppError::Storage(format!("Corrupted session for {}: {}", user_id, e)))?;
        if !current.admits(claims) {
            return Ok(None);
        }

        let record = SessionRecord {
            claims: claims.clone(),
            expiry,
            ..current
        };

        // A logout or a newer login landing between the read and this write wins.
        let swapped: i64 = self
            .compare_and_set
            .key(&key)
            .arg(&stored)
            .arg(Self::encode(&record)?)
            .arg(Self::expiry_seconds(expiry))
            .invoke_async(&mut conn)
            .await?;

        Ok((swapped == 1).then_some(record))
    }

    async fn get(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Option<SessionRecord>> {
        let mut conn = self.connection.clone();
        let stored: Option<String> = conn.get(session_key(user_id)).await?;

        let record = match stored {
            Some(json) => serde_json::from_str::<SessionRecord>(&json)
                .map_err(|e| AppError::Storage(format!("Corrupted session for {}: {}", user_id, e)))?,
            None => return Ok(None),
        };

        Ok(record.is_live(now).then_some(record))
    }

    async fn delete(&self, user_id: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(session_key(user_id)).await?;
        Ok(())
    }
}

/// In-process sessions for a single server instance
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, user_id: &str, claims: &Claims, expiry: DateTime<Utc>) -> AppResult<SessionRecord> {
        let record = SessionRecord {
            user_id: user_id.to_string(),
            token: new_session_label(),
            claims: claims.clone(),
            expiry,
        };
        self.sessions
            .write()
            .await
            .insert(user_id.to_string(), record.clone());
        Ok(record)
    }

    async fn refresh(
        &self,
        user_id: &str,
        claims: &Claims,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<SessionRecord>> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .get_mut(user_id)
            .filter(|record| record.admits(claims))
            .map(|record| {
                record.claims = claims.clone();
                record.expiry = expiry;
                record.clone()
            }))
    }

    async fn get(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Option<SessionRecord>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(user_id) {
                None => return Ok(None),
                Some(record) if record.is_live(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(user_id).is_some_and(|record| !record.is_live(now)) {
            sessions.remove(user_id);
        }
        Ok(None)
    }

    async fn delete(&self, user_id: &str) -> AppResult<()> {
        self.sessions.write().await.remove(user_id);
        Ok(())
    }
}
