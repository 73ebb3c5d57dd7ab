//! Token lifecycle: login, refresh and logout
//!
//! A login signs a fresh set of claims and records them as the user's single
//! session. The token stays usable only while that session is live and still
//! carries the token's csrf binding, so logging out (or logging in again
//! elsewhere) revokes outstanding tokens before they expire.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::{
    error::{AppError, AppResult},
    metrics::Metrics,
    models::{claims::Claims, user::User},
    services::{sessions::SessionStore, token::TokenCodec},
};

/// Signed token plus the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Clone)]
pub struct AuthService {
    codec: Arc<TokenCodec>,
    sessions: Arc<dyn SessionStore>,
    metrics: Arc<dyn Metrics>,
    token_ttl: Duration,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        codec: Arc<TokenCodec>,
        sessions: Arc<dyn SessionStore>,
        metrics: Arc<dyn Metrics>,
        token_ttl: Duration,
        session_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            sessions,
            metrics,
            token_ttl,
            session_ttl,
        }
    }

    pub fn codec(&self) -> Arc<TokenCodec> {
        self.codec.clone()
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    /// Claims for a freshly authenticated user, with a new csrf binding
    pub fn claims_for(&self, user: &User, now: DateTime<Utc>) -> Claims {
        Claims::new(
            user.id.to_string(),
            user.roles.clone(),
            now,
            self.token_ttl,
            new_csrf_token(),
        )
    }

    /// Sign `claims` and make them the user's only session
    pub async fn open_session(&self, claims: Claims, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        if claims.roles.is_empty() {
            tracing::warn!(user_id = %claims.subject, "Session refused: no roles");
            return Err(AppError::unauthorized());
        }

        let token = self.codec.generate_token(&claims)?;
        self.sessions
            .put(&claims.subject, &claims, now + self.session_ttl)
            .await?;

        self.metrics.increment("auth.logins");
        tracing::info!(user_id = %claims.subject, "Session opened");

        Ok(IssuedToken { token, claims })
    }

    /// Re-issue a token for a live session and push its expiry forward
    pub async fn refresh(&self, claims: &Claims, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let live = self
            .sessions
            .get(&claims.subject, now)
            .await?
            .filter(|session| session.admits(claims));

        if live.is_none() {
            tracing::warn!(user_id = %claims.subject, "Refresh refused: no matching session");
            return Err(AppError::unauthorized());
        }

        let renewed = claims.renewed(now, self.token_ttl);
        let token = self.codec.generate_token(&renewed)?;

        // A logout or a newer login racing this refresh leaves nothing to update.
        self.sessions
            .refresh(&claims.subject, &renewed, now + self.session_ttl)
            .await?
            .ok_or_else(AppError::unauthorized)?;

        Ok(IssuedToken {
            token,
            claims: renewed,
        })
    }

    /// Drop the session of `user_id`; every token issued to it stops working
    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.sessions.delete(user_id).await?;
        self.metrics.increment("auth.logouts");
        tracing::info!(user_id = %user_id, "Session closed");
        Ok(())
    }
}

/// Random anti-forgery value bound to one login
pub fn new_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::RecordingMetrics,
        models::{claims::Role, session::SessionRecord},
        services::{
            sessions::MemorySessionStore,
            token::{decoding_key, encoding_key, KeyLookup, StaticKeyLookup},
        },
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use jsonwebtoken::Algorithm;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    const PRIVATE: &[u8] = include_bytes!("../../tests/fixtures/primary.pem");
    const PUBLIC: &[u8] = include_bytes!("../../tests/fixtures/primary.pub.pem");

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
    }

    fn codec() -> Arc<TokenCodec> {
        let keys: Arc<dyn KeyLookup> = Arc::new(
            StaticKeyLookup::new().with_key("primary", decoding_key(Algorithm::RS256, PUBLIC).unwrap()),
        );
        Arc::new(
            TokenCodec::new(
                Some(encoding_key(Algorithm::RS256, PRIVATE).unwrap()),
                "primary",
                Algorithm::RS256,
                Some(keys),
            )
            .unwrap(),
        )
    }

    fn service_with(sessions: Arc<dyn SessionStore>) -> AuthService {
        AuthService::new(
            codec(),
            sessions,
            Arc::new(RecordingMetrics::new()),
            Duration::minutes(60),
            Duration::hours(24),
        )
    }

    fn service() -> (AuthService, Arc<MemorySessionStore>) {
        let sessions = Arc::new(MemorySessionStore::new());
        (service_with(sessions.clone()), sessions)
    }

    /// Stores a queued login right after the next read
    #[derive(Default)]
    struct LoginAfterRead {
        inner: MemorySessionStore,
        pending: Mutex<Option<Claims>>,
    }

    #[async_trait]
    impl SessionStore for LoginAfterRead {
        async fn put(&self, user_id: &str, claims: &Claims, expiry: DateTime<Utc>) -> AppResult<SessionRecord> {
            self.inner.put(user_id, claims, expiry).await
        }

        async fn refresh(
            &self,
            user_id: &str,
            claims: &Claims,
            expiry: DateTime<Utc>,
        ) -> AppResult<Option<SessionRecord>> {
            self.inner.refresh(user_id, claims, expiry).await
        }

        async fn get(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Option<SessionRecord>> {
            let found = self.inner.get(user_id, now).await?;
            if let Some(claims) = self.pending.lock().await.take() {
                self.inner.put(&claims.subject, &claims, now + Duration::hours(24)).await?;
            }
            Ok(found)
        }

        async fn delete(&self, user_id: &str) -> AppResult<()> {
            self.inner.delete(user_id).await
        }
    }

    fn reader() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            roles: [Role::User].into_iter().collect(),
            password_hash: String::new(),
            date_created: now(),
            date_updated: now(),
        }
    }

    #[tokio::test]
    async fn test_open_session_issues_live_token() {
        let (auth, sessions) = service();
        let user = reader();

        let claims = auth.claims_for(&user, now());
        assert!(claims.has_role(&[Role::User]));
        assert!(!claims.is_expired(now()));
        assert!(!claims.csrf_token.is_empty());

        let issued = auth.open_session(claims.clone(), now()).await.unwrap();
        assert_eq!(auth.codec().parse_claims(&issued.token).await.unwrap(), claims);

        let session = sessions.get(&claims.subject, now()).await.unwrap().unwrap();
        assert!(session.admits(&claims));
        assert_eq!(session.expiry, now() + Duration::hours(24));
    }

    #[tokio::test]
    async fn test_second_login_supersedes_first() {
        let (auth, sessions) = service();
        let user = reader();

        let first = auth.open_session(auth.claims_for(&user, now()), now()).await.unwrap();
        let second = auth.open_session(auth.claims_for(&user, now()), now()).await.unwrap();
        assert_ne!(first.claims.csrf_token, second.claims.csrf_token);

        let session = sessions.get(&user.id.to_string(), now()).await.unwrap().unwrap();
        assert!(!session.admits(&first.claims));
        assert!(session.admits(&second.claims));

        let err = auth.refresh(&first.claims, now()).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_login_during_refresh_keeps_newer_session() {
        let sessions = Arc::new(LoginAfterRead::default());
        let auth = service_with(sessions.clone());
        let user = reader();

        let older = auth.open_session(auth.claims_for(&user, now()), now()).await.unwrap();
        let newer = auth.claims_for(&user, now());
        *sessions.pending.lock().await = Some(newer.clone());

        let err = auth.refresh(&older.claims, now()).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));

        let session = sessions.inner.get(&user.id.to_string(), now()).await.unwrap().unwrap();
        assert!(session.admits(&newer));
        assert!(!session.admits(&older.claims));
    }

    #[tokio::test]
    async fn test_session_without_roles_is_refused() {
        let (auth, sessions) = service();
        let mut user = reader();
        user.roles.clear();

        let err = auth.open_session(auth.claims_for(&user, now()), now()).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        assert!(sessions.is_logged_out(&user.id.to_string(), now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_extends_validity() {
        let (auth, sessions) = service();
        let user = reader();
        let issued = auth.open_session(auth.claims_for(&user, now()), now()).await.unwrap();

        let later = now() + Duration::minutes(45);
        let refreshed = auth.refresh(&issued.claims, later).await.unwrap();

        assert_eq!(refreshed.claims.subject, issued.claims.subject);
        assert_eq!(refreshed.claims.csrf_token, issued.claims.csrf_token);
        assert_eq!(refreshed.claims.issued_at, later.timestamp());
        assert!(refreshed.claims.expires_at > issued.claims.expires_at);

        let session = sessions.get(&user.id.to_string(), later).await.unwrap().unwrap();
        assert_eq!(session.expiry, later + Duration::hours(24));
        assert!(session.admits(&refreshed.claims));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_refused() {
        let (auth, sessions) = service();
        let user = reader();
        let issued = auth.open_session(auth.claims_for(&user, now()), now()).await.unwrap();

        auth.logout(&issued.claims.subject).await.unwrap();
        assert!(sessions.is_logged_out(&issued.claims.subject, now()).await.unwrap());

        let err = auth.refresh(&issued.claims, now()).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
        assert!(sessions.is_logged_out(&issued.claims.subject, now()).await.unwrap());

        // Logging out twice is fine.
        auth.logout(&issued.claims.subject).await.unwrap();
    }

    #[test]
    fn test_csrf_tokens_are_random_and_url_safe() {
        let a = new_csrf_token();
        let b = new_csrf_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
