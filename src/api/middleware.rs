//! Request authorization
//!
//! Every protected route runs the same linear pipeline before its handler:
//!
//! 1. extract the credential (bearer header and/or session cookie),
//! 2. verify its signature through the token codec (and the csrf header
//!    on unsafe methods when enforced),
//! 3. check liveness: not expired, and the user's session still holds it,
//! 4. check the route's roles,
//! 5. hand the verified [`Claims`] to the handler via request extensions.
//!
//! Steps 1-3 fail with 401 and one generic message, step 4 with 403.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};

use crate::{
    clock::Clock,
    config::{AuthConfig, CredentialSource, CsrfMode},
    error::{AppError, AppResult},
    metrics::Metrics,
    models::claims::{Claims, Role},
    services::{sessions::SessionStore, token::TokenCodec},
};

/// Where credentials are read from and whether csrf is enforced
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    pub source: CredentialSource,
    pub csrf: CsrfMode,
    pub session_cookie: String,
    pub csrf_header: String,
}

impl From<&AuthConfig> for CredentialPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            source: config.credential_source,
            csrf: config.csrf,
            session_cookie: config.session_cookie.clone(),
            csrf_header: config.csrf_header.clone(),
        }
    }
}

pub struct Authorizer {
    codec: Arc<TokenCodec>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn Metrics>,
    policy: CredentialPolicy,
}

impl Authorizer {
    pub fn new(
        codec: Arc<TokenCodec>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn Metrics>,
        policy: CredentialPolicy,
    ) -> Self {
        Self {
            codec,
            sessions,
            clock,
            metrics,
            policy,
        }
    }

    /// Run the whole pipeline. An empty `required` admits any live principal.
    pub async fn authorize(&self, headers: &HeaderMap, method: &Method, required: &[Role]) -> AppResult<Claims> {
        let claims = match self.authenticate(headers, method).await {
            Ok(claims) => claims,
            Err(err) => {
                if matches!(err, AppError::Authentication(_)) {
                    self.metrics.increment("auth.rejected.unauthorized");
                }
                return Err(err);
            }
        };

        if !required.is_empty() && !claims.has_role(required) {
            self.metrics.increment("auth.rejected.forbidden");
            tracing::warn!(user_id = %claims.subject, ?required, "Insufficient role");
            return Err(AppError::Authorization(
                "You don't have the authorization for that action".to_string(),
            ));
        }

        Ok(claims)
    }

    async fn authenticate(&self, headers: &HeaderMap, method: &Method) -> AppResult<Claims> {
        let token = self.extract(headers).ok_or_else(|| {
            tracing::debug!("No credential presented");
            AppError::unauthorized()
        })?;

        let claims = self.codec.parse_claims(&token).await.map_err(|e| {
            tracing::warn!(error = %e, "Token rejected");
            AppError::unauthorized()
        })?;

        self.check_csrf(headers, method, &claims)?;

        let now = self.clock.now();
        if claims.is_expired(now) {
            tracing::debug!(user_id = %claims.subject, "Token expired");
            return Err(AppError::unauthorized());
        }

        let live = self
            .sessions
            .get(&claims.subject, now)
            .await?
            .is_some_and(|session| session.admits(&claims));
        if !live {
            tracing::debug!(user_id = %claims.subject, "Session expired or revoked");
            return Err(AppError::unauthorized());
        }

        Ok(claims)
    }

    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let from_header = || {
            headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| auth.token().to_string())
        };
        let from_cookie = || {
            CookieJar::from_headers(headers)
                .get(&self.policy.session_cookie)
                .map(|cookie| cookie.value().to_string())
        };

        let token = match self.policy.source {
            CredentialSource::Header => from_header(),
            CredentialSource::Cookie => from_cookie(),
            CredentialSource::Either => from_header().or_else(from_cookie),
        };

        token.filter(|t| !t.is_empty())
    }

    /// Double-submit check on state-changing methods
    fn check_csrf(&self, headers: &HeaderMap, method: &Method, claims: &Claims) -> AppResult<()> {
        if self.policy.csrf == CsrfMode::Disabled || method.is_safe() {
            return Ok(());
        }

        let presented = headers
            .get(self.policy.csrf_header.as_str())
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if claims.csrf_token.is_empty() || presented != claims.csrf_token {
            tracing::warn!(user_id = %claims.subject, "Csrf check failed");
            return Err(AppError::unauthorized());
        }

        Ok(())
    }
}

/// Per-route-group gate: the authorizer plus the roles the group requires
#[derive(Clone)]
pub struct RouteGate {
    authorizer: Arc<Authorizer>,
    roles: &'static [Role],
}

impl RouteGate {
    pub fn new(authorizer: Arc<Authorizer>, roles: &'static [Role]) -> Self {
        Self { authorizer, roles }
    }

    /// Any live principal
    pub fn authenticated(authorizer: Arc<Authorizer>) -> Self {
        Self::new(authorizer, &[])
    }
}

/// Middleware function for `axum::middleware::from_fn_with_state`
pub async fn require(State(gate): State<RouteGate>, mut request: Request, next: Next) -> AppResult<Response> {
    let claims = gate
        .authorizer
        .authorize(request.headers(), request.method(), gate.roles)
        .await?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
