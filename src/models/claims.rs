//! Claims carried inside every signed token

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Role names granted to a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Parse stored role names, dropping the ones this server does not know
pub fn parse_roles<S: AsRef<str>>(names: &[S]) -> BTreeSet<Role> {
    names.iter().filter_map(|n| n.as_ref().parse().ok()).collect()
}

/// Identity and authorization payload of a token.
///
/// Claims are never mutated once issued; [`Claims::renewed`] builds a new
/// value with a fresh validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub roles: BTreeSet<Role>,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "csrf", default)]
    pub csrf_token: String,
}

impl Claims {
    /// Build claims valid from `now` for `ttl` (at least one second)
    pub fn new(
        subject: impl Into<String>,
        roles: BTreeSet<Role>,
        now: DateTime<Utc>,
        ttl: Duration,
        csrf_token: impl Into<String>,
    ) -> Self {
        let ttl = ttl.max(Duration::seconds(1));
        Self {
            subject: subject.into(),
            roles,
            issued_at: now.timestamp(),
            expires_at: (now + ttl).timestamp(),
            csrf_token: csrf_token.into(),
        }
    }

    /// True iff at least one of `required` is held
    pub fn has_role(&self, required: &[Role]) -> bool {
        required.iter().any(|role| self.roles.contains(role))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }

    /// Same identity and csrf binding, new validity window
    pub fn renewed(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::new(
            self.subject.clone(),
            self.roles.clone(),
            now,
            ttl,
            self.csrf_token.clone(),
        )
    }

    pub fn expires_at_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.subject).map_err(|_| AppError::unauthorized())
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    // Authorization checks
    pub fn require_role(&self, required: &[Role]) -> AppResult<()> {
        if self.has_role(required) {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You don't have the authorization for that action".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        self.require_role(&[Role::Admin])
    }

    /// Admins may act on anyone, other principals only on themselves
    pub fn require_self_or_admin(&self, user_id: &Uuid) -> AppResult<()> {
        if self.is_admin() || self.subject == user_id.to_string() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Attempted action is not allowed".to_string(),
            ))
        }
    }
}
