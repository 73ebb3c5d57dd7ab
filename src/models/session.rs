//! Server-side login state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claims::Claims;

/// The single live session of a user.
///
/// `token` is a label identifying this login, not the credential itself;
/// the signed claims token stays with the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub token: String,
    pub claims: Claims,
    pub expiry: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }

    /// A token belongs to this session only if it carries the same csrf binding
    pub fn admits(&self, claims: &Claims) -> bool {
        self.user_id == claims.subject && self.claims.csrf_token == claims.csrf_token
    }
}
