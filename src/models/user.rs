//! User model and related types

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::claims::{parse_roles, Role};

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    user_id: Uuid,
    name: String,
    email: String,
    roles: Vec<String>,
    password_hash: String,
    date_created: DateTime<Utc>,
    date_updated: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.user_id,
            name: row.name,
            email: row.email,
            roles: parse_roles(&row.roles),
            password_hash: row.password_hash,
            date_created: row.date_created,
            date_updated: row.date_updated,
        }
    }
}

/// Someone with access to the library
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: BTreeSet<Role>,
    /// Argon2 PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "At least one role is required"))]
    pub roles: Vec<Role>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

/// Update user request; absent fields are left untouched
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "At least one role is required"))]
    pub roles: Option<Vec<Role>>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl UpdateUser {
    /// Whether applying the update changes what the user's tokens grant
    pub fn changes_credentials(&self) -> bool {
        self.roles.is_some() || self.password.is_some()
    }
}

pub fn role_names(roles: &BTreeSet<Role>) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(roles: Vec<Role>) -> CreateUser {
        CreateUser {
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            roles,
            password: "library-card".to_string(),
            password_confirm: "library-card".to_string(),
        }
    }

    #[test]
    fn test_new_users_need_a_role() {
        assert!(create(vec![Role::User]).validate().is_ok());
        assert!(create(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_role_updates_cannot_clear_roles() {
        let cleared = UpdateUser {
            roles: Some(Vec::new()),
            ..Default::default()
        };
        assert!(cleared.validate().is_err());

        let untouched = UpdateUser {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(untouched.validate().is_ok());
    }

    #[test]
    fn test_credential_changes() {
        assert!(!UpdateUser {
            name: Some("Renamed".to_string()),
            email: Some("renamed@example.com".to_string()),
            ..Default::default()
        }
        .changes_credentials());

        assert!(UpdateUser {
            roles: Some(vec![Role::User]),
            ..Default::default()
        }
        .changes_credentials());

        assert!(UpdateUser {
            password: Some("new-library-card".to_string()),
            password_confirm: Some("new-library-card".to_string()),
            ..Default::default()
        }
        .changes_credentials());
    }
}
