//! Authentication and user management service

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::BootstrapConfig,
    error::{AppError, AppResult},
    models::{
        claims::{Claims, Role},
        user::{CreateUser, UpdateUser, User},
    },
    repository::Repository,
    services::auth::{AuthService, IssuedToken},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    auth: AuthService,
}

impl UsersService {
    pub fn new(repository: Repository, auth: AuthService) -> Self {
        Self { repository, auth }
    }

    /// Check email and password, returning the claims of the matching user
    pub async fn authenticate(&self, email: &str, password: &str, now: DateTime<Utc>) -> AppResult<Claims> {
        let found = self.repository.users.get_by_email(email).await?;
        let user = check_credentials(found, password)?;
        Ok(self.auth.claims_for(&user, now))
    }

    /// Authenticate and open a session
    pub async fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        let claims = self.authenticate(email, password, now).await?;
        self.auth.open_session(claims, now).await
    }

    pub async fn refresh(&self, claims: &Claims, now: DateTime<Utc>) -> AppResult<IssuedToken> {
        self.auth.refresh(claims, now).await
    }

    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.auth.logout(user_id).await
    }

    /// Revoke someone else's session
    pub async fn revoke(&self, claims: &Claims, user_id: Uuid) -> AppResult<()> {
        claims.require_admin()?;
        self.repository.users.get_by_id(user_id).await?;
        self.auth.logout(&user_id.to_string()).await
    }

    pub async fn me(&self, claims: &Claims) -> AppResult<User> {
        self.repository.users.get_by_id(claims.user_id()?).await
    }

    pub async fn list_users(&self, claims: &Claims) -> AppResult<Vec<User>> {
        claims.require_admin()?;
        self.repository.users.list().await
    }

    pub async fn get_user(&self, claims: &Claims, id: Uuid) -> AppResult<User> {
        claims.require_self_or_admin(&id)?;
        self.repository.users.get_by_id(id).await
    }

    pub async fn create_user(&self, claims: &Claims, user: CreateUser, now: DateTime<Utc>) -> AppResult<User> {
        claims.require_admin()?;
        check_confirmation(&user.password, &user.password_confirm)?;

        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        let created = self
            .repository
            .users
            .create(&User {
                id: Uuid::new_v4(),
                name: user.name,
                email: user.email,
                roles: user.roles.into_iter().collect(),
                password_hash: hash_password(&user.password)?,
                date_created: now,
                date_updated: now,
            })
            .await?;

        tracing::info!(user_id = %created.id, "User created");
        Ok(created)
    }

    /// Users may edit themselves; only admins may change roles or edit others.
    ///
    /// New roles or a new password end the user's session, so tokens carrying
    /// the old grants cannot be refreshed.
    pub async fn update_user(
        &self,
        claims: &Claims,
        id: Uuid,
        update: UpdateUser,
        now: DateTime<Utc>,
    ) -> AppResult<User> {
        claims.require_self_or_admin(&id)?;
        if update.roles.is_some() {
            claims.require_admin()?;
        }
        let revoke = update.changes_credentials();

        let mut user = self.repository.users.get_by_id(id).await?;

        if let Some(email) = update.email {
            if self.repository.users.email_exists(&email, Some(id)).await? {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
            user.email = email;
        }
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(roles) = update.roles {
            user.roles = roles.into_iter().collect();
        }
        if let Some(password) = update.password {
            check_confirmation(&password, update.password_confirm.as_deref().unwrap_or_default())?;
            user.password_hash = hash_password(&password)?;
        }
        user.date_updated = now;

        let updated = self.repository.users.update(&user).await?;
        if revoke {
            self.auth.logout(&id.to_string()).await?;
        }
        Ok(updated)
    }

    /// Delete the account and its session
    pub async fn delete_user(&self, claims: &Claims, id: Uuid) -> AppResult<()> {
        claims.require_admin()?;
        self.repository.users.delete(id).await?;
        self.auth.logout(&id.to_string()).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Create the configured admin account when the database has none
    pub async fn ensure_bootstrap_admin(&self, config: &BootstrapConfig, now: DateTime<Utc>) -> AppResult<()> {
        let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
            return Ok(());
        };

        if self.repository.users.count_admins().await? > 0 {
            return Ok(());
        }

        let admin = self
            .repository
            .users
            .create(&User {
                id: Uuid::new_v4(),
                name: config.admin_name.clone().unwrap_or_else(|| "Administrator".to_string()),
                email: email.clone(),
                roles: [Role::Admin, Role::User].into_iter().collect(),
                password_hash: hash_password(password)?,
                date_created: now,
                date_updated: now,
            })
            .await?;

        tracing::info!(user_id = %admin.id, email = %admin.email, "Bootstrap admin created");
        Ok(())
    }
}

/// Hash a password with Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// The user behind a login attempt, when the password matches and they hold a role
fn check_credentials(user: Option<User>, password: &str) -> AppResult<User> {
    let invalid = || AppError::Authentication(INVALID_CREDENTIALS.to_string());

    let Some(user) = user else {
        // Same argon2 cost as a real check.
        verify_password(unknown_user_hash(), password);
        tracing::warn!("Authentication failed: unknown email");
        return Err(invalid());
    };

    if !verify_password(&user.password_hash, password) {
        tracing::warn!(user_id = %user.id, "Authentication failed: wrong password");
        return Err(invalid());
    }

    if user.roles.is_empty() {
        tracing::warn!(user_id = %user.id, "Authentication failed: no roles");
        return Err(invalid());
    }

    Ok(user)
}

fn unknown_user_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("no such user").unwrap_or_default())
}

/// An unparsable stored hash never matches
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn check_confirmation(password: &str, confirm: &str) -> AppResult<()> {
    if password != confirm {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}
