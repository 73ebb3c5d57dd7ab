//! Business logic services

pub mod auth;
pub mod catalog;
pub mod loans;
pub mod sessions;
pub mod token;
pub mod users;

use std::sync::Arc;

use chrono::Duration;

use crate::{
    config::AppConfig,
    metrics::Metrics,
    repository::Repository,
    services::{sessions::SessionStore, token::TokenCodec},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub repository: Repository,
}

impl Services {
    /// Wire every service around one repository, token codec and session store
    pub fn new(
        config: &AppConfig,
        repository: Repository,
        codec: Arc<TokenCodec>,
        sessions: Arc<dyn SessionStore>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        let auth = auth::AuthService::new(
            codec,
            sessions,
            metrics.clone(),
            Duration::minutes(config.auth.token_ttl_minutes),
            Duration::hours(config.auth.session_ttl_hours),
        );

        Self {
            users: users::UsersService::new(repository.clone(), auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(
                Arc::new(repository.loans.clone()),
                metrics,
                Duration::days(config.loans.period_days.max(1)),
            ),
            auth,
            repository,
        }
    }
}
