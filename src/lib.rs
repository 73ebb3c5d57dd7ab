//! Book library server
//!
//! REST JSON API for a small lending library: users, books, categories and
//! loans, behind signed bearer tokens bound to a server-side session.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub authorizer: Arc<api::middleware::Authorizer>,
    pub clock: Arc<dyn clock::Clock>,
    pub metrics: Arc<dyn metrics::Metrics>,
}
