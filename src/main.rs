//! Book library server
//!
//! REST API server for a lending library.

use anyhow::Context;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use book_library_server::{
    api::{
        self,
        middleware::{require, Authorizer, CredentialPolicy, RouteGate},
    },
    clock::{Clock, SystemClock},
    config::{AppConfig, SessionBackend},
    metrics::{track_requests, Metrics, RecordingMetrics},
    models::claims::Role,
    repository::Repository,
    services::{
        sessions::{MemorySessionStore, RedisSessionStore, SessionStore},
        token::TokenCodec,
        Services,
    },
    AppState,
};

const MEMBERS: &[Role] = &[Role::User, Role::Admin];
const ADMINS: &[Role] = &[Role::Admin];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting book library server v{}", env!("CARGO_PKG_VERSION"));

    // Key material problems are fatal before anything else starts.
    let codec = Arc::new(TokenCodec::from_config(&config.auth).context("Invalid token configuration")?);
    tracing::info!(kid = codec.active_kid(), "Token signing key loaded");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let sessions: Arc<dyn SessionStore> = match config.auth.session_backend {
        SessionBackend::Redis => {
            let store = RedisSessionStore::new(&config.redis.url)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!("Sessions stored in Redis");
            Arc::new(store)
        }
        SessionBackend::Memory => {
            tracing::warn!("Sessions kept in memory; they do not survive restarts or span instances");
            Arc::new(MemorySessionStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics: Arc<dyn Metrics> = Arc::new(RecordingMetrics::new());

    let repository = Repository::new(pool);
    let services = Services::new(&config, repository, codec.clone(), sessions.clone(), metrics.clone());

    services
        .users
        .ensure_bootstrap_admin(&config.bootstrap, clock.now())
        .await
        .context("Failed to create bootstrap admin")?;

    let authorizer = Arc::new(Authorizer::new(
        codec,
        sessions,
        clock.clone(),
        metrics.clone(),
        CredentialPolicy::from(&config.auth),
    ));

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        authorizer,
        clock,
        metrics,
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("book_library_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let gate = |roles: &'static [Role]| {
        from_fn_with_state(RouteGate::new(state.authorizer.clone(), roles), require)
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        .route("/auth/token", post(api::auth::token));

    // Any live session
    let authenticated = Router::new()
        .route("/auth/refresh", post(api::auth::refresh))
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/me", get(api::auth::me))
        .route("/users/:id", get(api::users::get_user).put(api::users::update_user))
        .route("/books", get(api::books::list_books))
        .route("/books/:id", get(api::books::get_book))
        .route("/categories", get(api::categories::list_categories))
        .route("/categories/:id", get(api::categories::get_category))
        .route_layer(gate(&[]));

    let members = Router::new()
        .route("/loans", get(api::loans::list_loans).post(api::loans::start_loan))
        .route("/loans/:id", get(api::loans::get_loan).delete(api::loans::end_loan))
        .route_layer(gate(MEMBERS));

    let admins = Router::new()
        .route("/users", get(api::users::list_users).post(api::users::create_user))
        .route("/users/:id", delete(api::users::delete_user))
        .route("/users/:id/logout", post(api::users::revoke_session))
        .route("/books", post(api::books::create_book))
        .route(
            "/books/:id",
            put(api::books::update_book).delete(api::books::delete_book),
        )
        .route("/categories", post(api::categories::create_category))
        .route(
            "/categories/:id",
            put(api::categories::update_category).delete(api::categories::delete_category),
        )
        .route("/loans/:id", put(api::loans::update_loan))
        .route("/metrics", get(api::metrics::get_metrics))
        .route_layer(gate(ADMINS));

    let api_v1 = public
        .merge(authenticated)
        .merge(members)
        .merge(admins)
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(from_fn_with_state(state.metrics.clone(), track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
