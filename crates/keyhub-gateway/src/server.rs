//! HTTP server implementation using Axum.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use keyhub_core::config::KeyHubConfig;
use keyhub_core::error::{KeyHubError, Result};
use keyhub_core::traits::Mailer;
use keyhub_platform::{LicenseDb, TokenIssuer};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::guard::require_admin;
use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<LicenseDb>>,
    pub config: Arc<KeyHubConfig>,
    pub tokens: TokenIssuer,
    pub mailer: Arc<dyn Mailer>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// The config's JWT secret must already be resolved (non-empty).
    pub fn new(db: LicenseDb, config: KeyHubConfig, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenIssuer::new(config.auth.jwt_secret.clone(), config.auth.token_ttl_hours);
        Self {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
            tokens,
            mailer,
            start_time: std::time::Instant::now(),
        }
    }

    /// Run `f` against the database on the blocking pool.
    ///
    /// The lock is taken and released inside the blocking task, so it is never
    /// held across an `.await`.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LicenseDb) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| KeyHubError::storage("database lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| KeyHubError::storage(format!("database task failed: {e}")))?
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let admin = Router::new()
        .route("/api/admin/licenses", get(routes::list_licenses).post(routes::create_license))
        .route("/api/admin/users", get(routes::list_users).delete(routes::delete_user))
        .route("/api/admin/clients", get(routes::list_clients).post(routes::create_client))
        .route("/api/admin/clients/status", put(routes::set_client_status))
        .route("/api/admin/events", get(routes::recent_events))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/register", post(routes::register))
        .route("/api/login", post(routes::login))
        .route("/api/licenses/activate", post(routes::activate))
        .route("/api/licenses/status", get(routes::license_status))
        .merge(admin)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Fill in an empty JWT secret with a random one for this process.
pub fn resolve_jwt_secret(config: &mut KeyHubConfig) {
    if config.auth.jwt_secret.is_empty() {
        tracing::warn!("auth.jwt_secret not set; generated a random one, login tokens will not survive a restart");
        config.auth.jwt_secret = keyhub_core::keygen::random_secret();
    }
}

/// Start the HTTP server.
pub async fn start(mut config: KeyHubConfig) -> anyhow::Result<()> {
    resolve_jwt_secret(&mut config);

    let db = LicenseDb::open(&config.database.path)?;
    tracing::info!("📦 License database at {}", config.database.path.display());

    let mailer = keyhub_channels::mailer_from_config(&config.smtp, &config.licensing.product_name)?;
    tracing::info!("✉️  Mailer: {}", mailer.name());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(AppState::new(db, config, mailer));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 KeyHub server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
