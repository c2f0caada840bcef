//! Axum server setup

use crate::{
    api,
    auth::{require_auth, UserStore},
    state::AppState,
    ws, AuthConfig, ServerConfig,
};
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use seedkeeper_core::Control;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Build the full router for `state`
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(api::me_handler))
        .route("/api/torrents", get(api::list_torrents))
        .route("/api/torrents/recent", get(api::recent_torrents))
        .route(
            "/api/torrents/upload",
            post(api::upload_torrent).layer(DefaultBodyLimit::max(config.upload_limit_bytes)),
        )
        .route("/api/torrents/magnet", post(api::add_magnet))
        .route(
            "/api/torrents/:id",
            get(api::get_torrent).delete(api::delete_torrent),
        )
        .route("/api/stats", get(api::get_stats))
        .route("/api/settings", get(api::get_settings))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Auth endpoints
        .route("/api/auth/login", post(api::login_handler))
        .route("/api/auth/logout", post(api::logout_handler))
        .route("/api/auth/register", post(api::register_handler))
        // WebSocket checks its own cookie before upgrading
        .route("/ws/events", get(ws::ws_handler))
        .route("/api/health", get(api::health))
        .merge(protected)
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                "Seedkeeper - API available at /api/*",
            )
        })
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until Ctrl-C, then stop the sampler and release every
/// engine handle
pub async fn run_server(
    config: ServerConfig,
    auth: AuthConfig,
    control: Control,
) -> anyhow::Result<()> {
    tracing::info!("Starting Seedkeeper v{}", env!("CARGO_PKG_VERSION"));

    let users = UserStore::new();
    users
        .ensure_admin(&auth.admin_username, &auth.admin_password)
        .context("Failed to seed admin account")?;

    let state = AppState::new(control.clone(), users, auth.settings());
    let shutdown = state.shutdown.clone();

    let sampler = control.spawn_sampler(shutdown.child_token());
    tracing::info!("Sampler spawned");

    let app = build_router(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Seedkeeper listening on http://{}", addr);
    tracing::info!("   Health: http://{}/api/health", addr);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = sampler.await {
        tracing::error!("Sampler task failed: {}", e);
    }
    let released = control.shutdown().await;
    tracing::info!(released, "Seedkeeper stopped");
    Ok(())
}
