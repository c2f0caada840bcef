use crate::{auth::Claims, state::AppState};
use axum::{extract::State, Extension, Json};
use seedkeeper_core::{ClientSettings, StatsReport};

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<StatsReport> {
    Json(state.control.stats(&claims.viewer()).await)
}

pub async fn get_settings(State(state): State<AppState>) -> Json<ClientSettings> {
    Json(state.control.settings())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "seedkeeper",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
