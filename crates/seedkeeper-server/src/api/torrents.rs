//! Torrent job endpoints
//!
//! Every handler resolves the caller to a core `Viewer` and lets the control
//! plane apply the ownership rules.

use crate::{
    auth::Claims,
    error::{WebError, WebResult},
    state::AppState,
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use seedkeeper_core::Job;
use serde::{Deserialize, Serialize};

const TORRENT_CONTENT_TYPE: &str = "application/x-bittorrent";

/// Response for a newly added torrent
#[derive(Debug, Serialize)]
pub struct AddTorrentResponse {
    pub message: String,
    pub torrent: Job,
}

/// Response for a removed torrent
#[derive(Debug, Serialize)]
pub struct RemoveTorrentResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MagnetRequest {
    #[serde(rename = "magnetUri", default)]
    pub magnet_uri: String,
}

pub async fn list_torrents(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<Vec<Job>> {
    Json(state.control.list_jobs(&claims.viewer()).await)
}

pub async fn recent_torrents(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<Vec<Job>> {
    Json(state.control.recent_jobs(&claims.viewer()).await)
}

pub async fn get_torrent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> WebResult<Json<Job>> {
    let job = state.control.get_job(&claims.viewer(), &id).await?;
    Ok(Json(job))
}

pub async fn delete_torrent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> WebResult<Json<RemoveTorrentResponse>> {
    let removed = state.control.remove_job(&claims.viewer(), &id).await?;
    Ok(Json(RemoveTorrentResponse {
        message: "Torrent removed successfully".to_string(),
        id: removed.id,
    }))
}

/// Upload handler: multipart field `torrent`, `.torrent` files only
pub async fn upload_torrent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> WebResult<(StatusCode, Json<AddTorrentResponse>)> {
    let mut blob: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("torrent") {
            continue;
        }

        let named_torrent = field
            .file_name()
            .map(|name| name.to_ascii_lowercase().ends_with(".torrent"))
            .unwrap_or(false);
        let typed_torrent = field.content_type() == Some(TORRENT_CONTENT_TYPE);
        if !named_torrent && !typed_torrent {
            return Err(WebError::BadRequest(
                "Only .torrent files are allowed".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebError::BadRequest(format!("Failed to read file: {}", e)))?;
        blob = Some(bytes.to_vec());
    }

    let blob = blob.ok_or_else(|| WebError::BadRequest("No torrent file uploaded".to_string()))?;
    let size = blob.len();
    let job = state.control.add_from_blob(&claims.viewer(), blob).await?;

    tracing::info!(
        job_id = %job.id,
        owner = %job.owner,
        bytes = size,
        "Torrent uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(AddTorrentResponse {
            message: "Torrent added successfully".to_string(),
            torrent: job,
        }),
    ))
}

pub async fn add_magnet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<MagnetRequest>,
) -> WebResult<(StatusCode, Json<AddTorrentResponse>)> {
    if request.magnet_uri.trim().is_empty() {
        return Err(WebError::BadRequest("Magnet URI is required".to_string()));
    }

    let job = state
        .control
        .add_from_identifier(&claims.viewer(), &request.magnet_uri)
        .await?;

    tracing::info!(job_id = %job.id, owner = %job.owner, "Magnet added");
    Ok((
        StatusCode::CREATED,
        Json(AddTorrentResponse {
            message: "Magnet link added successfully".to_string(),
            torrent: job,
        }),
    ))
}
