//! API endpoints module

pub mod auth;
pub mod stats;
pub mod torrents;

pub use auth::{login_handler, logout_handler, me_handler, register_handler, LoginResponse};
pub use stats::{get_settings, get_stats, health};
pub use torrents::{
    add_magnet, delete_torrent, get_torrent, list_torrents, recent_torrents, upload_torrent,
    AddTorrentResponse, MagnetRequest, RemoveTorrentResponse,
};
