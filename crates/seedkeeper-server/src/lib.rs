//! Seedkeeper Server
//!
//! HTTP API and WebSocket telemetry for the Seedkeeper control plane.
//! Built with Axum, JWT cookie authentication and per-viewer push loops.

pub mod api;
pub mod auth;
pub mod error;
pub mod state;
pub mod ws;

pub mod server;

pub use error::{WebError, WebResult};
pub use server::{build_router, run_server};
pub use state::AppState;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Body limit for torrent uploads
    pub upload_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            upload_limit_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,
    pub token_ttl_hours: i64,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "INSECURE_DEFAULT_CHANGE_ME_IN_PRODUCTION".to_string(),
            admin_username: DEFAULT_ADMIN_USERNAME.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            token_ttl_hours: 24,
            secure_cookies: false,
        }
    }
}

impl AuthConfig {
    pub fn settings(&self) -> auth::AuthSettings {
        auth::AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_hours: self.token_ttl_hours,
            secure_cookies: self.secure_cookies,
        }
    }
}

/// Start the API server and block until shutdown
pub async fn start_server(
    config: ServerConfig,
    auth: AuthConfig,
    control: seedkeeper_core::Control,
) -> anyhow::Result<()> {
    server::run_server(config, auth, control).await
}
