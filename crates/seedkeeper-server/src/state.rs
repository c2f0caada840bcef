//! Shared application state

use seedkeeper_core::Control;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthSettings, UserStore};

/// State shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Job registry, ledger and engine behind one facade
    pub control: Control,

    pub users: Arc<UserStore>,

    pub auth: Arc<AuthSettings>,

    /// Fires on server shutdown; every WebSocket loop runs on a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(control: Control, users: UserStore, auth: AuthSettings) -> Self {
        Self {
            control,
            users: Arc::new(users),
            auth: Arc::new(auth),
            shutdown: CancellationToken::new(),
        }
    }
}
