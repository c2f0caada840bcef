//! Authentication and authorization
//!
//! JWT cookies with Argon2 password hashing. Accounts live in memory for the
//! life of the process; a default admin is seeded at startup.

pub mod middleware;
pub mod models;

pub use middleware::{
    clear_cookie, extract_jwt_from_cookies, generate_token, require_auth, session_cookie,
    validate_token, TOKEN_COOKIE,
};
pub use models::{Claims, LoginForm, User, UserInfo};

use seedkeeper_core::Role;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already exists: {0}")]
    UserExists(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Password hash error: {0}")]
    Hash(String),

    #[error("Invalid token: {0}")]
    Token(String),
}

/// Token signing settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub secure_cookies: bool,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
        Argon2,
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Volatile account store keyed by username
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, User>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, User>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an account. Usernames are unique.
    pub fn register(&self, username: &str, password: &str, role: Role) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }
        if self.read().contains_key(username) {
            return Err(AuthError::UserExists(username.to_string()));
        }

        // Hash outside the lock, then re-check on insert.
        let user = User::new(username.to_string(), password, role)?;
        let mut users = self.write();
        if users.contains_key(username) {
            return Err(AuthError::UserExists(username.to_string()));
        }
        users.insert(user.username.clone(), user.clone());
        tracing::info!(username = %user.username, role = %user.role, "Registered user");
        Ok(user)
    }

    pub fn authenticate(&self, login: &LoginForm) -> Result<User, AuthError> {
        let user = self
            .read()
            .get(login.username.trim())
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.verify_password(&login.password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn get_by_id(&self, id: &str) -> Option<User> {
        self.read().values().find(|user| user.id == id).cloned()
    }

    /// Seed the admin account if it does not exist yet
    pub fn ensure_admin(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if self.read().contains_key(username) {
            return Ok(());
        }
        self.register(username, password, Role::Admin)?;
        if password == crate::DEFAULT_ADMIN_PASSWORD {
            tracing::warn!(
                "Created default admin user (username: {}) with the default password - CHANGE THIS PASSWORD!",
                username
            );
        }
        Ok(())
    }
}
