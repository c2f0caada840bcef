//! Authentication models
//!
//! Accounts carry one of the two core roles. Tokens are JWTs whose claims map
//! straight onto a core [`Viewer`].

use seedkeeper_core::{Role, Viewer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: i64,
}

impl User {
    /// Create new user with hashed password
    pub fn new(username: String, password: &str, role: Role) -> Result<Self, AuthError> {
        Ok(User {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: super::hash_password(password)?,
            role,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Verify password against stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        use argon2::{
            password_hash::{PasswordHash, PasswordVerifier},
            Argon2,
        };

        let parsed_hash = match PasswordHash::new(&self.password_hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Login and registration form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// JWT claims for authentication tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // user id
    pub username: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn new(user: &User, ttl_hours: i64) -> Self {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize;

        Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            exp,
        }
    }

    /// Unknown role strings fall back to the unprivileged role
    pub fn get_role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.username.clone(), self.get_role())
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp() as usize;
        now >= self.exp
    }
}

/// Safe user info for API responses (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: i64,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
