//! Access gate: the single decision point for per-job visibility and mutation
//!
//! Every path that exposes or mutates a job (list queries, the viewer push
//! loop, lookups and removal) goes through [`can_view`] or [`can_mutate`].

use serde::{Deserialize, Serialize};

use crate::job::Job;

/// Viewer roles. There are exactly two levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sees and manages every job
    Admin,
    /// Sees and manages only its own jobs
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// An authenticated actor, as handed over by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewer {
    pub username: String,
    pub role: Role,
}

impl Viewer {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Role::Admin)
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self::new(username, Role::User)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Whether `viewer` may see `job`
pub fn can_view(viewer: &Viewer, job: &Job) -> bool {
    job.owner == viewer.username || viewer.is_admin()
}

/// Whether `viewer` may mutate (remove) `job`. Same rule as [`can_view`].
pub fn can_mutate(viewer: &Viewer, job: &Job) -> bool {
    can_view(viewer, job)
}
