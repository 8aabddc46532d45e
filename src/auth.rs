//! Bearer-token authorization.
//!
//! Two static tables: credential to [`Role`], and role to permitted
//! [`Action`]s. The transport consults both before calling into the job
//! service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to read token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid token file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Token file {path} grants no credentials")]
    Empty { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

impl Role {
    pub fn permits(self, action: Action) -> bool {
        match self {
            Role::Admin => true,
            Role::Operator => !matches!(action, Action::Stop),
            Role::Viewer => matches!(action, Action::Status | Action::Output),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operator => write!(f, "operator"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Stop,
    Status,
    Output,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Start => write!(f, "start"),
            Action::Stop => write!(f, "stop"),
            Action::Status => write!(f, "status"),
            Action::Output => write!(f, "output"),
        }
    }
}

/// Credential table. [`Default`] carries the development tokens.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    tokens: HashMap<String, Role>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::empty()
            .with_token("admin-token-123", Role::Admin)
            .with_token("operator-token-456", Role::Operator)
            .with_token("viewer-token-789", Role::Viewer)
    }
}

impl AccessPolicy {
    pub fn empty() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, role: Role) -> Self {
        self.tokens.insert(token.into(), role);
        self
    }

    /// Load a JSON object mapping tokens to role names, e.g.
    /// `{"s3cret": "admin"}`. A file with no tokens would lock every
    /// request out and is rejected.
    pub fn from_json_file(path: &Path) -> Result<Self, PolicyError> {
        let raw = std::fs::read(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tokens: HashMap<String, Role> =
            serde_json::from_slice(&raw).map_err(|source| PolicyError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let policy = Self { tokens };
        if policy.is_empty() {
            return Err(PolicyError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(policy)
    }

    pub fn role_for_credential(&self, token: &str) -> Option<Role> {
        if token.is_empty() {
            return None;
        }
        self.tokens.get(token).copied()
    }

    pub fn is_authorized(&self, role: Role, action: Action) -> bool {
        role.permits(action)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
