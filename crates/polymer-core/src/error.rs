//! Error types for Polymer

use thiserror::Error;

/// Error returned by a module's execute hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("module not found: {0}")]
    NotFound(String),

    #[error("name conflict in '{appname}': {key} is already registered")]
    NameConflict { appname: String, key: String },

    #[error("'{owner}' has no attribute '{key}'")]
    AttributeMiss { owner: String, key: String },

    #[error("execution of {qualname} failed: {source}")]
    ExecutionFailure {
        qualname: String,
        #[source]
        source: HookError,
    },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(qualname: impl Into<String>) -> Self {
        Self::NotFound(qualname.into())
    }

    pub fn name_conflict(appname: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NameConflict {
            appname: appname.into(),
            key: key.into(),
        }
    }

    pub fn attribute_miss(owner: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AttributeMiss {
            owner: owner.into(),
            key: key.into(),
        }
    }

    pub fn execution_failure(qualname: impl Into<String>, source: HookError) -> Self {
        Self::ExecutionFailure {
            qualname: qualname.into(),
            source,
        }
    }

    /// Expected misses that a caller may answer by trying the next source.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AttributeMiss { .. })
    }
}
