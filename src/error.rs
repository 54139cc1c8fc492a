//! Error taxonomy for resolution and execution.
//!
//! Collaborators (runtime, http, archive) report failures with `anyhow`;
//! everything that crosses the engine boundary is a [`CaskError`] so callers
//! can tell policy violations from data bugs from I/O failures.

use thiserror::Error;

pub type CaskResult<T> = Result<T, CaskError>;

#[derive(Error, Debug)]
pub enum CaskError {
    /// Malformed manifest data. Not retryable; the data has to be fixed.
    #[error("Parse error in {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("{package} conflicts with installed package {installed}")]
    Conflict { package: String, installed: String },

    #[error("Cannot uninstall {package}: required by {}", .dependents.join(", "))]
    DependentsPresent {
        package: String,
        dependents: Vec<String>,
    },

    #[error("{package} is missing dependencies: {}", .missing.join(", "))]
    MissingDependency {
        package: String,
        missing: Vec<String>,
    },

    #[error("Dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Checksum mismatch for {package}: expected {expected}, got {actual}")]
    Integrity {
        package: String,
        expected: String,
        actual: String,
    },

    #[error(
        "Failed to install {package}: {source:#} (rollback {})",
        rollback_label(.rollback_succeeded)
    )]
    Execution {
        package: String,
        #[source]
        source: anyhow::Error,
        rollback_succeeded: bool,
    },

    /// Some installed files could not be removed; the record is kept.
    #[error("Failed to uninstall {package}: {message}")]
    Uninstall { package: String, message: String },

    #[error("Livecheck failed for {package}: {message}")]
    Livecheck { package: String, message: String },

    #[error("Malformed version '{0}'")]
    MalformedVersion(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{package} requires {required}, but this host is {host}")]
    UnsupportedPlatform {
        package: String,
        required: String,
        host: String,
    },
}

fn rollback_label(succeeded: &bool) -> &'static str {
    if *succeeded { "succeeded" } else { "FAILED" }
}

impl CaskError {
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        CaskError::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Process exit code used by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CaskError::Parse { .. } => 2,
            CaskError::Conflict { .. } | CaskError::DependentsPresent { .. } => 3,
            CaskError::MissingDependency { .. } => 4,
            CaskError::DependencyCycle { .. } => 5,
            CaskError::Integrity { .. } => 6,
            CaskError::Execution { .. } | CaskError::Uninstall { .. } => 7,
            CaskError::Livecheck { .. } | CaskError::MalformedVersion(_) => 8,
            CaskError::NotFound(_) => 9,
            CaskError::UnsupportedPlatform { .. } => 10,
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaskError::Livecheck { .. })
    }
}
