use std::path::PathBuf;
use std::sync::Arc;

/// Result alias used across the crate.
pub type PackResult<T> = Result<T, PackError>;

/// Errors produced while building or executing a texture graph.
#[derive(thiserror::Error, Debug)]
pub enum PackError {
    /// A construction-time precondition was violated. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A rendering step failed. Eligible for retry.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem failure while reading a source or writing an output.
    #[error("io error at '{}': {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A dependency of the reporting task failed.
    #[error("dependency '{task}' failed: {source}")]
    Dependency {
        /// Name of the failed dependency.
        task: String,
        /// The dependency's own failure, shared with every other consumer.
        #[source]
        source: Arc<PackError>,
    },

    /// The computation was cancelled. Not a failure.
    #[error("cancelled")]
    Cancelled,

    /// The driver gave up on outputs that kept failing.
    #[error("{failed} output(s) still failing after {attempts} attempt(s)")]
    RetriesExhausted {
        /// Number of driver rounds that ended with failures.
        attempts: u32,
        /// Outputs still failing in the final round.
        failed: usize,
    },

    /// Recipe (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PackError {
    /// Build a [`PackError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PackError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`PackError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`PackError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a dependency failure as seen from one of its consumers.
    pub fn dependency(task: impl Into<String>, source: Arc<PackError>) -> Self {
        Self::Dependency {
            task: task.into(),
            source,
        }
    }

    /// `true` for [`PackError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Walk [`PackError::Dependency`] wrappers down to the failure that started the chain.
    pub fn root_cause(&self) -> &PackError {
        let mut err = self;
        while let Self::Dependency { source, .. } = err {
            err = source.as_ref();
        }
        err
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
