//! Error taxonomy shared by every stage of the cache update. Each variant maps
//! onto one failure class the CLI reports: transport failures while talking to
//! Shadertoy, descriptors that do not match the shape this crate understands,
//! compiler failures, missing configuration, and local filesystem errors.
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("invalid shader descriptor: {0}")]
    Validation(String),

    #[error("compiling {} failed ({status}): {stderr}", path.display())]
    Compile {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub(crate) fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn io(action: &str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            context: format!("{action} {}", path.display()),
            source,
        }
    }
}
