//! Error types for the stirrin core library.

use std::fmt;
use std::path::PathBuf;

/// Top-level error enum for the stirrin core library.
#[derive(Debug, thiserror::Error)]
pub enum StirrinError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported syntax in {}:{line}: {message}", path.display())]
    UnsupportedSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Could not resolve `{name}` in {}", path.display())]
    Unresolved { path: PathBuf, name: String },

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Malformed class file {entry}: {message}")]
    ClassFormat { entry: String, message: String },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<StirrinError>),
}

impl StirrinError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StirrinError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn class_format(entry: impl Into<String>, message: impl Into<String>) -> Self {
        StirrinError::ClassFormat {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Collapse a batch of failures: one error is surfaced as itself.
    pub fn aggregate(mut errors: Vec<StirrinError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            StirrinError::Aggregate(errors)
        }
    }
}

struct AggregateDisplay<'a>(&'a [StirrinError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors:", self.0.len())?;
        for err in self.0 {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

pub type StirrinResult<T> = Result<T, StirrinError>;
