//! Error types.
//!
//! Only recoverable conditions are errors: malformed plain input and missing
//! packages in the [`Registry`](crate::registry::Registry). Structural
//! invariant violations are translator bugs and panic instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("bad byte {byte:?} in {token:?}")]
    BadByte { byte: char, token: String },

    #[error("truncated input: expected {0}")]
    Truncated(&'static str),

    #[error("unknown tag {0:?}")]
    UnknownTag(String),

    #[error("bad number {0:?}")]
    BadNumber(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{what}: {cause}")]
    Context {
        what: String,
        #[source]
        cause: Box<DecodeError>,
    },
}

impl DecodeError {
    pub fn context(self, what: impl Into<String>) -> Self {
        DecodeError::Context {
            what: what.into(),
            cause: Box::new(self),
        }
    }

    /// The innermost error of a context chain.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Context { cause, .. } => cause.root_cause(),
            e => e,
        }
    }
}

/// Attach context to a decode result lazily.
pub trait DecodeContext<T> {
    fn with_context<S, F>(self, f: F) -> Result<T, DecodeError>
    where
        S: Into<String>,
        F: FnOnce() -> S;
}

impl<T> DecodeContext<T> for Result<T, DecodeError> {
    fn with_context<S, F>(self, f: F) -> Result<T, DecodeError>
    where
        S: Into<String>,
        F: FnOnce() -> S,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RegistryError {
    #[error("package {0:?} is not in the registry")]
    MissingDependency(String),

    #[error("package {0:?} is already registered")]
    Duplicate(String),
}
