//! Crate-wide error type.
//!
//! Every failure is fatal for the call that detected it: a hypermedia
//! document with silently dropped fields is worse than no document.
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Conflicting or duplicate vocabulary/term declarations, or an
    /// affordance whose path variables don't match its href template.
    #[error("configuration error on `{scope}`: {message}")]
    Configuration { scope: String, message: String },

    /// A property read failed during traversal.
    #[error("failed to read `{property}` of {object} at {path}: {message}")]
    Introspection {
        object: String,
        property: String,
        path: String,
        message: String,
    },

    /// A possible-values provider could not be resolved or failed.
    #[error("options provider `{provider}` for parameter `{parameter}`: {message}")]
    OptionsResolution {
        provider: String,
        parameter: String,
        message: String,
    },

    /// An emitter was asked to render something it does not implement.
    #[error("{emitter} cannot render {what}")]
    Unsupported { emitter: &'static str, what: String },

    /// Manifest or input document did not match the expected shape.
    #[error("manifest error at JSON path {path}: {message}")]
    Manifest { path: String, message: String },

    #[error("jq: {0}")]
    Jq(String),
}

impl Error {
    pub fn configuration(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration { scope: scope.into(), message: message.into() }
    }

    pub fn unsupported(emitter: &'static str, what: impl Into<String>) -> Self {
        Error::Unsupported { emitter, what: what.into() }
    }
}
