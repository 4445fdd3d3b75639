//! Error types for the Strata client.

use thiserror::Error;

/// Errors surfaced by query preparation and parameter binding.
///
/// Message prefixes are stable so adapter layers can match on them
/// without depending on the enum shape.
#[derive(Debug, Error)]
pub enum StrataError {
    /// The SQL text could not be parsed into a query descriptor.
    #[error("parse-error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// A non-null value could not be mapped to any remote type.
    #[error("cannot-infer-type: parameter {name} with value {value}")]
    TypeInference { name: String, value: String },

    /// A declared parameter was never bound before assembly.
    #[error("missing-value-for-parameter: {0}")]
    MissingValue(String),

    /// A parameter name is not declared by the prepared query.
    #[error("parameter-not-found: {0}")]
    ParameterNotFound(String),

    /// A positional parameter index is out of range.
    #[error("parameter-number-not-found: {0}")]
    ParameterIndex(usize),

    /// The statement was forced into batch mode but has no batch shape.
    #[error("statement-is-not-a-batch: {0}")]
    NotABatch(String),

    /// A value does not fit the declared parameter type.
    #[error("value-conversion-failed: parameter {name} expects {expected}, got {value}")]
    Conversion {
        name: String,
        expected: String,
        value: String,
    },

    /// A prepare or describe round trip failed.
    #[error("remote-resolution-failed: {0}")]
    RemoteResolution(String),

    /// The transport reported a protocol-level failure.
    #[error("transport-error [{status}]: {message}")]
    Transport { status: String, message: String },

    #[error("config-error: {0}")]
    Config(String),
}

impl StrataError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a transport error from a status code and message.
    pub fn transport(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            status: status.into(),
            message: message.into(),
        }
    }

    /// Status string for transport errors, `None` for local errors.
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Transport { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Result type alias for client operations.
pub type StrataResult<T> = Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StrataError::parse(5, "unexpected character");
        assert_eq!(
            err.to_string(),
            "parse-error at position 5: unexpected character"
        );
    }

    #[test]
    fn test_stable_prefixes() {
        assert!(StrataError::MissingValue("$p1".into())
            .to_string()
            .starts_with("missing-value-for-parameter:"));
        assert!(StrataError::ParameterNotFound("id".into())
            .to_string()
            .starts_with("parameter-not-found:"));
        assert!(StrataError::transport("UNAVAILABLE", "node down")
            .to_string()
            .starts_with("transport-error"));
    }
}
