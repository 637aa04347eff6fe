use thiserror::Error;

/// Fatal outcomes of a single parse call. Every other irregularity in a
/// source document is absorbed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document is not valid JSON, or its top level is not an object.
    #[error("cannot parse response: {reason}")]
    MalformedDocument { reason: String },

    /// An item lacks a source field whose rule is required and has no default.
    #[error("source configuration error: required field `{source_field}` missing")]
    RequiredFieldMissing { source_field: String },
}

impl ParseError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument { reason: reason.into() }
    }

    pub fn required_missing(source_field: &str) -> Self {
        Self::RequiredFieldMissing { source_field: source_field.to_string() }
    }
}

/// Structural problems in a content-type configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("mapping rule #{index} has an empty source field")]
    EmptySourceField { index: usize },

    #[error("mapping rule #{index} has an empty target field")]
    EmptyTargetField { index: usize },

    /// Two rules resolve to the same canonical slot.
    #[error("target field `{target}` is mapped more than once")]
    DuplicateTarget { target: String },

    #[error("list response path must not be empty")]
    EmptyListPath,
}
