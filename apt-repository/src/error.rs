//! Error types for the APT repository index library.

/// Result type for APT repository index operations.
pub type Result<T> = std::result::Result<T, AptRepositoryError>;

/// Errors that can occur when rendering or parsing index files.
#[derive(Debug, thiserror::Error)]
pub enum AptRepositoryError {
    /// I/O error occurred during compression.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid package stanza.
    #[error("Invalid package stanza: {0}")]
    InvalidStanza(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid field value.
    #[error("Invalid field value for '{field}': {value}")]
    InvalidField { field: String, value: String },
}

impl AptRepositoryError {
    /// Create a new invalid stanza error.
    pub fn invalid_stanza<S: Into<String>>(msg: S) -> Self {
        Self::InvalidStanza(msg.into())
    }

    /// Create a new missing field error.
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a new invalid field error.
    pub fn invalid_field<S: Into<String>>(field: S, value: S) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }
}
