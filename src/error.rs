//! Error types for the repository engine.

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when operating on the repository.
///
/// Configuration errors (unknown distribution/component/architecture) abort
/// an operation before anything is mutated. Conflict errors (`ItemExists`,
/// `ArtifactExists`) are reported per item; batch operations continue past
/// them. `CopySpecMismatch` indicates a logic defect and is never recovered.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Distributions not configured for this repository.
    #[error("distributions {0:?} are not currently served by this repo")]
    UnknownDistributions(Vec<String>),

    /// Components not configured for this repository.
    #[error("components {0:?} are not currently served by this repo")]
    UnknownComponents(Vec<String>),

    /// Architectures not configured for this repository.
    #[error("architectures {0:?} are not currently served by this repo")]
    UnknownArchitectures(Vec<String>),

    /// A catalog entry with the same identity already exists.
    #[error("catalog item already exists: {0}")]
    ItemExists(String),

    /// An artifact already exists at the destination path.
    #[error("artifact already exists: {0}")]
    ArtifactExists(String),

    /// An artifact expected at a path is missing.
    #[error("artifact not found: {0}")]
    ArtifactMissing(String),

    /// No repository metadata stored under the `meta` key yet.
    #[error("no repository metadata found in domain {0}; run setup first")]
    MetaNotFound(String),

    /// A stored attribute map could not be turned back into a catalog item.
    #[error("invalid catalog attributes: {0}")]
    InvalidAttributes(String),

    /// The candidate and target sides of a copy do not have the same shape.
    #[error("copy spec mismatch: {0}")]
    CopySpecMismatch(String),

    /// A configured signing key was not found in the keyring.
    #[error("unknown signing key: {0}")]
    UnknownSigningKey(String),

    /// Signing a Release file failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// An attribute-store or object-store call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Index rendering failed.
    #[error(transparent)]
    Index(#[from] apt_repository::AptRepositoryError),

    /// Backup (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a backend error from any displayable cause.
    pub fn backend<E: std::fmt::Display>(cause: E) -> Self {
        Self::Backend(cause.to_string())
    }

    /// Create a signing error from any displayable cause.
    pub fn signing<E: std::fmt::Display>(cause: E) -> Self {
        Self::Signing(cause.to_string())
    }

    /// Create an invalid-attributes error.
    pub fn invalid_attributes<S: Into<String>>(msg: S) -> Self {
        Self::InvalidAttributes(msg.into())
    }
}
