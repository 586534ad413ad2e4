//! Error taxonomy for metadata store operations.
//!
//! Every public store operation reports failures through [`MetadataError`].
//! The six variants are the complete status vocabulary of the store; callers
//! branch on [`MetadataError::kind`] rather than on message text.

use thiserror::Error;

/// Result alias used across the lineage crates.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Status taxonomy of the metadata store.
///
/// Errors are surfaced to the caller verbatim; the store never retries. On
/// engines that doom the enclosing transaction on any failed statement, the
/// caller resumes only after an explicit `rollback(); begin()`.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Malformed input: a missing required field, an unknown property name
    /// on update, a value whose kind disagrees with the declared property
    /// data type, or an out-of-range migration target.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A lookup by id or name matched nothing of the requested kind.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated: type name within a kind,
    /// context `(type_id, name)`, an attribution/association pair, or a
    /// property data type conflicting with the stored declaration.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The stored schema version and the library version are incompatible
    /// at connect time.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The store is corrupt: an expected table is missing, or the
    /// environment row is gone from an otherwise live store.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The engine misbehaved, or a migration verification query returned
    /// the wrong shape or a false value.
    #[error("internal: {0}")]
    Internal(String),
}

/// Discriminant of [`MetadataError`], convenient for assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`MetadataError::InvalidArgument`].
    InvalidArgument,
    /// See [`MetadataError::NotFound`].
    NotFound,
    /// See [`MetadataError::AlreadyExists`].
    AlreadyExists,
    /// See [`MetadataError::FailedPrecondition`].
    FailedPrecondition,
    /// See [`MetadataError::Aborted`].
    Aborted,
    /// See [`MetadataError::Internal`].
    Internal,
}

impl MetadataError {
    /// Returns the status kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            MetadataError::InvalidArgument("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            MetadataError::AlreadyExists("x".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            MetadataError::FailedPrecondition("x".into()).kind(),
            ErrorKind::FailedPrecondition
        );
    }

    #[test]
    fn display_includes_detail() {
        let err = MetadataError::NotFound("no artifact with id 7".into());
        assert_eq!(err.to_string(), "not found: no artifact with id 7");
    }
}
