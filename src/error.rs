use thiserror::Error;

/// Error kinds a caller can match on, mirroring the taxonomy the broker
/// commits to at its boundary (see crate docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    MalformedKeyDocument,
    UnexpectedKeyDocument,
    KmsFailure,
    KmsNotDone,
    KeyNotFound,
    KeyNotDecrypted,
    Internal,
}

/// Errors produced at the broker's boundary.
///
/// Call-level errors (bad input, structural corruption of a whole document)
/// are returned directly from the offending call. Per-entry errors (a single
/// key's KMS request was denied, a single key document was malformed) are
/// instead recorded on the entry as `EntryState::Error` and never surface
/// here — see [`crate::registry`].
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed key document: {0}")]
    MalformedKeyDocument(String),

    #[error("key vault document matched no pending key")]
    UnexpectedKeyDocument,

    #[error("KMS request failed: {0}")]
    KmsFailure(String),

    #[error("KMS exchange is not yet complete")]
    KmsNotDone,

    #[error("no key found for id {0}")]
    KeyNotFound(uuid::Uuid),

    #[error("key {0} has not been decrypted")]
    KeyNotDecrypted(uuid::Uuid),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// The kind of this error, for callers that want to branch without
    /// matching the full enum (and for building a structured error record
    /// at the boundary, per the out-of-scope status-carrier collaborator).
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BrokerError::MalformedKeyDocument(_) => ErrorKind::MalformedKeyDocument,
            BrokerError::UnexpectedKeyDocument => ErrorKind::UnexpectedKeyDocument,
            BrokerError::KmsFailure(_) => ErrorKind::KmsFailure,
            BrokerError::KmsNotDone => ErrorKind::KmsNotDone,
            BrokerError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            BrokerError::KeyNotDecrypted(_) => ErrorKind::KeyNotDecrypted,
            BrokerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A stable numeric code for the error kind, for callers that serialize
    /// errors across a process boundary instead of matching the enum.
    pub fn code(&self) -> u32 {
        match self.kind() {
            ErrorKind::InvalidArgument => 1,
            ErrorKind::MalformedKeyDocument => 2,
            ErrorKind::UnexpectedKeyDocument => 3,
            ErrorKind::KmsFailure => 4,
            ErrorKind::KmsNotDone => 5,
            ErrorKind::KeyNotFound => 6,
            ErrorKind::KeyNotDecrypted => 7,
            ErrorKind::Internal => 8,
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
