use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Descriptor shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Account not found: {0}")]
    UnknownEmail(String),

    #[error("No face data on file for {0}")]
    NoDescriptorOnFile(String),

    #[error("Role mismatch: account is {current}")]
    RoleMismatch { current: String },

    #[error("User has already voted: {0}")]
    AlreadyVoted(String),

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),

    #[error("Invalid or expired verification token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Face classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl VoteError {
    /// True for errors caused by the request itself rather than the system.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            VoteError::Storage(_)
                | VoteError::Config(_)
                | VoteError::Io(_)
                | VoteError::Other(_)
                | VoteError::ClassifierUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VoteError>;
