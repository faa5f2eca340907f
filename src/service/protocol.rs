use serde::{Serialize, Deserialize, de::DeserializeOwned};
use std::io::{Read, Write};
use crate::common::{VoteError, Result};
use crate::core::{Descriptor, MatchResult, VerificationToken};
use crate::storage::{Candidate, CandidateUpdate, Role, Vote};

/// Frames larger than this are refused in both directions.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

pub const SOCKET_PATH: &str = "/run/facevote/service.sock";
pub const DEV_SOCKET_PATH: &str = "/tmp/facevote.sock";

// Request types
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Request {
    Register(RegisterRequest),
    Login(LoginRequest),
    Verify(VerifyRequest),
    CastVote(VoteRequest),
    ListCandidates,
    UpsertCandidate(UpsertCandidateRequest),
    ListVotes { admin_email: String },
    Health,
}

impl Request {
    /// Short name for logs. Never includes descriptors or tokens.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Register(_) => "register",
            Request::Login(_) => "login",
            Request::Verify(_) => "verify",
            Request::CastVote(_) => "cast-vote",
            Request::ListCandidates => "list-candidates",
            Request::UpsertCandidate(_) => "upsert-candidate",
            Request::ListVotes { .. } => "list-votes",
            Request::Health => "health",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub descriptor: Descriptor,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyRequest {
    pub email: String,
    pub descriptor: Descriptor,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoteRequest {
    pub email: String,
    pub candidate: String,
    pub token: VerificationToken,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpsertCandidateRequest {
    pub admin_email: String,
    pub candidate: CandidateUpdate,
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Response {
    Registered { email: String, role: Role },
    LoggedIn(LoginResponse),
    Verified(VerifyResponse),
    VoteRecorded(Vote),
    Candidates(Vec<Candidate>),
    Candidate(Candidate),
    Votes(Vec<Vote>),
    Health { version: String },
    Error(ServiceError),
}

/// Account summary returned by login. The stored descriptor stays on the
/// server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyResponse {
    pub result: MatchResult,
    pub token: Option<VerificationToken>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    MissingFields,
    ShapeMismatch { expected: usize, actual: usize },
    DuplicateEmail,
    UnknownEmail,
    NoDescriptorOnFile,
    RoleMismatch,
    AlreadyVoted,
    UnknownCandidate,
    InvalidToken,
    Forbidden,
    Internal,
}

/// Error as it crosses the socket. `detail` carries the variant payload
/// (an email, a role, a field list) so the client can rebuild the error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub detail: String,
    pub message: String,
}

impl From<&VoteError> for ServiceError {
    fn from(err: &VoteError) -> Self {
        let (kind, detail) = match err {
            VoteError::InvalidInput(d) => (ErrorKind::InvalidInput, d.clone()),
            VoteError::MissingFields(d) => (ErrorKind::MissingFields, d.clone()),
            VoteError::ShapeMismatch { expected, actual } => (
                ErrorKind::ShapeMismatch { expected: *expected, actual: *actual },
                String::new(),
            ),
            VoteError::DuplicateEmail(d) => (ErrorKind::DuplicateEmail, d.clone()),
            VoteError::UnknownEmail(d) => (ErrorKind::UnknownEmail, d.clone()),
            VoteError::NoDescriptorOnFile(d) => (ErrorKind::NoDescriptorOnFile, d.clone()),
            VoteError::RoleMismatch { current } => (ErrorKind::RoleMismatch, current.clone()),
            VoteError::AlreadyVoted(d) => (ErrorKind::AlreadyVoted, d.clone()),
            VoteError::UnknownCandidate(d) => (ErrorKind::UnknownCandidate, d.clone()),
            VoteError::InvalidToken => (ErrorKind::InvalidToken, String::new()),
            VoteError::Forbidden(d) => (ErrorKind::Forbidden, d.clone()),
            // internal details stay in the service log
            _ => (ErrorKind::Internal, String::new()),
        };

        let message = match kind {
            ErrorKind::Internal => "Internal service error".to_string(),
            _ => err.to_string(),
        };
        ServiceError { kind, detail, message }
    }
}

impl From<ServiceError> for VoteError {
    fn from(err: ServiceError) -> Self {
        match err.kind {
            ErrorKind::InvalidInput => VoteError::InvalidInput(err.detail),
            ErrorKind::MissingFields => VoteError::MissingFields(err.detail),
            ErrorKind::ShapeMismatch { expected, actual } => VoteError::ShapeMismatch { expected, actual },
            ErrorKind::DuplicateEmail => VoteError::DuplicateEmail(err.detail),
            ErrorKind::UnknownEmail => VoteError::UnknownEmail(err.detail),
            ErrorKind::NoDescriptorOnFile => VoteError::NoDescriptorOnFile(err.detail),
            ErrorKind::RoleMismatch => VoteError::RoleMismatch { current: err.detail },
            ErrorKind::AlreadyVoted => VoteError::AlreadyVoted(err.detail),
            ErrorKind::UnknownCandidate => VoteError::UnknownCandidate(err.detail),
            ErrorKind::InvalidToken => VoteError::InvalidToken,
            ErrorKind::Forbidden => VoteError::Forbidden(err.detail),
            ErrorKind::Internal => VoteError::Other(anyhow::anyhow!("Service error: {}", err.message)),
        }
    }
}

/// Writes one message: little-endian u32 length, then the bincode body.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let data = bincode::serialize(message)
        .map_err(|e| VoteError::Other(anyhow::anyhow!("Failed to serialize message: {}", e)))?;
    if data.len() > MAX_FRAME_SIZE {
        return Err(VoteError::InvalidInput(format!("Message too large: {} bytes", data.len())));
    }

    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(VoteError::InvalidInput(format!("Message too large: {} bytes", len)));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    bincode::deserialize(&buf)
        .map_err(|e| VoteError::InvalidInput(format!("Failed to deserialize message: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        let request = Request::Login(LoginRequest {
            email: "a@x.com".to_string(),
            role: Some("admin".to_string()),
        });

        let mut buf = Vec::new();
        write_frame(&mut buf, &request).unwrap();
        assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize, buf.len() - 4);

        match read_frame::<_, Request>(&mut Cursor::new(buf)).unwrap() {
            Request::Login(login) => {
                assert_eq!(login.email, "a@x.com");
                assert_eq!(login.role.as_deref(), Some("admin"));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn oversized_frame_is_refused() {
        let mut buf = ((MAX_FRAME_SIZE + 1) as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 16]);
        let result = read_frame::<_, Request>(&mut Cursor::new(buf));
        assert!(matches!(result, Err(VoteError::InvalidInput(_))));
    }

    #[test]
    fn truncated_frame_is_an_io_error() {
        let mut buf = 32u32.to_le_bytes().to_vec();
        buf.extend_from_slice(&[1, 2, 3]);
        let result = read_frame::<_, Request>(&mut Cursor::new(buf));
        assert!(matches!(result, Err(VoteError::Io(_))));
    }

    #[test]
    fn errors_survive_the_wire() {
        let original = VoteError::AlreadyVoted("a@x.com".to_string());
        let rebuilt: VoteError = ServiceError::from(&original).into();
        assert!(matches!(rebuilt, VoteError::AlreadyVoted(ref e) if e == "a@x.com"));

        let shape: VoteError = ServiceError::from(&VoteError::ShapeMismatch { expected: 128, actual: 3 }).into();
        assert!(matches!(shape, VoteError::ShapeMismatch { expected: 128, actual: 3 }));

        let role: VoteError = ServiceError::from(&VoteError::RoleMismatch { current: "user".into() }).into();
        assert!(matches!(role, VoteError::RoleMismatch { ref current } if current == "user"));
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = VoteError::Storage("disk path /var/lib/secret".to_string());
        let wire = ServiceError::from(&err);
        assert_eq!(wire.kind, ErrorKind::Internal);
        assert!(!wire.message.contains("/var/lib"));
    }
}
