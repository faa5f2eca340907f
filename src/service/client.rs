use crate::common::{VoteError, Result};
use crate::core::{Descriptor, VerificationToken};
use crate::service::protocol::{
    read_frame, write_frame, LoginRequest, LoginResponse, RegisterRequest, Request, Response,
    UpsertCandidateRequest, VerifyRequest, VerifyResponse, VoteRequest,
};
use crate::storage::{Candidate, CandidateUpdate, Role, Vote};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Untrusted side of the socket. Every verdict comes from the service.
pub struct ServiceClient {
    socket_path: PathBuf,
}

impl ServiceClient {
    pub fn with_socket(path: impl AsRef<Path>) -> Self {
        ServiceClient { socket_path: path.as_ref().to_path_buf() }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn register(&self, email: &str, name: &str, role: Option<&str>, descriptor: Descriptor) -> Result<Role> {
        match self.call(Request::Register(RegisterRequest {
            email: email.to_string(),
            name: name.to_string(),
            role: role.map(str::to_string),
            descriptor,
        }))? {
            Response::Registered { role, .. } => Ok(role),
            other => Err(unexpected(other)),
        }
    }

    pub fn login(&self, email: &str, role: Option<&str>) -> Result<LoginResponse> {
        match self.call(Request::Login(LoginRequest {
            email: email.to_string(),
            role: role.map(str::to_string),
        }))? {
            Response::LoggedIn(login) => Ok(login),
            other => Err(unexpected(other)),
        }
    }

    pub fn verify(&self, email: &str, descriptor: &Descriptor) -> Result<VerifyResponse> {
        match self.call(Request::Verify(VerifyRequest {
            email: email.to_string(),
            descriptor: descriptor.clone(),
        }))? {
            Response::Verified(verified) => Ok(verified),
            other => Err(unexpected(other)),
        }
    }

    pub fn cast_vote(&self, email: &str, candidate: &str, token: &VerificationToken) -> Result<Vote> {
        match self.call(Request::CastVote(VoteRequest {
            email: email.to_string(),
            candidate: candidate.to_string(),
            token: token.clone(),
        }))? {
            Response::VoteRecorded(vote) => Ok(vote),
            other => Err(unexpected(other)),
        }
    }

    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        match self.call(Request::ListCandidates)? {
            Response::Candidates(candidates) => Ok(candidates),
            other => Err(unexpected(other)),
        }
    }

    pub fn upsert_candidate(&self, admin_email: &str, candidate: CandidateUpdate) -> Result<Candidate> {
        match self.call(Request::UpsertCandidate(UpsertCandidateRequest {
            admin_email: admin_email.to_string(),
            candidate,
        }))? {
            Response::Candidate(candidate) => Ok(candidate),
            other => Err(unexpected(other)),
        }
    }

    pub fn votes(&self, admin_email: &str) -> Result<Vec<Vote>> {
        match self.call(Request::ListVotes { admin_email: admin_email.to_string() })? {
            Response::Votes(votes) => Ok(votes),
            other => Err(unexpected(other)),
        }
    }

    pub fn health(&self) -> Result<String> {
        match self.call(Request::Health)? {
            Response::Health { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// One request per connection; service-side errors come back as the
    /// matching [`VoteError`] variant.
    fn call(&self, request: Request) -> Result<Response> {
        let mut stream = self.connect_with_retry(3)?;
        write_frame(&mut stream, &request)?;
        match read_frame(&mut stream)? {
            Response::Error(err) => Err(err.into()),
            response => Ok(response),
        }
    }

    fn connect_with_retry(&self, max_retries: u32) -> Result<UnixStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match UnixStream::connect(&self.socket_path) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
                    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
                    return Ok(stream);
                }
                Err(e) if attempt < max_retries => {
                    tracing::debug!("Failed to connect (attempt {}): {}", attempt, e);
                    std::thread::sleep(Duration::from_millis(200));
                }
                Err(e) => {
                    return Err(VoteError::Other(anyhow::anyhow!(
                        "Failed to connect to service at {:?}: {}", self.socket_path, e
                    )));
                }
            }
        }
    }
}

fn unexpected(response: Response) -> VoteError {
    VoteError::Other(anyhow::anyhow!("Unexpected response type: {:?}", response))
}
