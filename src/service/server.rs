use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use crate::common::{VoteError, Result};
use crate::core::VoterAuth;
use crate::service::protocol::{
    read_frame, write_frame, LoginResponse, Request, Response, ServiceError, VerifyResponse,
};

/// Runs one request against the trusted core.
pub fn dispatch(auth: &VoterAuth, request: Request) -> Response {
    let kind = request.kind();

    let result = match request {
        Request::Register(req) => auth
            .register(&req.email, &req.name, req.role.as_deref(), req.descriptor)
            .map(|role| Response::Registered { email: crate::storage::normalize_email(&req.email), role }),
        Request::Login(req) => auth
            .login(&req.email, req.role.as_deref())
            .map(|identity| Response::LoggedIn(LoginResponse {
                email: identity.email,
                name: identity.name,
                role: identity.role,
            })),
        Request::Verify(req) => auth
            .verify(&req.email, &req.descriptor)
            .map(|v| Response::Verified(VerifyResponse { result: v.result, token: v.token })),
        Request::CastVote(req) => auth
            .cast_vote(&req.email, &req.candidate, &req.token)
            .map(Response::VoteRecorded),
        Request::ListCandidates => auth.list_candidates().map(Response::Candidates),
        Request::UpsertCandidate(req) => auth
            .upsert_candidate(&req.admin_email, req.candidate)
            .map(Response::Candidate),
        Request::ListVotes { admin_email } => auth.list_votes(&admin_email).map(Response::Votes),
        Request::Health => Ok(Response::Health {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    };

    result.unwrap_or_else(|e| {
        if e.is_client_error() {
            tracing::warn!("{} rejected: {}", kind, e);
        } else {
            tracing::error!("{} failed: {}", kind, e);
        }
        Response::Error(ServiceError::from(&e))
    })
}

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves every request on one connection until the peer hangs up or
/// stays silent for longer than the idle timeout.
pub fn handle_client(stream: UnixStream, auth: &VoterAuth) -> Result<()> {
    handle_client_with_timeout(stream, auth, IDLE_TIMEOUT)
}

fn handle_client_with_timeout(mut stream: UnixStream, auth: &VoterAuth, idle: Duration) -> Result<()> {
    stream.set_read_timeout(Some(idle))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    loop {
        let request: Request = match read_frame(&mut stream) {
            Ok(request) => request,
            Err(VoteError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(VoteError::Io(e))
                if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
            {
                tracing::debug!("Closing idle connection after {:?}", idle);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("Processing {} request", request.kind());
        let response = dispatch(auth, request);
        write_frame(&mut stream, &response)?;
    }
}

/// Accept loop. Each connection gets its own thread; all of them share the
/// same stores, whose uniqueness guarantees hold across threads.
pub fn serve(listener: UnixListener, auth: Arc<VoterAuth>) -> Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let auth = Arc::clone(&auth);
                thread::Builder::new()
                    .name("facevote-client".to_string())
                    .spawn(move || {
                        if let Err(e) = handle_client(stream, &auth) {
                            tracing::error!("Client error: {}", e);
                        }
                    })?;
            }
            Err(e) => {
                tracing::error!("Connection error: {}", e);
            }
        }
    }

    Ok(())
}
