//! End-to-end tests over a real Unix socket: a service thread backed by the
//! file stores, driven through `ServiceClient`.

use face_vote::common::{Config, DataPaths};
use face_vote::core::{Descriptor, VoterAuth};
use face_vote::service::{protocol::MAX_FRAME_SIZE, serve, ServiceClient};
use face_vote::storage::CandidateUpdate;
use face_vote::VoteError;
use std::io::Write;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

struct TestService {
    dir: TempDir,
}

impl TestService {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("service.sock");
        let auth = VoterAuth::open(Config::default(), &DataPaths::under(&dir.path().join("data"))).unwrap();
        let listener = UnixListener::bind(&socket).unwrap();
        let auth = Arc::new(auth);
        thread::spawn(move || serve(listener, auth));
        TestService { dir }
    }

    fn client(&self) -> ServiceClient {
        ServiceClient::with_socket(self.dir.path().join("service.sock"))
    }
}

fn descriptor(first: f32) -> Descriptor {
    let mut values = vec![0.0; 128];
    values[0] = first;
    Descriptor::new(values)
}

fn seed(client: &ServiceClient) {
    client.register("u1@x.com", "User One", None, descriptor(1.0)).unwrap();
    client.register("admin@x.com", "Admin", Some("admin"), descriptor(5.0)).unwrap();
    for name in ["Candidate A", "Candidate B"] {
        client
            .upsert_candidate("admin@x.com", CandidateUpdate {
                name: name.to_string(),
                party: "Independent".to_string(),
                ..Default::default()
            })
            .unwrap();
    }
}

// =============================================================================
// Matching
// =============================================================================

#[test]
fn test_self_match_issues_token() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);

    let verified = client.verify("u1@x.com", &descriptor(1.0)).unwrap();
    assert!(verified.result.is_match);
    assert_eq!(verified.result.distance, 0.0);
    assert!(verified.token.is_some());
}

#[test]
fn test_one_unit_away_does_not_match() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);

    let verified = client.verify("u1@x.com", &descriptor(2.0)).unwrap();
    assert!(!verified.result.is_match);
    assert_eq!(verified.result.distance, 1.0);
    assert!(verified.token.is_none());
}

#[test]
fn test_verify_errors_keep_their_kind() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);

    assert!(matches!(
        client.verify("ghost@x.com", &descriptor(1.0)),
        Err(VoteError::UnknownEmail(_))
    ));
    assert!(matches!(
        client.verify("u1@x.com", &Descriptor::new(vec![0.0; 64])),
        Err(VoteError::ShapeMismatch { expected: 128, actual: 64 })
    ));
}

// =============================================================================
// Accounts
// =============================================================================

#[test]
fn test_duplicate_registration_and_login() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);

    assert!(matches!(
        client.register("U1@X.com", "Again", None, descriptor(1.0)),
        Err(VoteError::DuplicateEmail(_))
    ));

    let login = client.login("u1@x.com", None).unwrap();
    assert_eq!(login.name, "User One");
    assert!(matches!(
        client.login("u1@x.com", Some("admin")),
        Err(VoteError::RoleMismatch { ref current }) if current == "user"
    ));
    assert!(matches!(client.login("ghost@x.com", None), Err(VoteError::UnknownEmail(_))));
}

// =============================================================================
// Voting
// =============================================================================

#[test]
fn test_second_vote_is_rejected() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);

    let token = client.verify("u1@x.com", &descriptor(1.0)).unwrap().token.unwrap();
    let vote = client.cast_vote("u1@x.com", "Candidate A", &token).unwrap();
    assert_eq!(vote.candidate, "Candidate A");

    assert!(matches!(
        client.cast_vote("u1@x.com", "Candidate B", &token),
        Err(VoteError::AlreadyVoted(_))
    ));

    let votes = client.votes("admin@x.com").unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].candidate, "Candidate A");
}

#[test]
fn test_concurrent_votes_record_once() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);
    let token = client.verify("u1@x.com", &descriptor(1.0)).unwrap().token.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = service.client();
            let token = token.clone();
            let candidate = if i % 2 == 0 { "Candidate A" } else { "Candidate B" };
            thread::spawn(move || client.cast_vote("u1@x.com", candidate, &token))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, VoteError::AlreadyVoted(_))));
    assert_eq!(client.votes("admin@x.com").unwrap().len(), 1);
}

#[test]
fn test_votes_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    {
        let auth = VoterAuth::open(Config::default(), &paths).unwrap();
        auth.register("u1@x.com", "User One", None, descriptor(1.0)).unwrap();
        auth.register("admin@x.com", "Admin", Some("admin"), descriptor(5.0)).unwrap();
        auth.upsert_candidate("admin@x.com", CandidateUpdate {
            name: "Candidate A".to_string(),
            party: "Independent".to_string(),
            ..Default::default()
        })
        .unwrap();
        let token = auth.verify("u1@x.com", &descriptor(1.0)).unwrap().token.unwrap();
        auth.cast_vote("u1@x.com", "Candidate A", &token).unwrap();
    }

    let reopened = VoterAuth::open(Config::default(), &paths).unwrap();
    let token = reopened.verify("u1@x.com", &descriptor(1.0)).unwrap().token.unwrap();
    assert!(matches!(
        reopened.cast_vote("u1@x.com", "Candidate A", &token),
        Err(VoteError::AlreadyVoted(_))
    ));
    assert_eq!(reopened.list_candidates().unwrap().len(), 1);
}

#[test]
fn test_admin_operations_require_admin() {
    let service = TestService::start();
    let client = service.client();
    seed(&client);

    assert!(matches!(client.votes("u1@x.com"), Err(VoteError::Forbidden(_))));
    assert!(matches!(
        client.upsert_candidate("u1@x.com", CandidateUpdate {
            name: "Candidate C".to_string(),
            party: "Green".to_string(),
            ..Default::default()
        }),
        Err(VoteError::Forbidden(_))
    ));

    let names: Vec<_> = client.candidates().unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Candidate A", "Candidate B"]);
}

// =============================================================================
// Transport
// =============================================================================

#[test]
fn test_oversized_frame_drops_only_that_connection() {
    let service = TestService::start();

    let mut raw = UnixStream::connect(service.dir.path().join("service.sock")).unwrap();
    raw.write_all(&((MAX_FRAME_SIZE + 1) as u32).to_le_bytes()).unwrap();
    drop(raw);

    let version = service.client().health().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));
}
