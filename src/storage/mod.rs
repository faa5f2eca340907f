pub mod candidate_store;
pub mod identity_store;
pub mod vote_ledger;

pub use candidate_store::{Candidate, CandidateRepository, CandidateStore, CandidateUpdate, MemoryCandidateStore};
pub use identity_store::{Identity, IdentityRepository, IdentityStore, MemoryIdentityStore, Role};
pub use vote_ledger::{FileVoteLedger, MemoryVoteLedger, Vote, VoteLedger};

use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Stable, filesystem-safe key for an email address.
pub fn email_key(email: &str) -> String {
    let digest = Sha256::digest(normalize_email(email).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Writes `bytes` to `dir/name` only if that file does not exist yet.
///
/// The data goes to a private temporary file first and is then published
/// with `hard_link`, which fails atomically when the target exists. Readers
/// never see a partial record and two writers can never both succeed.
/// Returns `Ok(false)` when the target already existed.
pub(crate) fn publish_new(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<bool> {
    let suffix: u64 = thread_rng().gen();
    let tmp = dir.join(format!(".{}.{:016x}.tmp", name, suffix));
    fs::write(&tmp, bytes)?;

    let result = match fs::hard_link(&tmp, dir.join(name)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    };

    if let Err(e) = fs::remove_file(&tmp) {
        tracing::warn!("Failed to remove temp file {:?}: {}", tmp, e);
    }
    result
}
