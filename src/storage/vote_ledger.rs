//! At most one vote per email.
//!
//! Uniqueness is a property of the storage itself: the file ledger publishes
//! each vote with an atomic create-if-absent, the in-memory ledger inserts
//! through a locked map entry. Neither relies on a read before the write.

use crate::common::{VoteError, Result};
use crate::storage::{email_key, normalize_email, publish_new};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vote {
    pub email: String,
    pub candidate: String,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    fn new(email: &str, candidate: &str) -> Result<Self> {
        let email = normalize_email(email);
        let candidate = candidate.trim();
        if email.is_empty() || candidate.is_empty() {
            return Err(VoteError::MissingFields("email and candidate required".to_string()));
        }

        Ok(Self {
            email,
            candidate: candidate.to_string(),
            created_at: Utc::now(),
        })
    }
}

pub trait VoteLedger: Send + Sync {
    /// Records the vote, or fails with [`VoteError::AlreadyVoted`] without
    /// touching the existing one.
    fn cast_vote(&self, email: &str, candidate: &str) -> Result<Vote>;
    fn get_vote(&self, email: &str) -> Result<Option<Vote>>;
    /// All votes, newest first.
    fn list_votes(&self) -> Result<Vec<Vote>>;
}

pub struct FileVoteLedger {
    votes_dir: PathBuf,
}

impl FileVoteLedger {
    pub fn new_with_path(votes_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&votes_dir)?;
        Ok(Self { votes_dir })
    }

    fn file_name(email: &str) -> String {
        format!("{}.vote", email_key(email))
    }

    fn read_vote(path: &std::path::Path) -> Result<Vote> {
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| VoteError::Storage(format!("Failed to deserialize vote {:?}: {}", path, e)))
    }
}

impl VoteLedger for FileVoteLedger {
    fn cast_vote(&self, email: &str, candidate: &str) -> Result<Vote> {
        let vote = Vote::new(email, candidate)?;
        let encoded = bincode::serialize(&vote)
            .map_err(|e| VoteError::Storage(format!("Failed to serialize: {}", e)))?;

        if !publish_new(&self.votes_dir, &Self::file_name(&vote.email), &encoded)? {
            tracing::warn!("Rejected second vote from {}", vote.email);
            return Err(VoteError::AlreadyVoted(vote.email));
        }

        tracing::info!("Vote recorded for {}", vote.email);
        Ok(vote)
    }

    fn get_vote(&self, email: &str) -> Result<Option<Vote>> {
        let path = self.votes_dir.join(Self::file_name(email));
        if !path.exists() {
            return Ok(None);
        }
        Self::read_vote(&path).map(Some)
    }

    fn list_votes(&self) -> Result<Vec<Vote>> {
        let mut votes = Vec::new();
        for entry in fs::read_dir(&self.votes_dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "vote") {
                votes.push(Self::read_vote(&path)?);
            }
        }
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(votes)
    }
}

#[derive(Default)]
pub struct MemoryVoteLedger {
    votes: Mutex<HashMap<String, Vote>>,
}

impl MemoryVoteLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoteLedger for MemoryVoteLedger {
    fn cast_vote(&self, email: &str, candidate: &str) -> Result<Vote> {
        let vote = Vote::new(email, candidate)?;
        let mut votes = self.votes
            .lock()
            .map_err(|_| VoteError::Storage("vote ledger lock poisoned".into()))?;

        match votes.entry(email_key(&vote.email)) {
            Entry::Occupied(_) => Err(VoteError::AlreadyVoted(vote.email)),
            Entry::Vacant(slot) => Ok(slot.insert(vote).clone()),
        }
    }

    fn get_vote(&self, email: &str) -> Result<Option<Vote>> {
        let votes = self.votes
            .lock()
            .map_err(|_| VoteError::Storage("vote ledger lock poisoned".into()))?;
        Ok(votes.get(&email_key(email)).cloned())
    }

    fn list_votes(&self) -> Result<Vec<Vote>> {
        let votes = self.votes
            .lock()
            .map_err(|_| VoteError::Storage("vote ledger lock poisoned".into()))?;
        let mut list: Vec<Vote> = votes.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn second_vote_is_rejected(ledger: &dyn VoteLedger) {
        ledger.cast_vote("a@x.com", "Candidate A").unwrap();
        match ledger.cast_vote("a@x.com", "Candidate B") {
            Err(VoteError::AlreadyVoted(email)) => assert_eq!(email, "a@x.com"),
            other => panic!("expected already voted, got {:?}", other),
        }

        let votes = ledger.list_votes().unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].candidate, "Candidate A");
        assert_eq!(ledger.get_vote("A@x.com").unwrap().unwrap().candidate, "Candidate A");
    }

    fn concurrent_votes_record_once(ledger: Arc<dyn VoteLedger>) {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.cast_vote("race@x.com", &format!("Candidate {}", i)))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, VoteError::AlreadyVoted(_))));
        assert_eq!(ledger.list_votes().unwrap().len(), 1);
    }

    #[test]
    fn file_ledger_rejects_second_vote() {
        let dir = tempfile::tempdir().unwrap();
        second_vote_is_rejected(&FileVoteLedger::new_with_path(dir.path().to_path_buf()).unwrap());
    }

    #[test]
    fn memory_ledger_rejects_second_vote() {
        second_vote_is_rejected(&MemoryVoteLedger::new());
    }

    #[test]
    fn file_ledger_is_race_free() {
        let dir = tempfile::tempdir().unwrap();
        concurrent_votes_record_once(Arc::new(FileVoteLedger::new_with_path(dir.path().to_path_buf()).unwrap()));
    }

    #[test]
    fn memory_ledger_is_race_free() {
        concurrent_votes_record_once(Arc::new(MemoryVoteLedger::new()));
    }

    #[test]
    fn missing_fields_are_rejected_without_recording() {
        let ledger = MemoryVoteLedger::new();
        assert!(matches!(ledger.cast_vote("", "Candidate A"), Err(VoteError::MissingFields(_))));
        assert!(matches!(ledger.cast_vote("a@x.com", "  "), Err(VoteError::MissingFields(_))));
        assert!(ledger.list_votes().unwrap().is_empty());
    }
}
