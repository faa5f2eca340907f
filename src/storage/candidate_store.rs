use crate::common::{VoteError, Result};
use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub party: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub updated_at: DateTime<Utc>,
}

/// Create (no `id`) or replace (existing `id`) a candidate.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CandidateUpdate {
    pub id: Option<String>,
    pub name: String,
    pub party: String,
    pub description: String,
    pub image_url: String,
}

pub trait CandidateRepository: Send + Sync {
    /// All candidates sorted by name.
    fn list(&self) -> Result<Vec<Candidate>>;
    fn upsert(&self, update: CandidateUpdate) -> Result<Candidate>;

    /// Looks a candidate up by id, or by exact name.
    fn find(&self, key: &str) -> Result<Option<Candidate>> {
        let key = key.trim();
        Ok(self
            .list()?
            .into_iter()
            .find(|c| c.id == key || c.name == key))
    }
}

fn apply_upsert(candidates: &mut Vec<Candidate>, update: CandidateUpdate) -> Result<Candidate> {
    let name = update.name.trim();
    let party = update.party.trim();
    if name.is_empty() || party.is_empty() {
        return Err(VoteError::MissingFields("name and party required".to_string()));
    }

    let candidate = Candidate {
        id: String::new(),
        name: name.to_string(),
        party: party.to_string(),
        description: update.description.trim().to_string(),
        image_url: update.image_url.trim().to_string(),
        updated_at: Utc::now(),
    };

    let candidate = match update.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            let slot = candidates
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| VoteError::UnknownCandidate(id.to_string()))?;
            *slot = Candidate { id: id.to_string(), ..candidate };
            slot.clone()
        }
        None => {
            let id = format!("{:016x}", thread_rng().gen::<u64>());
            let created = Candidate { id, ..candidate };
            candidates.push(created.clone());
            created
        }
    };

    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidate)
}

/// Candidates kept in a single JSON file.
pub struct CandidateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CandidateStore {
    pub fn new_with_path(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path, lock: Mutex::new(()) })
    }

    fn load(&self) -> Result<Vec<Candidate>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| VoteError::Storage(format!("Failed to parse {:?}: {}", self.path, e)))
    }

    fn save(&self, candidates: &[Candidate]) -> Result<()> {
        let json = serde_json::to_string_pretty(candidates)
            .map_err(|e| VoteError::Storage(format!("Failed to serialize candidates: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CandidateRepository for CandidateStore {
    fn list(&self) -> Result<Vec<Candidate>> {
        let _guard = self.lock
            .lock()
            .map_err(|_| VoteError::Storage("candidate store lock poisoned".into()))?;
        let mut candidates = self.load()?;
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(candidates)
    }

    fn upsert(&self, update: CandidateUpdate) -> Result<Candidate> {
        let _guard = self.lock
            .lock()
            .map_err(|_| VoteError::Storage("candidate store lock poisoned".into()))?;
        let mut candidates = self.load()?;
        let candidate = apply_upsert(&mut candidates, update)?;
        self.save(&candidates)?;
        tracing::info!("Saved candidate {} ({})", candidate.name, candidate.id);
        Ok(candidate)
    }
}

#[derive(Default)]
pub struct MemoryCandidateStore {
    candidates: Mutex<Vec<Candidate>>,
}

impl MemoryCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CandidateRepository for MemoryCandidateStore {
    fn list(&self) -> Result<Vec<Candidate>> {
        let candidates = self.candidates
            .lock()
            .map_err(|_| VoteError::Storage("candidate store lock poisoned".into()))?;
        Ok(candidates.clone())
    }

    fn upsert(&self, update: CandidateUpdate) -> Result<Candidate> {
        let mut candidates = self.candidates
            .lock()
            .map_err(|_| VoteError::Storage("candidate store lock poisoned".into()))?;
        apply_upsert(&mut candidates, update)
    }
}
