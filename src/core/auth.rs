use crate::{
    common::{Config, DataPaths, Result, VoteError},
    core::{
        descriptor::{match_descriptors, Descriptor, MatchResult},
        token::{TokenIssuer, VerificationToken},
    },
    storage::{
        normalize_email, Candidate, CandidateRepository, CandidateStore, CandidateUpdate,
        FileVoteLedger, Identity, IdentityRepository, IdentityStore, MemoryCandidateStore,
        MemoryIdentityStore, MemoryVoteLedger, Role, Vote, VoteLedger,
    },
};

/// Result of a trusted verification. The token is present only on a match.
#[derive(Debug, Clone)]
pub struct Verification {
    pub result: MatchResult,
    pub token: Option<VerificationToken>,
}

/// The trusted side of the voting flow.
///
/// Matching always uses the descriptor on file; no operation accepts a
/// match verdict or a reference descriptor from the caller.
pub struct VoterAuth {
    identities: Box<dyn IdentityRepository>,
    ledger: Box<dyn VoteLedger>,
    candidates: Box<dyn CandidateRepository>,
    tokens: TokenIssuer,
    config: Config,
}

impl VoterAuth {
    pub fn new(
        config: Config,
        identities: Box<dyn IdentityRepository>,
        ledger: Box<dyn VoteLedger>,
        candidates: Box<dyn CandidateRepository>,
    ) -> Self {
        Self {
            identities,
            ledger,
            candidates,
            tokens: TokenIssuer::new(&config.tokens),
            config,
        }
    }

    /// File-backed stores under `paths`.
    pub fn open(config: Config, paths: &DataPaths) -> Result<Self> {
        tracing::info!("Opening stores: identities={:?} votes={:?}", paths.identities_dir, paths.votes_dir);
        Ok(Self::new(
            config,
            Box::new(IdentityStore::new_with_path(paths.identities_dir.clone())?),
            Box::new(FileVoteLedger::new_with_path(paths.votes_dir.clone())?),
            Box::new(CandidateStore::new_with_path(paths.candidates_file.clone())?),
        ))
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Box::new(MemoryIdentityStore::new()),
            Box::new(MemoryVoteLedger::new()),
            Box::new(MemoryCandidateStore::new()),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn register(&self, email: &str, name: &str, role: Option<&str>, descriptor: Descriptor) -> Result<Role> {
        let email = require("email", email)?;
        let name = require("name", name)?;
        if !email.contains('@') {
            return Err(VoteError::InvalidInput(format!("not an email address: {}", email)));
        }
        descriptor.validate(self.config.matching.descriptor_length)?;

        let role = Role::parse_lenient(role);
        self.identities.insert(&Identity::new(email, name, role, descriptor))?;

        tracing::info!("Registered {} as {}", normalize_email(email), role);
        Ok(role)
    }

    /// Email-only login; a supplied role must match the account's.
    pub fn login(&self, email: &str, role: Option<&str>) -> Result<Identity> {
        let identity = self.identities.get(require("email", email)?)?;

        if let Some(requested) = role.filter(|r| !r.trim().is_empty()) {
            if Role::parse_lenient(Some(requested)) != identity.role {
                return Err(VoteError::RoleMismatch { current: identity.role.to_string() });
            }
        }
        Ok(identity)
    }

    pub fn verify(&self, email: &str, descriptor: &Descriptor) -> Result<Verification> {
        let identity = self.identities.get(require("email", email)?)?;
        let stored = identity
            .descriptor
            .as_ref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| VoteError::NoDescriptorOnFile(identity.email.clone()))?;

        let expected = self.config.matching.descriptor_length;
        if stored.len() != expected {
            tracing::error!(
                "Stored descriptor for {} has {} values, system expects {}",
                identity.email,
                stored.len(),
                expected
            );
            return Err(VoteError::Storage(format!(
                "descriptor on file for {} has {} values, expected {}",
                identity.email,
                stored.len(),
                expected
            )));
        }

        descriptor.validate(expected)?;
        let result = match_descriptors(stored, descriptor, self.config.matching.threshold)?;

        tracing::info!(
            "Verification for {}: distance {:.3} {} threshold {:.2}",
            identity.email,
            result.distance,
            if result.is_match { "<" } else { ">=" },
            result.threshold
        );

        let token = if result.is_match {
            Some(self.tokens.issue(&identity.email)?)
        } else {
            None
        };
        Ok(Verification { result, token })
    }

    pub fn cast_vote(&self, email: &str, candidate: &str, token: &VerificationToken) -> Result<Vote> {
        if email.trim().is_empty() || candidate.trim().is_empty() {
            return Err(VoteError::MissingFields("email and candidate required".to_string()));
        }
        self.tokens.check(token, email)?;

        let candidate = self
            .candidates
            .find(candidate)?
            .ok_or_else(|| VoteError::UnknownCandidate(candidate.trim().to_string()))?;

        self.ledger.cast_vote(email, &candidate.name)
    }

    pub fn has_voted(&self, email: &str) -> Result<bool> {
        Ok(self.ledger.get_vote(email)?.is_some())
    }

    pub fn list_candidates(&self) -> Result<Vec<Candidate>> {
        self.candidates.list()
    }

    pub fn upsert_candidate(&self, admin_email: &str, update: CandidateUpdate) -> Result<Candidate> {
        self.require_admin(admin_email)?;
        self.candidates.upsert(update)
    }

    pub fn list_votes(&self, admin_email: &str) -> Result<Vec<Vote>> {
        self.require_admin(admin_email)?;
        self.ledger.list_votes()
    }

    fn require_admin(&self, email: &str) -> Result<()> {
        match self.identities.get(require("admin email", email)?) {
            Ok(identity) if identity.role == Role::Admin => Ok(()),
            Ok(identity) => Err(VoteError::Forbidden(format!("{} is not an admin", identity.email))),
            Err(VoteError::UnknownEmail(email)) => Err(VoteError::Forbidden(format!("{} is not an admin", email))),
            Err(e) => Err(e),
        }
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VoteError::MissingFields(format!("{} required", field)));
    }
    Ok(value)
}
