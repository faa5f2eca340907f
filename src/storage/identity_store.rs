use crate::common::{VoteError, Result};
use crate::core::descriptor::Descriptor;
use crate::storage::{email_key, normalize_email, publish_new};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::fs;
use std::sync::Mutex;
use serde::{Serialize, Deserialize};

const STORAGE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Anything other than "admin" registers as a plain user.
    pub fn parse_lenient(role: Option<&str>) -> Self {
        match role.map(|r| r.trim().to_lowercase()) {
            Some(r) if r == "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Identity {
    pub version: u32,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// `None` only for records written without face data.
    pub descriptor: Option<Descriptor>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(email: &str, name: &str, role: Role, descriptor: Descriptor) -> Self {
        Self {
            version: STORAGE_VERSION,
            email: normalize_email(email),
            name: name.trim().to_string(),
            role,
            descriptor: Some(descriptor),
            created_at: Utc::now(),
        }
    }
}

/// Registered identities keyed by email. `insert` must fail with
/// [`VoteError::DuplicateEmail`] if the email is already present, even when
/// two registrations race.
pub trait IdentityRepository: Send + Sync {
    fn insert(&self, identity: &Identity) -> Result<()>;
    fn get(&self, email: &str) -> Result<Identity>;
}

/// One bincode file per identity, named by the email key.
pub struct IdentityStore {
    data_dir: PathBuf,
}

impl IdentityStore {
    pub fn new_with_path(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn file_name(email: &str) -> String {
        format!("{}.bincode", email_key(email))
    }
}

impl IdentityRepository for IdentityStore {
    fn insert(&self, identity: &Identity) -> Result<()> {
        let encoded = bincode::serialize(identity)
            .map_err(|e| VoteError::Storage(format!("Failed to serialize: {}", e)))?;

        if !publish_new(&self.data_dir, &Self::file_name(&identity.email), &encoded)? {
            return Err(VoteError::DuplicateEmail(identity.email.clone()));
        }
        tracing::debug!("Stored identity for {}", identity.email);
        Ok(())
    }

    fn get(&self, email: &str) -> Result<Identity> {
        let user_file = self.data_dir.join(Self::file_name(email));

        if !user_file.exists() {
            return Err(VoteError::UnknownEmail(normalize_email(email)));
        }

        let data = fs::read(user_file)?;
        let mut identity: Identity = bincode::deserialize(&data)
            .map_err(|e| VoteError::Storage(format!("Failed to deserialize: {}", e)))?;

        // Handle version migration if needed
        if identity.version < STORAGE_VERSION {
            identity.version = STORAGE_VERSION;
        }

        Ok(identity)
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: Mutex<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityRepository for MemoryIdentityStore {
    fn insert(&self, identity: &Identity) -> Result<()> {
        let mut identities = self.identities
            .lock()
            .map_err(|_| VoteError::Storage("identity store lock poisoned".into()))?;

        match identities.entry(email_key(&identity.email)) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(VoteError::DuplicateEmail(identity.email.clone()))
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(identity.clone());
                Ok(())
            }
        }
    }

    fn get(&self, email: &str) -> Result<Identity> {
        let identities = self.identities
            .lock()
            .map_err(|_| VoteError::Storage("identity store lock poisoned".into()))?;

        identities
            .get(&email_key(email))
            .cloned()
            .ok_or_else(|| VoteError::UnknownEmail(normalize_email(email)))
    }
}
