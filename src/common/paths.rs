use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use crate::common::error::{VoteError, Result};

pub fn system_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/facevote")
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/facevote/face-vote.toml")
}

pub fn system_socket_path() -> PathBuf {
    PathBuf::from(crate::service::protocol::SOCKET_PATH)
}

/// Per-user data directory, used when neither dev mode nor an explicit
/// data directory applies.
pub fn user_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "facevote", "FaceVote")
        .ok_or_else(|| VoteError::Storage("Failed to get project dirs".into()))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// On-disk layout of the stores.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub identities_dir: PathBuf,
    pub votes_dir: PathBuf,
    pub candidates_file: PathBuf,
}

impl DataPaths {
    pub fn under(base: &Path) -> Self {
        Self {
            identities_dir: base.join("identities"),
            votes_dir: base.join("votes"),
            candidates_file: base.join("candidates.json"),
        }
    }
}
