use std::path::PathBuf;
use std::fs;
use crate::common::error::Result;
use crate::common::paths::DataPaths;

/// Development mode keeps every artefact under `./dev_data` so the service
/// and CLI can be exercised without touching system directories.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("config"))?;
            tracing::info!("Development mode enabled - data will be saved to: {}", base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn base_dir(&self) -> Option<&PathBuf> {
        self.enabled.then_some(&self.base_dir)
    }

    /// Storage layout rooted in the dev directory, if dev mode is on.
    pub fn data_paths(&self) -> Option<DataPaths> {
        self.base_dir().map(|base| DataPaths::under(base))
    }

    pub fn config_file(&self) -> PathBuf {
        if self.enabled {
            self.base_dir.join("config").join("face-vote.toml")
        } else {
            PathBuf::from("configs/face-vote.toml")
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        if self.enabled {
            PathBuf::from(crate::service::protocol::DEV_SOCKET_PATH)
        } else {
            crate::common::paths::system_socket_path()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mode_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("dev");
        let dev = DevMode::with_base_dir(false, base.clone()).unwrap();
        assert!(!dev.is_enabled());
        assert!(dev.data_paths().is_none());
        assert!(!base.exists());
    }

    #[test]
    fn enabled_mode_roots_storage_in_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dev = DevMode::with_base_dir(true, dir.path().to_path_buf()).unwrap();
        let paths = dev.data_paths().unwrap();
        assert!(paths.identities_dir.starts_with(dir.path()));
        assert_eq!(dev.config_file(), dir.path().join("config").join("face-vote.toml"));
    }
}
