pub mod config;
pub mod dev_mode;
pub mod error;
pub mod paths;

pub use config::{Config, LivenessConfig, MatchingConfig, TokenConfig};
pub use dev_mode::DevMode;
pub use error::{VoteError, Result};
pub use paths::{DataPaths, system_data_dir, system_config_file, system_socket_path, user_data_dir};
