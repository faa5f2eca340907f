use face_vote::{
    common::{system_config_file, system_data_dir, user_data_dir, Config, DataPaths, DevMode},
    core::VoterAuth,
    service::serve,
};
use clap::Parser;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::fs;
use std::sync::Arc;
use anyhow::{Context as _, Result};

#[derive(Parser, Debug)]
#[command(name = "facevote-service")]
#[command(about = "Face-verified voting service")]
struct Args {
    /// Run in development mode
    #[arg(long)]
    dev: bool,

    /// Socket path in dev mode
    #[arg(long, default_value = face_vote::protocol::DEV_SOCKET_PATH)]
    dev_socket: String,

    /// Data directory (overrides config and mode defaults)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Config file (overrides mode default)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    if args.dev {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!("Starting facevote service (dev_mode: {})", args.dev);

    let dev_mode = DevMode::new(args.dev)?;
    let config_path = args.config.clone().unwrap_or_else(|| {
        if args.dev { dev_mode.config_file() } else { system_config_file() }
    });
    let config = Config::load_or_default(&config_path)?;

    let data_root = resolve_data_root(&args, &dev_mode, &config)?;
    tracing::info!("Data directory: {}", data_root.display());
    let auth = Arc::new(VoterAuth::open(config, &DataPaths::under(&data_root))?);

    let socket_path = if args.dev {
        PathBuf::from(&args.dev_socket)
    } else {
        dev_mode.socket_path()
    };
    let listener = bind_socket(&socket_path)?;
    tracing::info!("Listening on {}", socket_path.display());

    serve(listener, auth)?;
    Ok(())
}

/// Explicit flag, then dev dir, then config, then the system directory when
/// it is writable, then the per-user data directory.
fn resolve_data_root(args: &Args, dev_mode: &DevMode, config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &args.data_dir {
        return Ok(dir.clone());
    }
    if let Some(dir) = dev_mode.base_dir() {
        return Ok(dir.clone());
    }
    if let Some(dir) = &config.storage.data_dir {
        return Ok(dir.clone());
    }

    let system = system_data_dir();
    if fs::create_dir_all(&system).is_ok() {
        return Ok(system);
    }
    tracing::warn!("Cannot use {}, falling back to the user data directory", system.display());
    Ok(user_data_dir()?)
}

fn bind_socket(socket_path: &Path) -> Result<UnixListener> {
    // Clean up old socket if exists
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }

    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket {}", socket_path.display()))?;

    // Any local user may connect; every request is checked on its own
    fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666))?;
    Ok(listener)
}
