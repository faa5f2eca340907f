use face_vote::{
    cli::{load_descriptor, FlowOutcome, LivenessProgress, VerificationFlow},
    common::{Config, DevMode},
    core::{ReplayClassifier, VerificationToken},
    storage::CandidateUpdate,
    ServiceClient,
};

use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facevote")]
#[command(about = "Face-verified voting client")]
struct Cli {
    /// Enable development mode (talks to the dev service, reads ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Service socket (overrides the mode default)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a voter with a reference face descriptor
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        name: String,
        /// "admin" or "user" (default)
        #[arg(short, long)]
        role: Option<String>,
        /// JSON file holding the descriptor as an array of numbers
        #[arg(short, long)]
        descriptor: PathBuf,
    },
    /// Log in by email
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        role: Option<String>,
    },
    /// Match a single descriptor against the account, without liveness
    Verify {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        descriptor: PathBuf,
        /// Write the verification token here on a match
        #[arg(long)]
        token_out: Option<PathBuf>,
    },
    /// Full face verification: pre-match, blink challenge, final match
    Liveness {
        #[arg(short, long)]
        email: String,
        /// Recorded classifier output, one JSON frame per line
        #[arg(short, long)]
        frames: PathBuf,
        /// Liveness attempts allowed after a different face aborts one
        #[arg(long, default_value = "1")]
        attempts: u32,
        /// Write the verification token here on success
        #[arg(long)]
        token_out: Option<PathBuf>,
        /// Cast a vote for this candidate once verified
        #[arg(long)]
        vote: Option<String>,
    },
    /// Cast a vote with a previously issued token
    Vote {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        candidate: String,
        #[arg(short, long)]
        token: PathBuf,
    },
    /// List or edit candidates
    Candidates {
        #[command(subcommand)]
        command: Option<CandidateCommands>,
    },
    /// List all votes (admin only)
    Votes {
        #[arg(short, long)]
        admin: String,
    },
    /// Check that the service is up
    Health,
}

#[derive(Subcommand)]
enum CandidateCommands {
    /// List candidates
    List,
    /// Create a candidate, or replace one when --id is given (admin only)
    Upsert {
        #[arg(short, long)]
        admin: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        party: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        image_url: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let client = match &cli.socket {
        Some(path) => ServiceClient::with_socket(path),
        None => ServiceClient::with_socket(dev_mode.socket_path()),
    };

    match cli.command {
        Commands::Register { email, name, role, descriptor } => {
            let descriptor = load_descriptor(&descriptor)?;
            let role = client.register(&email, &name, role.as_deref(), descriptor)?;
            println!("✅ Registered {} as {}", email, role);
        }
        Commands::Login { email, role } => {
            let login = client.login(&email, role.as_deref())?;
            println!("Logged in as {} <{}> ({})", login.name, login.email, login.role);
        }
        Commands::Verify { email, descriptor, token_out } => {
            let descriptor = load_descriptor(&descriptor)?;
            let verified = client.verify(&email, &descriptor)?;
            println!(
                "Distance {:.4} (threshold {:.2}): {}",
                verified.result.distance,
                verified.result.threshold,
                if verified.result.is_match { "MATCH" } else { "NO MATCH" }
            );
            if let (Some(token), Some(path)) = (verified.token, token_out) {
                save_token(&path, &token)?;
            }
        }
        Commands::Liveness { email, frames, attempts, token_out, vote } => {
            let config = Config::load_or_default(&dev_mode.config_file())?;
            let mut classifier = ReplayClassifier::open(&frames)?;
            let mut progress = LivenessProgress::new(config.liveness.blink_target);

            let outcome = VerificationFlow::new(&client, &config.liveness)
                .with_attempts(attempts)
                .run(&email, &mut classifier, |step| progress.update(step))?;
            progress.finish();

            match outcome {
                FlowOutcome::Verified { token, result } => {
                    println!("✅ Face verified (distance {:.4})", result.distance);
                    if let Some(path) = token_out {
                        save_token(&path, &token)?;
                    }
                    if let Some(candidate) = vote {
                        let recorded = client.cast_vote(&email, &candidate, &token)?;
                        println!("🗳️  Vote recorded for {}", recorded.candidate);
                    }
                }
                FlowOutcome::NoMatch { result } => {
                    println!(
                        "❌ Face does not match (distance {:.4}, threshold {:.2})",
                        result.distance, result.threshold
                    );
                    std::process::exit(1);
                }
                FlowOutcome::LivenessFailed { report } => {
                    println!(
                        "❌ Liveness failed: {:?} after {} frames ({} blinks{})",
                        report.state,
                        report.frames,
                        report.blinks,
                        if report.timed_out { ", timed out" } else { "" }
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::Vote { email, candidate, token } => {
            let token = load_token(&token)?;
            let recorded = client.cast_vote(&email, &candidate, &token)?;
            println!("🗳️  Vote recorded for {}", recorded.candidate);
        }
        Commands::Candidates { command } => match command.unwrap_or(CandidateCommands::List) {
            CandidateCommands::List => {
                let candidates = client.candidates()?;
                if candidates.is_empty() {
                    println!("No candidates yet");
                }
                for c in candidates {
                    println!("{}  {} ({})", c.id, c.name, c.party);
                    if !c.description.is_empty() {
                        println!("    {}", c.description);
                    }
                }
            }
            CandidateCommands::Upsert { admin, id, name, party, description, image_url } => {
                let saved = client.upsert_candidate(&admin, CandidateUpdate {
                    id,
                    name,
                    party,
                    description,
                    image_url,
                })?;
                println!("✅ Saved {} ({})", saved.name, saved.id);
            }
        },
        Commands::Votes { admin } => {
            for vote in client.votes(&admin)? {
                println!("{}  {}  {}", vote.created_at.format("%Y-%m-%d %H:%M:%S"), vote.email, vote.candidate);
            }
        }
        Commands::Health => {
            let version = client.health()?;
            println!("Service at {} is up (version {})", client.socket_path().display(), version);
        }
    }

    Ok(())
}

fn save_token(path: &Path, token: &VerificationToken) -> Result<()> {
    let json = serde_json::to_string_pretty(token)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write token to {}", path.display()))?;
    match token.expires_at() {
        Some(expires) => println!("Token saved to {} (valid until {})", path.display(), expires.format("%H:%M:%S UTC")),
        None => println!("Token saved to {}", path.display()),
    }
    Ok(())
}

fn load_token(path: &Path) -> Result<VerificationToken> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token from {}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::WARN)
            .init();
    }
}
