// Core modules
pub mod common;
pub mod core;
pub mod storage;
pub mod service;
pub mod cli;

// Re-export commonly used types
pub use crate::common::{Config, DevMode, VoteError, Result};
pub use crate::core::{
    Descriptor, FrameClassifier, FrameObservation, LivenessDriver, LivenessSession, LivenessState,
    MatchResult, VerificationToken, VoterAuth,
};
pub use crate::storage::{Candidate, Role, Vote};
pub use crate::service::{ServiceClient, protocol};
