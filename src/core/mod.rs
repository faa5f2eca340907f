pub mod auth;
pub mod classifier;
pub mod descriptor;
pub mod driver;
pub mod guard;
pub mod liveness;
pub mod session;
pub mod token;

pub use auth::{Verification, VoterAuth};
pub use classifier::{FrameClassifier, FrameObservation, ReplayClassifier};
pub use descriptor::{euclidean_distance, match_descriptors, Descriptor, MatchResult};
pub use driver::{LivenessDriver, LivenessReport};
pub use guard::{FaceCheck, FaceCheckJob, GuardVerdict, SameFaceGuard};
pub use liveness::{BlinkDetector, BlinkEvent, BlinkScores, EyePhase};
pub use session::{AbortReason, LivenessSession, LivenessState, StepOutcome};
pub use token::{TokenIssuer, VerificationToken};
