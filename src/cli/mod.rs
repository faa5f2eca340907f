pub mod flow;
pub mod progress;

pub use flow::{FlowOutcome, VerificationFlow, Verifier};
pub use progress::{status_message, LivenessProgress};

use std::path::Path;
use crate::common::{VoteError, Result};
use crate::core::Descriptor;

/// Reads a descriptor saved as a JSON array of numbers.
pub fn load_descriptor(path: &Path) -> Result<Descriptor> {
    let contents = std::fs::read_to_string(path)?;
    let values: Vec<f32> = serde_json::from_str(&contents).map_err(|e| {
        VoteError::InvalidInput(format!("{} is not a descriptor: {}", path.display(), e))
    })?;
    Ok(Descriptor::new(values))
}
