use crate::common::{LivenessConfig, Result, VoteError};
use crate::core::{
    Descriptor, FrameClassifier, LivenessDriver, LivenessReport, LivenessSession, LivenessState,
    MatchResult, StepOutcome, VerificationToken, VoterAuth,
};
use crate::service::protocol::VerifyResponse;
use crate::service::ServiceClient;

/// Whatever answers "does this descriptor belong to this email". The CLI
/// talks to the service; tests and single-process setups use [`VoterAuth`].
pub trait Verifier {
    fn verify(&self, email: &str, descriptor: &Descriptor) -> Result<VerifyResponse>;
}

impl Verifier for ServiceClient {
    fn verify(&self, email: &str, descriptor: &Descriptor) -> Result<VerifyResponse> {
        ServiceClient::verify(self, email, descriptor)
    }
}

impl Verifier for VoterAuth {
    fn verify(&self, email: &str, descriptor: &Descriptor) -> Result<VerifyResponse> {
        let verification = VoterAuth::verify(self, email, descriptor)?;
        Ok(VerifyResponse { result: verification.result, token: verification.token })
    }
}

#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// Pre-match, liveness and the final match all passed.
    Verified { token: VerificationToken, result: MatchResult },
    /// The face did not match the account, before or after liveness.
    NoMatch { result: MatchResult },
    /// Liveness ended without passing.
    LivenessFailed { report: LivenessReport },
}

/// Face verification as the voter's device runs it: match one snapshot
/// against the account, run the blink challenge with that snapshot as the
/// same-face reference, then match the last live descriptor again. Only the
/// final match yields a token.
pub struct VerificationFlow<'a, V: Verifier + ?Sized> {
    verifier: &'a V,
    config: LivenessConfig,
    attempts: u32,
}

impl<'a, V: Verifier + ?Sized> VerificationFlow<'a, V> {
    pub fn new(verifier: &'a V, config: &LivenessConfig) -> Self {
        Self { verifier, config: config.clone(), attempts: 1 }
    }

    /// Number of liveness attempts allowed after a different face aborts one.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn run<C, F>(&self, email: &str, classifier: &mut C, mut observer: F) -> Result<FlowOutcome>
    where
        C: FrameClassifier + ?Sized,
        F: FnMut(&StepOutcome),
    {
        let driver = LivenessDriver::new(&self.config);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (snapshot, started_at_ms) = first_descriptor(&mut *classifier)?;

            let pre = self.verifier.verify(email, &snapshot)?;
            if !pre.result.is_match {
                tracing::info!("Pre-match failed for {} (distance {:.3})", email, pre.result.distance);
                return Ok(FlowOutcome::NoMatch { result: pre.result });
            }

            let session = LivenessSession::with_reference(&self.config, snapshot.clone(), started_at_ms);
            let (_, report) = driver.run(&mut *classifier, session, &mut observer)?;

            match report.state {
                LivenessState::Passed => {
                    let live = report.last_descriptor.as_ref().unwrap_or(&snapshot);
                    let fin = self.verifier.verify(email, live)?;
                    return Ok(match fin.token {
                        Some(token) if fin.result.is_match => FlowOutcome::Verified { token, result: fin.result },
                        _ => FlowOutcome::NoMatch { result: fin.result },
                    });
                }
                LivenessState::Aborted(_) if attempt < self.attempts => {
                    tracing::info!("Liveness attempt {} aborted, restarting", attempt);
                }
                _ => return Ok(FlowOutcome::LivenessFailed { report }),
            }
        }
    }
}

fn first_descriptor<C: FrameClassifier + ?Sized>(classifier: &mut C) -> Result<(Descriptor, u64)> {
    while let Some(frame) = classifier.next_frame()? {
        if let Some(descriptor) = frame.descriptor {
            return Ok((descriptor, frame.timestamp_ms));
        }
    }
    Err(VoteError::InvalidInput("no face found in the frame stream".to_string()))
}
