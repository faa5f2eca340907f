use crate::common::config::LivenessConfig;
use crate::core::classifier::FrameObservation;
use crate::core::descriptor::Descriptor;
use crate::core::guard::{FaceCheck, FaceCheckJob, GuardVerdict, SameFaceGuard};
use crate::core::liveness::{BlinkDetector, BlinkEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbortReason {
    DifferentFace { distance: f32, threshold: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LivenessState {
    Running,
    /// Blink target reached while same-face checks may still be in flight.
    BlinksComplete,
    Passed,
    Aborted(AbortReason),
    /// No face seen for longer than the idle timeout.
    Expired,
}

impl LivenessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Aborted(_) | Self::Expired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    NoFace,
    Tracking { blinks: u32 },
    Blink { count: u32, remaining: u32 },
    BlinksComplete,
    Passed,
    Aborted(AbortReason),
    Expired,
    /// The session had already ended; the input was ignored.
    Finished,
}

/// State of one liveness attempt.
///
/// Every step consumes the session and hands back its successor, so the
/// frame loop owns the only copy and nothing is shared between frames.
/// An aborted or expired session stays that way; callers start over with
/// [`LivenessSession::restart`], which drops the blink count and the
/// same-face reference.
#[derive(Debug, Clone)]
pub struct LivenessSession {
    config: LivenessConfig,
    blinks: BlinkDetector,
    guard: SameFaceGuard,
    state: LivenessState,
    last_face_at_ms: u64,
}

impl LivenessSession {
    pub fn new(config: &LivenessConfig, now_ms: u64) -> Self {
        Self {
            config: config.clone(),
            blinks: BlinkDetector::new(config),
            guard: SameFaceGuard::new(config.same_face_threshold),
            state: LivenessState::Running,
            last_face_at_ms: now_ms,
        }
    }

    /// Session whose same-face reference is the descriptor already matched
    /// against the account before liveness started.
    pub fn with_reference(config: &LivenessConfig, reference: Descriptor, now_ms: u64) -> Self {
        Self {
            guard: SameFaceGuard::with_reference(config.same_face_threshold, reference),
            ..Self::new(config, now_ms)
        }
    }

    pub fn restart(self, now_ms: u64) -> Self {
        tracing::info!("Restarting liveness session ({} blinks discarded)", self.blinks.count());
        Self::new(&self.config, now_ms)
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    pub fn blink_count(&self) -> u32 {
        self.blinks.count()
    }

    pub fn blink_target(&self) -> u32 {
        self.blinks.target()
    }

    pub fn reference(&self) -> Option<&Descriptor> {
        self.guard.reference()
    }

    /// Synchronous step: the same-face check runs inline before the blink
    /// counter sees the frame.
    pub fn step(mut self, frame: &FrameObservation, seq: u64) -> (Self, StepOutcome) {
        if self.state.is_terminal() {
            return (self, StepOutcome::Finished);
        }
        if let Some(outcome) = self.touch(frame) {
            return (self, outcome);
        }

        if let Some(descriptor) = &frame.descriptor {
            if let GuardVerdict::DifferentFace { distance } = self.guard.observe(seq, descriptor) {
                return self.abort(distance);
            }
        }

        let outcome = self.count_blinks(frame);
        if outcome == StepOutcome::BlinksComplete {
            return self.settle();
        }
        (self, outcome)
    }

    /// Blink step only; the same-face check is handed back as a job to be
    /// run elsewhere and fed in through [`LivenessSession::apply_face_check`].
    pub fn step_deferred(mut self, frame: &FrameObservation, seq: u64) -> (Self, StepOutcome, Option<FaceCheckJob>) {
        if self.state != LivenessState::Running {
            return (self, StepOutcome::Finished, None);
        }
        if let Some(outcome) = self.touch(frame) {
            return (self, outcome, None);
        }

        let job = frame
            .descriptor
            .as_ref()
            .and_then(|descriptor| self.guard.prepare(seq, descriptor));
        let outcome = self.count_blinks(frame);
        (self, outcome, job)
    }

    pub fn apply_face_check(mut self, check: FaceCheck) -> (Self, StepOutcome) {
        match self.state {
            LivenessState::Running | LivenessState::BlinksComplete => {}
            _ => return (self, StepOutcome::Finished),
        }

        match self.guard.apply(check) {
            GuardVerdict::DifferentFace { distance } => self.abort(distance),
            _ if self.state == LivenessState::BlinksComplete => (self, StepOutcome::BlinksComplete),
            _ => {
                let blinks = self.blinks.count();
                (self, StepOutcome::Tracking { blinks })
            }
        }
    }

    /// Promotes a completed blink challenge to `Passed`. Call only once no
    /// same-face checks are outstanding.
    pub fn settle(mut self) -> (Self, StepOutcome) {
        match self.state {
            LivenessState::BlinksComplete => {
                self.state = LivenessState::Passed;
                tracing::info!("Liveness passed with {} blinks", self.blinks.count());
                (self, StepOutcome::Passed)
            }
            LivenessState::Passed => (self, StepOutcome::Passed),
            _ => (self, StepOutcome::Finished),
        }
    }

    /// Tracks face presence. Returns an outcome when the frame ends the step
    /// early: no face, or the idle timeout ran out.
    fn touch(&mut self, frame: &FrameObservation) -> Option<StepOutcome> {
        if frame.has_face() {
            self.last_face_at_ms = self.last_face_at_ms.max(frame.timestamp_ms);
            return None;
        }

        let idle_ms = frame.timestamp_ms.saturating_sub(self.last_face_at_ms);
        if idle_ms > self.config.idle_timeout_seconds * 1000 {
            tracing::info!("Liveness session expired after {}ms without a face", idle_ms);
            self.state = LivenessState::Expired;
            return Some(StepOutcome::Expired);
        }
        Some(StepOutcome::NoFace)
    }

    fn count_blinks(&mut self, frame: &FrameObservation) -> StepOutcome {
        let Some(scores) = frame.blink else {
            return StepOutcome::Tracking { blinks: self.blinks.count() };
        };

        match self.blinks.observe(scores, frame.timestamp_ms) {
            BlinkEvent::None => StepOutcome::Tracking { blinks: self.blinks.count() },
            BlinkEvent::Blink { count, remaining } => {
                tracing::debug!("Blink {} detected, {} left", count, remaining);
                StepOutcome::Blink { count, remaining }
            }
            BlinkEvent::Complete { .. } => {
                self.state = LivenessState::BlinksComplete;
                StepOutcome::BlinksComplete
            }
        }
    }

    fn abort(mut self, distance: f32) -> (Self, StepOutcome) {
        let reason = AbortReason::DifferentFace {
            distance,
            threshold: self.guard.threshold(),
        };
        self.state = LivenessState::Aborted(reason);
        (self, StepOutcome::Aborted(reason))
    }
}
