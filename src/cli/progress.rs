use std::io::{self, Write};
use crossterm::{
    cursor,
    execute,
    style::Print,
    terminal::{self, ClearType},
};
use crate::core::{AbortReason, StepOutcome};

/// Text shown to the voter for a liveness step, if the step changes what
/// they should be told.
pub fn status_message(outcome: &StepOutcome, target: u32) -> Option<String> {
    match outcome {
        StepOutcome::NoFace => Some("No face detected. Please face the camera.".to_string()),
        StepOutcome::Tracking { blinks: 0 } => Some(format!("Blink {} times to prove liveness", target)),
        StepOutcome::Tracking { .. } => None,
        StepOutcome::Blink { remaining, .. } => Some(format!("Blink detected! {} left", remaining)),
        StepOutcome::BlinksComplete => Some("Blinks complete, checking face...".to_string()),
        StepOutcome::Passed => Some("Liveness passed".to_string()),
        StepOutcome::Aborted(AbortReason::DifferentFace { .. }) => {
            Some("Different face detected. Restart liveness.".to_string())
        }
        StepOutcome::Expired => Some("No face for too long. Liveness expired.".to_string()),
        StepOutcome::Finished => None,
    }
}

/// Single status line rewritten in place as liveness progresses.
pub struct LivenessProgress {
    target: u32,
    last: Option<String>,
    interactive: bool,
}

impl LivenessProgress {
    pub fn new(target: u32) -> Self {
        Self {
            target,
            last: None,
            interactive: terminal::size().is_ok(),
        }
    }

    pub fn update(&mut self, outcome: &StepOutcome) {
        let Some(message) = status_message(outcome, self.target) else {
            return;
        };
        if self.last.as_deref() == Some(message.as_str()) {
            return;
        }

        let mut stdout = io::stdout();
        if self.interactive {
            let _ = execute!(
                stdout,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print(&message)
            );
        } else {
            let _ = writeln!(stdout, "{}", message);
        }
        self.last = Some(message);
    }

    pub fn finish(&mut self) {
        if self.interactive && self.last.is_some() {
            println!();
        }
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_follow_the_challenge() {
        assert_eq!(
            status_message(&StepOutcome::Blink { count: 1, remaining: 2 }, 3).as_deref(),
            Some("Blink detected! 2 left")
        );
        assert_eq!(
            status_message(&StepOutcome::Tracking { blinks: 0 }, 3).as_deref(),
            Some("Blink 3 times to prove liveness")
        );
        assert!(status_message(&StepOutcome::Tracking { blinks: 1 }, 3).is_none());

        let abort = StepOutcome::Aborted(AbortReason::DifferentFace { distance: 0.9, threshold: 0.6 });
        assert_eq!(
            status_message(&abort, 3).as_deref(),
            Some("Different face detected. Restart liveness.")
        );
    }
}
