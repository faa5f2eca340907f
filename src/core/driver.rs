use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use crate::common::config::LivenessConfig;
use crate::common::error::{VoteError, Result};
use crate::core::classifier::FrameClassifier;
use crate::core::descriptor::Descriptor;
use crate::core::guard::{FaceCheck, FaceCheckJob};
use crate::core::session::{LivenessSession, LivenessState, StepOutcome};

#[derive(Debug, Clone)]
pub struct LivenessReport {
    pub state: LivenessState,
    pub blinks: u32,
    pub frames: u64,
    pub timed_out: bool,
    /// Most recent descriptor seen during the session.
    pub last_descriptor: Option<Descriptor>,
}

impl LivenessReport {
    pub fn passed(&self) -> bool {
        self.state == LivenessState::Passed
    }
}

/// Runs a liveness session against a frame source.
///
/// Each tick pulls one frame and feeds it to the blink counter. Same-face
/// checks go to a single worker thread in frame order and their results are
/// applied on later ticks. When the blink target is reached the driver stops
/// pulling frames, waits for every queued check, and only then settles the
/// session, so a mismatch from an earlier frame still aborts it.
pub struct LivenessDriver {
    timeout: Duration,
}

impl LivenessDriver {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    pub fn run<C, F>(
        &self,
        classifier: &mut C,
        session: LivenessSession,
        mut observer: F,
    ) -> Result<(LivenessSession, LivenessReport)>
    where
        C: FrameClassifier + ?Sized,
        F: FnMut(&StepOutcome),
    {
        let (job_tx, job_rx) = mpsc::channel::<FaceCheckJob>();
        let (check_tx, check_rx) = mpsc::channel::<FaceCheck>();

        let worker = thread::Builder::new()
            .name("same-face-check".to_string())
            .spawn(move || {
                for job in job_rx {
                    if let Some(check) = job.run() {
                        if check_tx.send(check).is_err() {
                            break;
                        }
                    }
                }
            })?;

        let start = Instant::now();
        let mut session = session;
        let mut frames = 0u64;
        let mut timed_out = false;
        let mut last_descriptor = None;

        loop {
            while let Ok(check) = check_rx.try_recv() {
                let (next, outcome) = session.apply_face_check(check);
                session = next;
                observer(&outcome);
            }
            if session.state() != LivenessState::Running {
                break;
            }

            if start.elapsed() > self.timeout {
                tracing::warn!("Liveness timeout after {} frames", frames);
                timed_out = true;
                break;
            }

            let frame = match classifier.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!("Frame source ended after {} frames", frames);
                    break;
                }
                Err(e) => {
                    drop(job_tx);
                    let _ = worker.join();
                    return Err(e);
                }
            };
            frames += 1;

            if frame.descriptor.is_some() {
                last_descriptor = frame.descriptor.clone();
            }

            let (next, outcome, job) = session.step_deferred(&frame, frames);
            session = next;
            observer(&outcome);

            if let Some(job) = job {
                if job_tx.send(job).is_err() {
                    return Err(VoteError::Other(anyhow::anyhow!("same-face worker stopped")));
                }
            }

            // Log timing every 30 frames
            if frames % 30 == 0 {
                tracing::debug!(
                    "Frame {}: blinks={}/{}, elapsed={:.1}s",
                    frames,
                    session.blink_count(),
                    session.blink_target(),
                    start.elapsed().as_secs_f32()
                );
            }
        }

        // Drain every outstanding check before deciding
        drop(job_tx);
        for check in check_rx.iter() {
            let (next, outcome) = session.apply_face_check(check);
            session = next;
            observer(&outcome);
        }
        worker
            .join()
            .map_err(|_| VoteError::Other(anyhow::anyhow!("same-face worker panicked")))?;

        if session.state() == LivenessState::BlinksComplete {
            let (next, outcome) = session.settle();
            session = next;
            observer(&outcome);
        }

        let report = LivenessReport {
            state: session.state(),
            blinks: session.blink_count(),
            frames,
            timed_out,
            last_descriptor,
        };
        Ok((session, report))
    }
}
