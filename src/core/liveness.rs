//! Debounced blink counting.
//!
//! The classifier reports a blink confidence per eye on every frame. Single
//! frames are noisy, so a blink is only credited after the eyes have been
//! closed for `closed_frames` consecutive frames and then open again for
//! `open_frames` consecutive frames, with at least `min_blink_interval_ms`
//! since the previous credited blink.

use serde::{Deserialize, Serialize};
use crate::common::config::LivenessConfig;

/// Per-eye blink confidence for one frame, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlinkScores {
    pub left: f32,
    pub right: f32,
}

impl BlinkScores {
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left: sanitize(Some(left)),
            right: sanitize(Some(right)),
        }
    }

    /// Builds scores from optional blendshape entries. A missing or
    /// non-finite entry counts as 0 (eye open).
    pub fn from_blendshapes(left: Option<f32>, right: Option<f32>) -> Self {
        Self {
            left: sanitize(left),
            right: sanitize(right),
        }
    }

    fn is_closed(&self, threshold: f32) -> bool {
        self.left > threshold && self.right > threshold
    }
}

fn sanitize(score: Option<f32>) -> f32 {
    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyePhase {
    Idle,
    Open,
    ClosedPending,
    Closed,
    OpenPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkEvent {
    /// Frame absorbed, no blink credited.
    None,
    /// A blink was credited and the target is not reached yet.
    Blink { count: u32, remaining: u32 },
    /// The blink that reached the target, or any frame after it.
    Complete { count: u32 },
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    closed_threshold: f32,
    closed_frames: u32,
    open_frames: u32,
    min_blink_interval_ms: u64,
    target: u32,

    frames_seen: u64,
    closed: bool,
    closed_streak: u32,
    open_streak: u32,
    count: u32,
    last_blink_at_ms: Option<u64>,
}

impl BlinkDetector {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            closed_threshold: config.closed_threshold,
            closed_frames: config.closed_frames,
            open_frames: config.open_frames,
            min_blink_interval_ms: config.min_blink_interval_ms,
            target: config.blink_target,
            frames_seen: 0,
            closed: false,
            closed_streak: 0,
            open_streak: 0,
            count: 0,
            last_blink_at_ms: None,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.target
    }

    pub fn phase(&self) -> EyePhase {
        if self.frames_seen == 0 {
            EyePhase::Idle
        } else if self.closed && self.open_streak > 0 {
            EyePhase::OpenPending
        } else if self.closed {
            EyePhase::Closed
        } else if self.closed_streak > 0 {
            EyePhase::ClosedPending
        } else {
            EyePhase::Open
        }
    }

    /// Feeds one conclusive frame. Frames without a face must not be passed
    /// here at all; they leave the streaks untouched.
    pub fn observe(&mut self, scores: BlinkScores, now_ms: u64) -> BlinkEvent {
        if self.is_complete() {
            return BlinkEvent::Complete { count: self.count };
        }

        self.frames_seen += 1;

        if scores.is_closed(self.closed_threshold) {
            self.closed_streak += 1;
            self.open_streak = 0;
            if !self.closed && self.closed_streak >= self.closed_frames {
                self.closed = true;
            }
            return BlinkEvent::None;
        }

        self.open_streak += 1;
        self.closed_streak = 0;

        let interval_ok = match self.last_blink_at_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.min_blink_interval_ms,
            None => true,
        };

        if self.closed && self.open_streak >= self.open_frames && interval_ok {
            self.count += 1;
            self.closed = false;
            self.last_blink_at_ms = Some(now_ms);

            if self.is_complete() {
                return BlinkEvent::Complete { count: self.count };
            }
            return BlinkEvent::Blink {
                count: self.count,
                remaining: self.target - self.count,
            };
        }

        BlinkEvent::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BlinkDetector {
        BlinkDetector::new(&LivenessConfig::default())
    }

    const OPEN: BlinkScores = BlinkScores { left: 0.0, right: 0.0 };
    const SHUT: BlinkScores = BlinkScores { left: 0.7, right: 0.7 };

    /// Feeds frames 33ms apart starting at `start_ms`, returning the events.
    fn feed(d: &mut BlinkDetector, frames: &[BlinkScores], start_ms: u64) -> Vec<BlinkEvent> {
        frames
            .iter()
            .enumerate()
            .map(|(i, s)| d.observe(*s, start_ms + i as u64 * 33))
            .collect()
    }

    #[test]
    fn blink_is_credited_only_after_both_debounces() {
        let mut d = detector();
        let frames = [OPEN, SHUT, SHUT, OPEN, OPEN];
        let mut events = Vec::new();

        for (i, scores) in frames.iter().enumerate() {
            events.push(d.observe(*scores, 1_000 + i as u64 * 33));
            if i < 4 {
                // closed debounce is met on frame 3, still no credit
                assert_eq!(d.count(), 0, "credited early at frame {}", i + 1);
            }
        }

        assert!(events[..4].iter().all(|e| *e == BlinkEvent::None));
        assert_eq!(events[4], BlinkEvent::Blink { count: 1, remaining: 2 });
        assert_eq!(d.count(), 1);
    }

    #[test]
    fn short_closed_run_never_counts() {
        let mut d = detector();
        feed(&mut d, &[OPEN, SHUT, OPEN, OPEN, OPEN, OPEN], 0);
        assert_eq!(d.count(), 0);
        assert_eq!(d.phase(), EyePhase::Open);
    }

    #[test]
    fn single_eye_closed_is_open() {
        let mut d = detector();
        let wink = BlinkScores::new(0.9, 0.1);
        feed(&mut d, &[wink, wink, wink, OPEN, OPEN], 0);
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut d = detector();
        let edge = BlinkScores::new(0.6, 0.6);
        feed(&mut d, &[edge, edge, edge, OPEN, OPEN], 0);
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn min_interval_delays_the_second_blink() {
        let mut d = detector();
        assert_eq!(d.observe(SHUT, 0), BlinkEvent::None);
        d.observe(SHUT, 10);
        d.observe(OPEN, 20);
        assert_eq!(d.observe(OPEN, 30), BlinkEvent::Blink { count: 1, remaining: 2 });

        d.observe(SHUT, 40);
        d.observe(SHUT, 50);
        d.observe(OPEN, 60);
        // debounce met at 70ms but only 40ms since the last blink
        assert_eq!(d.observe(OPEN, 70), BlinkEvent::None);
        assert_eq!(d.phase(), EyePhase::OpenPending);
        assert_eq!(d.observe(OPEN, 200), BlinkEvent::None);
        assert_eq!(d.observe(OPEN, 330), BlinkEvent::Blink { count: 2, remaining: 1 });
    }

    #[test]
    fn count_stops_at_target() {
        let mut d = detector();
        let blink = [SHUT, SHUT, OPEN, OPEN];
        let mut t = 0;
        let mut last = BlinkEvent::None;
        for _ in 0..5 {
            for s in blink {
                last = d.observe(s, t);
                t += 200;
            }
        }
        assert_eq!(d.count(), 3);
        assert_eq!(last, BlinkEvent::Complete { count: 3 });
        assert!(d.is_complete());
    }

    #[test]
    fn count_is_monotonic() {
        let mut d = detector();
        let pattern = [OPEN, SHUT, SHUT, SHUT, OPEN, SHUT, OPEN, OPEN, OPEN, SHUT, SHUT, OPEN, OPEN];
        let mut previous = 0;
        for (i, s) in pattern.iter().cycle().take(80).enumerate() {
            d.observe(*s, i as u64 * 120);
            assert!(d.count() >= previous);
            assert!(d.count() <= d.target());
            previous = d.count();
        }
    }

    #[test]
    fn phases_follow_the_blink() {
        let mut d = detector();
        assert_eq!(d.phase(), EyePhase::Idle);
        d.observe(OPEN, 0);
        assert_eq!(d.phase(), EyePhase::Open);
        d.observe(SHUT, 33);
        assert_eq!(d.phase(), EyePhase::ClosedPending);
        d.observe(SHUT, 66);
        assert_eq!(d.phase(), EyePhase::Closed);
        d.observe(OPEN, 99);
        assert_eq!(d.phase(), EyePhase::OpenPending);
        d.observe(OPEN, 132);
        assert_eq!(d.phase(), EyePhase::Open);
        assert_eq!(d.count(), 1);
    }

    #[test]
    fn missing_or_malformed_scores_default_to_open() {
        assert_eq!(BlinkScores::from_blendshapes(None, Some(0.9)).left, 0.0);
        assert_eq!(BlinkScores::from_blendshapes(Some(f32::NAN), None), BlinkScores::default());
        assert_eq!(BlinkScores::new(1.7, -0.2), BlinkScores { left: 1.0, right: 0.0 });
    }
}
