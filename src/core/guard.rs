use crate::core::descriptor::{euclidean_distance, Descriptor};

/// Work item for a deferred same-face check.
#[derive(Debug, Clone)]
pub struct FaceCheckJob {
    pub seq: u64,
    pub reference: Descriptor,
    pub descriptor: Descriptor,
}

impl FaceCheckJob {
    pub fn run(&self) -> Option<FaceCheck> {
        euclidean_distance(&self.reference, &self.descriptor)
            .ok()
            .map(|distance| FaceCheck { seq: self.seq, distance })
    }
}

/// Completed distance evaluation for the frame numbered `seq`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCheck {
    pub seq: u64,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuardVerdict {
    /// Nothing to compare (no descriptor, or it became the reference).
    Skipped,
    SameFace { distance: f32 },
    /// A match older than the latest applied check; it changes nothing.
    Stale { distance: f32 },
    DifferentFace { distance: f32 },
}

/// Keeps the subject constant for the length of a liveness session.
///
/// Checks may complete out of order when they run on a worker. The newest
/// completed match is the authoritative one, but a mismatch is honoured no
/// matter when it arrives.
#[derive(Debug, Clone)]
pub struct SameFaceGuard {
    threshold: f32,
    reference: Option<Descriptor>,
    latest_seq: Option<u64>,
    last_distance: Option<f32>,
    tripped: Option<f32>,
}

impl SameFaceGuard {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            reference: None,
            latest_seq: None,
            last_distance: None,
            tripped: None,
        }
    }

    pub fn with_reference(threshold: f32, reference: Descriptor) -> Self {
        Self {
            reference: Some(reference),
            ..Self::new(threshold)
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn reference(&self) -> Option<&Descriptor> {
        self.reference.as_ref()
    }

    pub fn last_distance(&self) -> Option<f32> {
        self.last_distance
    }

    /// Distance of the mismatch that tripped the guard, if any.
    pub fn tripped(&self) -> Option<f32> {
        self.tripped
    }

    /// Adopts `descriptor` as the reference if none is set, or returns a job
    /// comparing it against the reference. Descriptors of a different length
    /// than the reference are not usable and are dropped.
    pub fn prepare(&mut self, seq: u64, descriptor: &Descriptor) -> Option<FaceCheckJob> {
        match &self.reference {
            None => {
                if !descriptor.is_empty() {
                    tracing::debug!("Same-face reference set from frame {}", seq);
                    self.reference = Some(descriptor.clone());
                }
                None
            }
            Some(reference) if reference.len() != descriptor.len() => {
                tracing::warn!(
                    "Skipping frame {}: descriptor has {} values, reference has {}",
                    seq, descriptor.len(), reference.len()
                );
                None
            }
            Some(reference) => Some(FaceCheckJob {
                seq,
                reference: reference.clone(),
                descriptor: descriptor.clone(),
            }),
        }
    }

    pub fn apply(&mut self, check: FaceCheck) -> GuardVerdict {
        if check.distance.is_nan() || check.distance > self.threshold {
            tracing::warn!(
                "Different face detected at frame {} (distance {:.3} > {:.3})",
                check.seq, check.distance, self.threshold
            );
            self.tripped.get_or_insert(check.distance);
            return GuardVerdict::DifferentFace { distance: check.distance };
        }

        if self.latest_seq.is_some_and(|latest| check.seq < latest) {
            return GuardVerdict::Stale { distance: check.distance };
        }

        self.latest_seq = Some(check.seq);
        self.last_distance = Some(check.distance);
        GuardVerdict::SameFace { distance: check.distance }
    }

    /// Synchronous prepare + run + apply.
    pub fn observe(&mut self, seq: u64, descriptor: &Descriptor) -> GuardVerdict {
        match self.prepare(seq, descriptor).and_then(|job| job.run()) {
            Some(check) => self.apply(check),
            None => GuardVerdict::Skipped,
        }
    }
}
