use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use crate::common::error::{VoteError, Result};
use crate::core::descriptor::Descriptor;
use crate::core::liveness::BlinkScores;

/// What the face classifier reports for one video frame.
///
/// `blink` is `None` when no face was found in the frame; such frames are
/// inconclusive for the blink counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    pub timestamp_ms: u64,
    pub descriptor: Option<Descriptor>,
    pub blink: Option<BlinkScores>,
}

impl FrameObservation {
    pub fn has_face(&self) -> bool {
        self.descriptor.is_some() || self.blink.is_some()
    }
}

/// Source of classified frames. `Ok(None)` ends the stream.
///
/// Implementations wrap whatever produces descriptors and blendshape scores
/// (a camera pipeline, a remote model, a recording). Failing to reach that
/// capability must surface as [`VoteError::ClassifierUnavailable`].
pub trait FrameClassifier {
    fn next_frame(&mut self) -> Result<Option<FrameObservation>>;
}

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    t_ms: u64,
    #[serde(default)]
    face: bool,
    #[serde(default)]
    descriptor: Option<Vec<f32>>,
    #[serde(default)]
    blink_left: Option<f32>,
    #[serde(default)]
    blink_right: Option<f32>,
}

impl ReplayRecord {
    fn into_observation(self) -> FrameObservation {
        let has_face = self.face
            || self.descriptor.is_some()
            || self.blink_left.is_some()
            || self.blink_right.is_some();

        FrameObservation {
            timestamp_ms: self.t_ms,
            descriptor: self.descriptor.map(Descriptor::new),
            blink: has_face.then(|| BlinkScores::from_blendshapes(self.blink_left, self.blink_right)),
        }
    }
}

/// Replays recorded classifier output, one JSON object per line:
///
/// ```text
/// {"t_ms": 0, "descriptor": [0.01, ...], "blink_left": 0.02, "blink_right": 0.03}
/// {"t_ms": 33}
/// {"t_ms": 66, "face": true}
/// ```
///
/// A line with no face fields is a frame where no face was detected.
pub struct ReplayClassifier {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl ReplayClassifier {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            VoteError::ClassifierUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl FrameClassifier for ReplayClassifier {
    fn next_frame(&mut self) -> Result<Option<FrameObservation>> {
        loop {
            let line = match self.lines.next() {
                Some(line) => line.map_err(|e| VoteError::ClassifierUnavailable(e.to_string()))?,
                None => return Ok(None),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let record: ReplayRecord = serde_json::from_str(&line).map_err(|e| {
                VoteError::InvalidInput(format!("frame on line {}: {}", self.line_no, e))
            })?;
            return Ok(Some(record.into_observation()));
        }
    }
}
