use serde::{Deserialize, Serialize};
use crate::common::error::{VoteError, Result};

/// Face embedding for one detected face in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that the descriptor can be stored as a reference: non-empty,
    /// finite, and of the system-wide length.
    pub fn validate(&self, expected_len: usize) -> Result<()> {
        if self.0.is_empty() {
            return Err(VoteError::InvalidInput("descriptor is empty".to_string()));
        }
        if self.0.len() != expected_len {
            return Err(VoteError::ShapeMismatch {
                expected: expected_len,
                actual: self.0.len(),
            });
        }
        if let Some(index) = self.0.iter().position(|v| !v.is_finite()) {
            return Err(VoteError::InvalidInput(format!(
                "descriptor value at index {} is not finite", index
            )));
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Outcome of comparing a live descriptor against a reference.
/// A non-match is a normal result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub distance: f32,
    pub is_match: bool,
    pub threshold: f32,
}

pub fn euclidean_distance(a: &Descriptor, b: &Descriptor) -> Result<f32> {
    if a.len() != b.len() {
        return Err(VoteError::ShapeMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let sum: f32 = a.0.iter().zip(&b.0).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(sum.sqrt())
}

/// Lower distance is stronger similarity; a match requires `distance < threshold`.
pub fn match_descriptors(reference: &Descriptor, candidate: &Descriptor, threshold: f32) -> Result<MatchResult> {
    let distance = euclidean_distance(reference, candidate)?;
    Ok(MatchResult {
        distance,
        is_match: distance < threshold,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(len: usize, index: usize, value: f32) -> Descriptor {
        let mut values = vec![0.0; len];
        values[index] = value;
        Descriptor::new(values)
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Descriptor::new(vec![0.1, -0.4, 0.25, 0.9]);
        let b = Descriptor::new(vec![-0.3, 0.2, 0.05, 0.7]);
        assert_eq!(euclidean_distance(&a, &b).unwrap(), euclidean_distance(&b, &a).unwrap());
        assert_eq!(euclidean_distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn known_geometry() {
        let a = Descriptor::new(vec![0.0, 0.0]);
        let b = Descriptor::new(vec![3.0, 4.0]);
        assert!((euclidean_distance(&a, &b).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn one_dimension_off_by_one_does_not_match() {
        let d1 = unit(128, 0, 1.0);
        let d2 = unit(128, 0, 2.0);

        let same = match_descriptors(&d1, &d1, 0.40).unwrap();
        assert!(same.is_match);
        assert_eq!(same.distance, 0.0);

        let other = match_descriptors(&d1, &d2, 0.40).unwrap();
        assert_eq!(other.distance, 1.0);
        assert!(!other.is_match);
        assert_eq!(other.threshold, 0.40);
    }

    #[test]
    fn distance_equal_to_threshold_is_not_a_match() {
        let a = Descriptor::new(vec![0.0]);
        let b = Descriptor::new(vec![0.5]);
        assert!(!match_descriptors(&a, &b, 0.5).unwrap().is_match);
    }

    #[test]
    fn length_mismatch_is_an_error_not_a_miss() {
        let a = Descriptor::new(vec![0.0; 128]);
        let b = Descriptor::new(vec![0.0; 64]);
        match match_descriptors(&a, &b, 0.40) {
            Err(VoteError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, 128);
                assert_eq!(actual, 64);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_bad_descriptors() {
        assert!(matches!(Descriptor::new(vec![]).validate(128), Err(VoteError::InvalidInput(_))));
        assert!(matches!(
            Descriptor::new(vec![0.0; 4]).validate(128),
            Err(VoteError::ShapeMismatch { expected: 128, actual: 4 })
        ));
        assert!(Descriptor::new(vec![0.0, f32::NAN]).validate(2).is_err());
        assert!(Descriptor::new(vec![0.0; 128]).validate(128).is_ok());
    }
}
