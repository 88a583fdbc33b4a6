//! Bounded mastery value with exponentially weighted updates
//!
//! Mastery is a newtype wrapper around f64 that enforces bounds [0.0, 1.0]
//! and rejects NaN values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounded mastery estimate [0.0, 1.0]
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Mastery(f64);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MasteryError {
    #[error("Mastery value cannot be NaN")]
    NaN,

    #[error("Mastery out of bounds: {value} (must be {min} to {max})")]
    OutOfBounds { value: f64, min: f64, max: f64 },
}

impl Mastery {
    const MIN: f64 = 0.0;
    const MAX: f64 = 1.0;

    /// Create a new mastery value with bounds validation
    ///
    /// # Errors
    /// - Returns `MasteryError::NaN` if value is NaN
    /// - Returns `MasteryError::OutOfBounds` if value < 0.0 or > 1.0
    pub fn new(value: f64) -> Result<Self, MasteryError> {
        if value.is_nan() {
            return Err(MasteryError::NaN);
        }
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(MasteryError::OutOfBounds {
                value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(Self(value))
    }

    /// Get the underlying f64 value
    pub fn get(self) -> f64 {
        self.0
    }

    /// Exponentially weighted update toward an observed score
    ///
    /// `new = old * (1 - alpha) + observed * alpha`, clamped to [0, 1].
    pub fn ewma(self, observed: Mastery, alpha: f64) -> Self {
        let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        let next = self.0 * (1.0 - alpha) + observed.0 * alpha;
        Self(next.clamp(Self::MIN, Self::MAX))
    }

    /// Gap confidence for this mastery level (`1 - mastery`)
    pub fn deficit(self) -> f64 {
        Self::MAX - self.0
    }
}

impl TryFrom<f64> for Mastery {
    type Error = MasteryError;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Mastery> for f64 {
    fn from(value: Mastery) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mastery_valid() {
        assert!(Mastery::new(0.0).is_ok());
        assert!(Mastery::new(0.5).is_ok());
        assert!(Mastery::new(1.0).is_ok());
    }

    #[test]
    fn test_mastery_rejects_nan() {
        assert!(matches!(Mastery::new(f64::NAN), Err(MasteryError::NaN)));
    }

    #[test]
    fn test_mastery_rejects_out_of_bounds() {
        assert!(Mastery::new(-0.1).is_err());
        assert!(Mastery::new(1.1).is_err());
    }

    #[test]
    fn test_ewma_formula() {
        let old = Mastery::new(0.2).unwrap();
        let observed = Mastery::new(1.0).unwrap();
        let next = old.ewma(observed, 0.3);
        assert!((next.get() - 0.44).abs() < 1e-12);
    }

    #[test]
    fn test_ewma_alpha_one_is_idempotent() {
        let observed = Mastery::new(0.7).unwrap();
        let once = Mastery::new(0.1).unwrap().ewma(observed, 1.0);
        let twice = once.ewma(observed, 1.0);
        assert_eq!(once, observed);
        assert_eq!(twice, observed);
    }

    #[test]
    fn test_ewma_moves_monotonically_without_overshoot() {
        let observed = Mastery::new(0.9).unwrap();
        let mut current = Mastery::new(0.1).unwrap();
        for _ in 0..50 {
            let next = current.ewma(observed, 0.3);
            assert!(next.get() >= current.get());
            assert!(next.get() <= observed.get());
            current = next;
        }

        let observed = Mastery::new(0.0).unwrap();
        let mut current = Mastery::new(1.0).unwrap();
        for _ in 0..50 {
            let next = current.ewma(observed, 0.3);
            assert!(next.get() <= current.get());
            assert!(next.get() >= 0.0);
            current = next;
        }
    }

    #[test]
    fn test_deficit() {
        assert!((Mastery::new(0.2).unwrap().deficit() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_serde_rejects_out_of_bounds() {
        assert!(serde_json::from_str::<Mastery>("0.5").is_ok());
        assert!(serde_json::from_str::<Mastery>("1.5").is_err());
    }
}
