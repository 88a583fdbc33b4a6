//! Shared identifiers and modality types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Stable identifier of a learning objective.
    ///
    /// Ordering is lexicographic and drives every deterministic tie-break.
    ObjectiveId
);

string_id!(
    /// Stable identifier of a content chunk in the content store.
    ContentId
);

string_id!(
    /// Identifier of a student.
    StudentId
);

/// Unique identifier of one learning path version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathId(pub Uuid);

impl PathId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PathId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presentation modality of an objective or a content chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Visual,
    Auditory,
    Kinesthetic,
    Reading,
}

impl Modality {
    /// All modalities in weight-vector order.
    pub const ALL: [Modality; 4] = [
        Modality::Visual,
        Modality::Auditory,
        Modality::Kinesthetic,
        Modality::Reading,
    ];

    fn index(self) -> usize {
        match self {
            Modality::Visual => 0,
            Modality::Auditory => 1,
            Modality::Kinesthetic => 2,
            Modality::Reading => 3,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Visual => "visual",
            Modality::Auditory => "auditory",
            Modality::Kinesthetic => "kinesthetic",
            Modality::Reading => "reading",
        };
        f.write_str(name)
    }
}

/// Learning-style weight vector over the four modalities.
///
/// Always normalized: components are non-negative and sum to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]")]
pub struct ModalityWeights([f64; 4]);

impl ModalityWeights {
    /// Uniform weights (0.25 each).
    pub fn uniform() -> Self {
        Self([0.25; 4])
    }

    /// Builds normalized weights from raw non-negative counts or scores.
    ///
    /// Falls back to uniform weights when the total is zero or not finite.
    pub fn from_raw(raw: [f64; 4]) -> Self {
        let cleaned = raw.map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 });
        let total: f64 = cleaned.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Self::uniform();
        }
        Self(cleaned.map(|v| v / total))
    }

    /// Weight for one modality.
    pub fn weight(&self, modality: Modality) -> f64 {
        self.0[modality.index()]
    }

    /// Dot product with the indicator vector of the given modality tags.
    ///
    /// Duplicate tags count once.
    pub fn dot_indicator<'a>(&self, tags: impl IntoIterator<Item = &'a Modality>) -> f64 {
        let mut indicator = [0.0_f64; 4];
        for tag in tags {
            indicator[tag.index()] = 1.0;
        }
        indicator
            .iter()
            .zip(self.0.iter())
            .map(|(i, w)| i * w)
            .sum()
    }

    /// Raw components in `Modality::ALL` order.
    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }
}

impl From<[f64; 4]> for ModalityWeights {
    fn from(raw: [f64; 4]) -> Self {
        Self::from_raw(raw)
    }
}

impl Default for ModalityWeights {
    fn default() -> Self {
        Self::uniform()
    }
}
