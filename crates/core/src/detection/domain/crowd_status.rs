use std::fmt;

use crate::shared::constants::DEFAULT_CROWD_THRESHOLD;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrowdStatus {
    Crowded,
    Uncrowded,
}

impl CrowdStatus {
    /// Classifies with the default threshold.
    pub fn classify(person_count: usize) -> Self {
        CrowdClassifier::default().classify(person_count)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdStatus::Crowded => "Crowded",
            CrowdStatus::Uncrowded => "Uncrowded",
        }
    }
}

impl fmt::Display for CrowdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a person count to a [`CrowdStatus`]: strictly more than
/// `threshold` people is crowded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrowdClassifier {
    threshold: usize,
}

impl CrowdClassifier {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn classify(&self, person_count: usize) -> CrowdStatus {
        if person_count > self.threshold {
            CrowdStatus::Crowded
        } else {
            CrowdStatus::Uncrowded
        }
    }
}

impl Default for CrowdClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CROWD_THRESHOLD)
    }
}
