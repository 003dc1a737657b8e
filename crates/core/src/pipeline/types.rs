//! Types for the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::job::RecordingMetadata;
use crate::locator::RecordingReference;

/// Where a pipeline run currently is. Runs move strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineStage {
    Locating,
    Configuring,
    /// One-based segment index out of `total`.
    Processing { segment: usize, total: usize },
    Merging,
    Relocating,
    Postprocessing,
    Done,
}

impl PipelineStage {
    /// Ordinal used to check forward-only transitions.
    fn rank(&self) -> usize {
        match self {
            Self::Locating => 0,
            Self::Configuring => 1,
            Self::Processing { .. } => 2,
            Self::Merging => 3,
            Self::Relocating => 4,
            Self::Postprocessing => 5,
            Self::Done => 6,
        }
    }

    /// Whether moving from `self` to `next` keeps the run linear.
    pub fn can_advance_to(&self, next: &PipelineStage) -> bool {
        match (self, next) {
            (
                Self::Processing { segment: a, total: n },
                Self::Processing { segment: b, total: m },
            ) => n == m && b > a,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locating => write!(f, "locating"),
            Self::Configuring => write!(f, "configuring"),
            Self::Processing { segment, total } => {
                write!(f, "processing segment {} of {}", segment, total)
            }
            Self::Merging => write!(f, "merging"),
            Self::Relocating => write!(f, "relocating"),
            Self::Postprocessing => write!(f, "postprocessing"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Everything needed to start one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub reference: RecordingReference,
    /// Metadata given on the command line. The backend fills the gaps.
    pub metadata: RecordingMetadata,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct Completed {
    /// The recording that was processed.
    pub recording: PathBuf,
    /// Final location of the video.
    pub output: PathBuf,
    /// Label used in notifications.
    pub title: String,
    /// Set when the postprocessing command failed.
    pub postprocess_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        let processing = |segment| PipelineStage::Processing { segment, total: 2 };

        assert!(PipelineStage::Locating.can_advance_to(&PipelineStage::Configuring));
        assert!(PipelineStage::Configuring.can_advance_to(&processing(1)));
        assert!(processing(1).can_advance_to(&processing(2)));
        assert!(processing(2).can_advance_to(&PipelineStage::Merging));
        assert!(PipelineStage::Merging.can_advance_to(&PipelineStage::Relocating));
        assert!(PipelineStage::Postprocessing.can_advance_to(&PipelineStage::Done));

        assert!(!processing(2).can_advance_to(&processing(1)));
        assert!(!PipelineStage::Relocating.can_advance_to(&PipelineStage::Merging));
        assert!(!PipelineStage::Done.can_advance_to(&PipelineStage::Locating));
    }

    #[test]
    fn test_stage_display_and_serialization() {
        let stage = PipelineStage::Processing {
            segment: 1,
            total: 3,
        };
        assert_eq!(stage.to_string(), "processing segment 1 of 3");

        let json = serde_json::to_value(stage).unwrap();
        assert_eq!(json["stage"], "processing");
        assert_eq!(json["segment"], 1);
    }
}
