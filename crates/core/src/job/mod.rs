//! Processing jobs: segments, cut-lists, output naming and staging.

mod cutlist;
mod naming;
mod staging;
mod types;

pub use cutlist::{load_cutlist, parse_cutlist, parse_timestamp};
pub use naming::{safe_file_name, underscore, video_file_name};
pub use staging::StagingArea;
pub use types::{
    format_seconds, format_timestamp, validate_segments, ProcessingJob, RecordingMetadata,
    Segment,
};
