//! Result merger: collapses per-segment parts into the final file.

mod concat;

pub use concat::ResultMerger;
