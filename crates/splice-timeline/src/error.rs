//! Timeline subsystem errors.

use splice_core::{SourceId, SpliceError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("clip {inserted} overlaps clip {existing} on track {track}")]
    OverlappingClips {
        track: String,
        existing: Uuid,
        inserted: Uuid,
    },
    #[error("clips out of order on track {track} at index {index}")]
    UnsortedClips { track: String, index: usize },
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("unknown source {0}")]
    UnknownSource(SourceId),
    #[error("no track at index {0}")]
    TrackNotFound(usize),
}

impl From<TimelineError> for SpliceError {
    fn from(err: TimelineError) -> Self {
        SpliceError::Timeline(err.to_string())
    }
}
