//! Splice Timeline - timeline data model
//!
//! Implements the structure the compositor and mixer walk:
//! - Media clips referencing shared sources
//! - Image and audio effects with priority layers
//! - Tracks with sorted, non-overlapping clips and stereo levels
//! - The project-level source registry

pub mod clip;
pub mod effect;
pub mod error;
pub mod sources;
pub mod timeline;
pub mod track;

pub use clip::MediaClip;
pub use effect::{EffectKind, MediaEffect};
pub use error::TimelineError;
pub use sources::SourceRegistry;
pub use timeline::Timeline;
pub use track::{AudioLevels, Track};
