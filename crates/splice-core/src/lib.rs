//! Splice Core - foundation types for the caching and compositing engine
//!
//! This crate provides the types shared by every other splice crate:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - RGBA frame buffers
//! - Audio sample formats and over-allocated sample buffers
//! - Cache configuration and memory budgets
//! - Geometric primitives for spatial transforms

pub mod audio;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod time;

pub use audio::{AudioFormat, SampleBuffer, SampleFormat};
pub use config::{CacheConfig, MemoryBudget};
pub use error::{Result, SpliceError};
pub use frame::{FrameBuffer, SharedFrame};
pub use geometry::{Transform2D, Vec2};
pub use time::{FrameRate, RationalTime, TimeRange};

/// Identifier of a media source in the project-level source list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SourceId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "src#{}", self.0)
    }
}
