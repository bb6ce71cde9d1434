//! Splice Media - access to decodable media sources
//!
//! This crate handles:
//! - The `MediaHandle` interface to a (non-reentrant) decode library
//! - Shared `MediaSource`s with a primary and a secondary handle
//! - The process-wide `DecodeGate` serializing every decode call
//! - Retrying transient seek/read failures
//! - A deterministic synthetic source for tests and demos

pub mod gate;
pub mod handle;
pub mod info;
pub mod source;
pub mod synthetic;

pub use gate::{with_retries, DecodeGate, DecodeGuard};
pub use handle::{MediaHandle, MediaOpener, SeekMode};
pub use info::{AudioStreamInfo, MediaInfo, VideoStreamInfo};
pub use source::MediaSource;
pub use synthetic::{Signal, SyntheticMedia, SyntheticStats};
