//! Splice Compositor - turns a timeline instant into one output frame
//!
//! Architecture:
//! - `build_work_list`: which clips and image effects are active, back to front
//! - `ImageEffect`: built-in image effects resolved from timeline effects
//! - `RenderBackend` / `CpuBackend`: primary and secondary render targets
//! - `CompositorPipeline`: fast path, chained rendering, isolation and fallbacks

pub mod backend;
pub mod effects;
pub mod pipeline;
pub mod work_list;

pub use backend::{CpuBackend, RenderBackend, Target};
pub use effects::ImageEffect;
pub use pipeline::{CompositorConfig, CompositorPipeline, FastPathMode};
pub use work_list::{build_work_list, FrameWorkItem};
