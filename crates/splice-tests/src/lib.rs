//! Integration test crate for splice.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! Every source is synthetic, so decodes are deterministic and countable.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod compositing;

#[cfg(test)]
mod audio;

#[cfg(test)]
mod caching;
