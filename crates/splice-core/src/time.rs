//! Time representation for frame- and sample-accurate lookups
//!
//! Timeline instants are rational seconds so that mapping an instant to a
//! video frame index or an audio sample index never accumulates drift.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// A point on the timeline (or inside a source), in rational seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    value: Rational64,
}

impl RationalTime {
    /// `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Start time of frame `frames` at `rate`.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(frames * rate.denominator as i64, rate.numerator as i64),
        }
    }

    /// Start time of sample frame `samples` at `sample_rate` Hz.
    #[inline]
    pub fn from_samples(samples: i64, sample_rate: u32) -> Self {
        Self {
            value: Rational64::new(samples, sample_rate as i64),
        }
    }

    /// Create a RationalTime from seconds as a float.
    /// Note: May introduce small precision errors.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        const PRECISION: i64 = 1_000_000;
        Self {
            value: Rational64::new((seconds * PRECISION as f64).round() as i64, PRECISION),
        }
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Index of the frame containing this instant (floor).
    #[inline]
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        let frames = self.value * Rational64::new(rate.numerator as i64, rate.denominator as i64);
        frames.floor().to_integer()
    }

    /// Index of the sample frame containing this instant (floor).
    #[inline]
    pub fn to_samples(self, sample_rate: u32) -> i64 {
        (self.value * Rational64::from_integer(sample_rate as i64))
            .floor()
            .to_integer()
    }

    /// Nearest sample frame boundary to this instant.
    #[inline]
    pub fn to_samples_rounded(self, sample_rate: u32) -> i64 {
        (self.value * Rational64::from_integer(sample_rate as i64))
            .round()
            .to_integer()
    }

    /// Scale by a rational factor `numerator / denominator`.
    #[inline]
    pub fn scaled(self, numerator: i64, denominator: i64) -> Self {
        Self {
            value: self.value * Rational64::new(numerator, denominator),
        }
    }

    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };

    #[inline]
    pub fn is_zero(self) -> bool {
        *self.value.numer() == 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        *self.value.numer() < 0
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Clamp into `[lo, hi]`. When the interval is empty its midpoint wins.
    pub fn clamp_to(self, lo: Self, hi: Self) -> Self {
        if lo > hi {
            return (lo + hi) / 2;
        }
        self.max(lo).min(hi)
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self {
            value: self.value * rhs,
        }
    }
}

impl Div<i64> for RationalTime {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self {
            value: self.value / rhs,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame.
    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(self.denominator as i64, self.numerator as i64)
    }

    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    #[inline]
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    #[inline]
    pub fn from_start_end(start: RationalTime, end: RationalTime) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    /// End time (exclusive).
    #[inline]
    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end()
    }

    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::from_start_end(
            self.start.max(other.start),
            self.end().min(other.end()),
        ))
    }

    /// Shift the whole range by `offset`.
    #[inline]
    pub fn offset(self, offset: RationalTime) -> Self {
        Self::new(self.start + offset, self.duration)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.duration <= RationalTime::ZERO
    }

    pub const EMPTY: Self = Self {
        start: RationalTime::ZERO,
        duration: RationalTime::ZERO,
    };
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}
