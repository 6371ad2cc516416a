//! Kernel tick coordinates.
//!
//! Ticks are a 32-bit wrapping count, the width the kernel exposes and the
//! width carried in the upper half of a transport value. Instants and spans
//! are distinct types even though both are a `u32` underneath.

use core::fmt;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// A point on the kernel tick counter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TickInstant(u32);

impl TickInstant {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw tick count.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Adds a span, wrapping at `u32::MAX` like the kernel counter does.
    #[inline]
    #[must_use]
    pub const fn add_span(self, span: TickSpan) -> Self {
        Self(self.0.wrapping_add(span.0))
    }

    /// Ticks from `earlier` to `self`, modulo 2^32.
    #[inline]
    #[must_use]
    pub const fn since(self, earlier: Self) -> TickSpan {
        TickSpan(self.0.wrapping_sub(earlier.0))
    }
}

impl Add<TickSpan> for TickInstant {
    type Output = Self;

    #[inline]
    fn add(self, rhs: TickSpan) -> Self::Output {
        self.add_span(rhs)
    }
}

impl fmt::Display for TickInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A number of ticks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TickSpan(u32);

impl TickSpan {
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wraps_at_counter_width() {
        let near_end = TickInstant::new(u32::MAX - 1);
        assert_eq!(near_end + TickSpan::new(3), TickInstant::new(1));
    }

    #[test]
    fn since_survives_wrap() {
        let before = TickInstant::new(u32::MAX - 9);
        let after = TickInstant::new(10);
        assert_eq!(after.since(before), TickSpan::new(20));
    }

    #[test]
    fn displays_raw_count() {
        assert_eq!(TickInstant::new(1000).to_string(), "1000");
    }
}
