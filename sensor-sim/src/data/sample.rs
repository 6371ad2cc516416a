use core::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::timing::TickInstant;

/// Raw sensor reading in millivolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millivolts(pub u32);

/// Derived temperature in thousandths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilliCelsius(pub i32);

impl fmt::Display for Millivolts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for MilliCelsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A reading stamped with the tick it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    pub tick: TickInstant,
    pub reading: Millivolts,
}

impl Sample {
    #[inline]
    #[must_use]
    pub const fn new(tick: TickInstant, reading: Millivolts) -> Self {
        Self { tick, reading }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtypes_serialize_as_their_inner_value() {
        assert_eq!(
            postcard::to_allocvec(&MilliCelsius(-11_205)).unwrap(),
            postcard::to_allocvec(&-11_205_i32).unwrap()
        );
        assert_eq!(
            postcard::to_allocvec(&Millivolts(1_254)).unwrap(),
            postcard::to_allocvec(&1_254_u32).unwrap()
        );
    }

    #[test]
    fn sample_serializes_tick_then_reading() {
        let sample = Sample::new(TickInstant::new(7), Millivolts(300));

        let bytes = postcard::to_allocvec(&sample).unwrap();

        assert_eq!(bytes, postcard::to_allocvec(&(7_u32, 300_u32)).unwrap());
        assert_eq!(postcard::from_bytes::<Sample>(&bytes).unwrap(), sample);
    }
}
