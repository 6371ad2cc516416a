//! Bit layout of the value carried by the sample channel.
//!
//! ```text
//!  63                32 31                 0
//! +--------------------+--------------------+
//! |   tick (u32)       |  reading (u32 mV)  |
//! +--------------------+--------------------+
//! ```
//!
//! Both halves are full 32-bit fields, so packing is lossless for every tick
//! and every reading.

use crate::data::sample::{Millivolts, Sample};
use crate::runtime::timing::TickInstant;
use crate::sync::spsc::{self, Consumer, Producer};

/// Slots in the sample channel. One sample in flight at a time.
pub const CHANNEL_CAPACITY: usize = 1;

const READING_BITS: u32 = 32;
const READING_MASK: u64 = (1 << READING_BITS) - 1;

/// Packed `{tick, reading}` as it sits in the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Transport(u64);

impl Transport {
    /// Tick in the upper half, reading in the lower half.
    #[inline]
    #[must_use]
    pub const fn pack(sample: Sample) -> Self {
        Self(((sample.tick.get() as u64) << READING_BITS) | sample.reading.0 as u64)
    }

    #[inline]
    #[must_use]
    pub const fn unpack(self) -> Sample {
        Sample {
            tick: TickInstant::new((self.0 >> READING_BITS) as u32),
            reading: Millivolts((self.0 & READING_MASK) as u32),
        }
    }

    /// The raw 64-bit word.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl From<Sample> for Transport {
    fn from(sample: Sample) -> Self {
        Self::pack(sample)
    }
}

impl From<Transport> for Sample {
    fn from(transport: Transport) -> Self {
        transport.unpack()
    }
}

/// Generator end of the sample channel.
pub type SampleTx = Producer<Transport, CHANNEL_CAPACITY>;

/// Consumer end of the sample channel.
pub type SampleRx = Consumer<Transport, CHANNEL_CAPACITY>;

/// Creates the one-slot sample channel.
#[must_use]
pub fn sample_channel() -> (SampleTx, SampleRx) {
    spsc::channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tick: u32, reading: u32) -> Sample {
        Sample::new(TickInstant::new(tick), Millivolts(reading))
    }

    #[test]
    fn layout_puts_tick_high() {
        let packed = Transport::pack(sample(3, 10_000));
        assert_eq!(packed.bits(), (3u64 << 32) | 10_000);
    }

    #[test]
    fn extremes_round_trip() {
        for (tick, reading) in [
            (0, 0),
            (u32::MAX, 0),
            (0, u32::MAX),
            (u32::MAX, u32::MAX),
            (1000, 10_000),
        ] {
            let original = sample(tick, reading);
            assert_eq!(Transport::pack(original).unpack(), original);
        }
    }

    #[test]
    fn pseudo_random_pairs_round_trip() {
        // xorshift64, fixed seed.
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        for _ in 0..10_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let original = sample((state >> 32) as u32, state as u32);
            let back: Sample = Transport::from(original).into();
            assert_eq!(back, original);
        }
    }

    #[test]
    fn reading_does_not_bleed_into_tick() {
        let unpacked = Transport::from_bits((7u64 << 32) | u64::from(u32::MAX)).unpack();
        assert_eq!(unpacked.tick, TickInstant::new(7));
        assert_eq!(unpacked.reading, Millivolts(u32::MAX));
    }

    #[test]
    fn channel_holds_one_transport() {
        let (tx, rx) = sample_channel();
        let first = Transport::pack(sample(1, 500));

        assert!(tx.push(first).is_ok());
        assert!(tx.push(Transport::pack(sample(2, 1000))).is_err());
        assert_eq!(rx.pop().map(Transport::unpack), Some(sample(1, 500)));
    }
}
