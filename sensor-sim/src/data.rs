//! Sample data: raw readings, derived temperatures and the packed transport
//! value that crosses the channel.
//!
//! Readings are millivolts, temperatures thousandths of a degree Celsius.
//! Only [`packing`] knows the bit layout; everything else works on [`Sample`].

pub mod packing;
pub mod sample;
pub mod scale;

pub use packing::{CHANNEL_CAPACITY, SampleRx, SampleTx, Transport, sample_channel};
pub use sample::{MilliCelsius, Millivolts, Sample};
pub use scale::Scale;
