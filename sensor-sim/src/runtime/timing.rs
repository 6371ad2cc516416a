//! Tick-space time.

mod tick;

pub use tick::{TickInstant, TickSpan};
