//! Waveform generator task.
//!
//! Once per period the generator wakes on an absolute deadline, moves the
//! reading one gradient step along a triangular ramp, stamps it with the
//! current tick and offers it to the one-slot channel without waiting.
//!
//! # Direction rule
//!
//! ```text
//! if value >= upper                 { gradient = -gradient }
//! else if gradient < 0 && value <= lower { gradient = -gradient }
//! value += gradient
//! ```
//!
//! The upper bound flips unconditionally, the lower bound only while
//! descending. From the default start (`lower`, ascending) the value stays
//! inside the bounds forever.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::{ConfigError, WaveformConfig};
use crate::data::{Millivolts, Sample, SampleTx, Transport};
use crate::runtime::kernel::Kernel;
use crate::runtime::timing::{TickInstant, TickSpan};
use crate::trace::{debug, trace, warn};

/// Triangular ramp state: current value and signed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    value: u32,
    gradient: i32,
    lower: u32,
    upper: u32,
}

impl Waveform {
    /// Starts at the lower bound, ascending.
    #[must_use]
    pub fn new(config: &WaveformConfig) -> Self {
        Self {
            value: config.lower,
            gradient: config.gradient(),
            lower: config.lower,
            upper: config.upper,
        }
    }

    /// Resumes at `reading` with the given direction.
    ///
    /// # Errors
    ///
    /// [`ConfigError::OffRamp`] if `reading` is outside the bounds or not a
    /// whole number of steps above `lower`.
    pub fn at(
        config: &WaveformConfig,
        reading: Millivolts,
        descending: bool,
    ) -> Result<Self, ConfigError> {
        let step = config.gradient().unsigned_abs();
        let on_ramp = (config.lower..=config.upper).contains(&reading.0)
            && step != 0
            && (reading.0 - config.lower) % step == 0;
        if !on_ramp {
            return Err(ConfigError::OffRamp {
                reading: reading.0,
                config: config.clone(),
            });
        }

        let mut waveform = Self::new(config);
        waveform.value = reading.0;
        if descending {
            waveform.gradient = -waveform.gradient;
        }
        Ok(waveform)
    }

    #[must_use]
    pub const fn value(&self) -> Millivolts {
        Millivolts(self.value)
    }

    #[must_use]
    pub const fn gradient(&self) -> i32 {
        self.gradient
    }

    /// Applies the direction rule, then one step. Returns the new value.
    pub fn advance(&mut self) -> Millivolts {
        if self.value >= self.upper {
            self.gradient = -self.gradient;
        } else if self.gradient < 0 && self.value <= self.lower {
            self.gradient = -self.gradient;
        }
        self.value = self.value.saturating_add_signed(self.gradient);
        Millivolts(self.value)
    }
}

impl Iterator for Waveform {
    type Item = Millivolts;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.advance())
    }
}

/// Called for every sample the generator could not hand off.
pub trait OverrunHook: Send {
    fn on_drop(&mut self, sample: &Sample);
}

/// Silent drop.
impl OverrunHook for () {
    fn on_drop(&mut self, _sample: &Sample) {}
}

/// Counts dropped samples. Clones share the count.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicU64>);

impl DropCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl OverrunHook for DropCounter {
    fn on_drop(&mut self, _sample: &Sample) {
        self.0.fetch_add(1, Ordering::Relaxed);
        warn!(tick = %_sample.tick, reading = _sample.reading.0, dropped = self.get(), "sample channel full, sample dropped");
    }
}

/// Outcome of one generator period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent(Sample),
    Dropped(Sample),
}

/// The producer task.
pub struct WaveformGenerator<K, H = ()> {
    waveform: Waveform,
    kernel: K,
    tx: SampleTx,
    period: TickSpan,
    wake: TickInstant,
    hook: H,
}

impl<K: Kernel> WaveformGenerator<K> {
    /// Creates a generator that drops overruns silently.
    ///
    /// The period lattice is anchored at the kernel tick at creation time.
    pub fn new(waveform: Waveform, kernel: K, tx: SampleTx, period: TickSpan) -> Self {
        Self::with_hook(waveform, kernel, tx, period, ())
    }
}

impl<K: Kernel, H: OverrunHook> WaveformGenerator<K, H> {
    pub fn with_hook(waveform: Waveform, kernel: K, tx: SampleTx, period: TickSpan, hook: H) -> Self {
        let wake = kernel.tick_count();
        Self {
            waveform,
            kernel,
            tx,
            period,
            wake,
            hook,
        }
    }

    #[must_use]
    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    /// Runs one period: wait, step, stamp, offer.
    pub fn tick(&mut self) -> Dispatch {
        self.kernel.delay_until(&mut self.wake, self.period);

        let reading = self.waveform.advance();
        let sample = Sample::new(self.kernel.tick_count(), reading);

        match self.tx.push(Transport::pack(sample)) {
            Ok(()) => {
                trace!(tick = %sample.tick, reading = reading.0, "sample sent");
                Dispatch::Sent(sample)
            }
            Err(_) => {
                self.hook.on_drop(&sample);
                Dispatch::Dropped(sample)
            }
        }
    }

    /// Ticks until `shutdown` is set. Dropping `self` afterwards disconnects
    /// the channel, which releases the consumer.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        debug!(period = self.period.get(), start = self.waveform.value, "generator loop started");
        while !shutdown.load(Ordering::Relaxed) {
            self.tick();
        }
        debug!("generator loop stopped");
    }
}
