//! Deterministic single-threaded run over virtual time.
//!
//! Each [`Pipeline::step`] runs one generator period followed by one consumer
//! iteration, the order a higher-priority consumer produces on a single core.

use std::sync::Arc;

use crate::config::{ConfigError, SimConfig};
use crate::consumer::{EventObserver, Report, ReportSink, SampleConsumer};
use crate::data::{Scale, sample_channel};
use crate::generator::{Dispatch, DropCounter, Waveform, WaveformGenerator};
use crate::runtime::kernel::{Kernel, VirtualKernel};
use crate::runtime::timing::TickInstant;

pub struct Pipeline<S> {
    kernel: Arc<VirtualKernel>,
    generator: WaveformGenerator<Arc<VirtualKernel>, DropCounter>,
    consumer: SampleConsumer<Arc<VirtualKernel>, S>,
    drops: DropCounter,
}

impl<S: ReportSink> Pipeline<S> {
    /// Builds both tasks on a fresh virtual clock starting at tick 0.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found by
    /// [`SimConfig::validate`].
    pub fn new(config: &SimConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let kernel = Arc::new(VirtualKernel::new());
        let (tx, rx) = sample_channel();
        let drops = DropCounter::new();

        let generator = WaveformGenerator::with_hook(
            Waveform::new(&config.waveform),
            Arc::clone(&kernel),
            tx,
            config.timing.period(),
            drops.clone(),
        );
        let consumer = SampleConsumer::new(
            rx,
            Arc::clone(&kernel),
            Scale::new(&config.waveform, &config.scale),
            config.timing.consumer_delay(),
            sink,
        );

        Ok(Self {
            kernel,
            generator,
            consumer,
            drops,
        })
    }

    /// Runs one produce/consume round.
    ///
    /// Returns `None` only if the sample was dropped, which cannot happen
    /// here because every round drains the slot.
    pub fn step(&mut self) -> Option<Report> {
        match self.generator.tick() {
            Dispatch::Sent(_) => self.consumer.tick().ok(),
            Dispatch::Dropped(_) => None,
        }
    }

    /// Runs `n` rounds and returns the reports they produced.
    pub fn run(&mut self, n: usize) -> Vec<Report> {
        (0..n).filter_map(|_| self.step()).collect()
    }

    #[must_use]
    pub fn now(&self) -> TickInstant {
        self.kernel.tick_count()
    }

    #[must_use]
    pub fn events(&self) -> EventObserver {
        self.consumer.events().observer()
    }

    #[must_use]
    pub fn drops(&self) -> u64 {
        self.drops.get()
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        self.consumer.sink()
    }
}
