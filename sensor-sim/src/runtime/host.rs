//! Threaded host run: generator and consumer as two OS threads sharing a
//! wall-clock kernel.
//!
//! # Startup
//!
//! The consumer is spawned first so it is already blocked on the channel
//! when the first sample arrives. A task that cannot be created is reported
//! as [`SimError::Spawn`]. If the generator fails, its channel end is dropped
//! with the closure, so the consumer disconnects and is joined before the
//! error is returned.
//!
//! # Shutdown
//!
//! [`Simulation::shutdown`] raises the flag, the generator leaves its loop
//! after the current period and drops its channel end, and the consumer
//! leaves its loop on the resulting disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::config::{ConfigError, SimConfig};
use crate::consumer::{EventObserver, ReportSink, SampleConsumer};
use crate::data::{Scale, sample_channel};
use crate::generator::{DropCounter, Waveform, WaveformGenerator};
use crate::runtime::kernel::HostKernel;
use crate::trace::{debug, error, info};

/// Error starting the simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The OS refused to create a task thread.
    #[error("failed to create task {task}: {source}")]
    Spawn {
        task: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to the running tasks.
///
/// Dropping the handle raises the shutdown flag without joining.
pub struct Simulation {
    shutdown_flag: Arc<AtomicBool>,
    generator_handle: Option<JoinHandle<()>>,
    consumer_handle: Option<JoinHandle<()>>,
    events: EventObserver,
    drops: DropCounter,
}

impl Simulation {
    /// Validates `config` and starts both tasks.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] for an invalid configuration,
    /// [`SimError::Spawn`] if either thread cannot be created.
    pub fn spawn<S>(config: &SimConfig, sink: S) -> Result<Self, SimError>
    where
        S: ReportSink + 'static,
    {
        config.validate()?;
        info!(
            tick_us = config.timing.tick.as_micros() as u64,
            period_ticks = config.timing.period_ticks,
            consumer_delay_ticks = config.timing.consumer_delay_ticks,
            lower = config.waveform.lower,
            upper = config.waveform.upper,
            pin_core = ?config.tasks.pin_core,
            "simulation starting"
        );

        let kernel = Arc::new(HostKernel::new(config.timing.tick));
        let (tx, rx) = sample_channel();
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let drops = DropCounter::new();
        let core = config.tasks.pin_core;

        let mut consumer = SampleConsumer::new(
            rx,
            Arc::clone(&kernel),
            Scale::new(&config.waveform, &config.scale),
            config.timing.consumer_delay(),
            sink,
        );
        let events = consumer.events().observer();

        let spec = &config.tasks.consumer;
        let consumer_handle = spec
            .spawn(core, move || consumer.run())
            .map_err(|source| spawn_failed(&spec.name, source))?;

        let mut generator = WaveformGenerator::with_hook(
            Waveform::new(&config.waveform),
            kernel,
            tx,
            config.timing.period(),
            drops.clone(),
        );
        let generator_flag = Arc::clone(&shutdown_flag);

        let spec = &config.tasks.generator;
        let generator_handle = match spec.spawn(core, move || generator.run(&generator_flag)) {
            Ok(handle) => handle,
            Err(source) => {
                debug!("releasing consumer task after failed start");
                if consumer_handle.join().is_err() {
                    error!("consumer task panicked");
                }
                return Err(spawn_failed(&spec.name, source));
            }
        };

        info!("simulation started");

        Ok(Self {
            shutdown_flag,
            generator_handle: Some(generator_handle),
            consumer_handle: Some(consumer_handle),
            events,
            drops,
        })
    }

    /// Stops both tasks and waits for them to exit.
    pub fn shutdown(mut self) {
        info!(events = self.events.get(), drops = self.drops.get(), "simulation shutdown initiated");
        self.shutdown_flag.store(true, Ordering::Relaxed);

        if let Some(handle) = self.generator_handle.take() {
            debug!("waiting for generator task to exit");
            if handle.join().is_err() {
                error!("generator task panicked");
            }
        }
        if let Some(handle) = self.consumer_handle.take() {
            debug!("waiting for consumer task to exit");
            if handle.join().is_err() {
                error!("consumer task panicked");
            }
        }

        info!("simulation shutdown complete");
    }

    /// Shared shutdown flag, for signal handlers.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_flag)
    }

    /// Samples consumed so far.
    #[must_use]
    pub fn events(&self) -> EventObserver {
        self.events.clone()
    }

    /// Samples dropped on a full channel so far.
    #[must_use]
    pub fn drops(&self) -> u64 {
        self.drops.get()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}

fn spawn_failed(task: &str, source: std::io::Error) -> SimError {
    error!(task, error = %source, "task creation failed");
    SimError::Spawn {
        task: task.to_owned(),
        source,
    }
}
