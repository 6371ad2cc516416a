//! Real-time sensor simulation: a periodic waveform generator hands
//! timestamped readings to a temperature consumer through a one-slot channel.
//!
//! - [`generator`]: triangular ramp producer, one sample per period.
//! - [`consumer`]: blocking receiver, affine conversion, reporting.
//! - [`data`]: sample types and the packed transport value.
//! - [`sync`]: the SPSC hand-off channel.
//! - [`runtime`]: the kernel contract, tick clock, tasks and the host runner.

pub mod config;
pub mod consumer;
pub mod data;
pub mod generator;
pub mod runtime;
pub mod sync;

mod spsc;
mod trace;

pub use config::{ConfigError, ScaleConfig, SimConfig, TaskConfig, TimingConfig, WaveformConfig};
pub use consumer::{EventCounter, EventObserver, LineSink, Report, ReportSink, SampleConsumer};
pub use data::{MilliCelsius, Millivolts, Sample, Transport};
pub use generator::{Dispatch, DropCounter, OverrunHook, Waveform, WaveformGenerator};
pub use runtime::{Pipeline, SimError, Simulation};
pub use trace::init_tracing;
