//! Simulation configuration.
//!
//! [`SimConfig::default`] reproduces the reference demo: a 0..10 V ramp in
//! 20 steps per half period, mapped onto -25..85 °C, one sample per second on
//! a 1 kHz tick, and a consumer that pauses 1000 ticks after every report.
//!
//! # Tuning
//!
//! - Keep `consumer_delay_ticks <= period_ticks`, otherwise the consumer has
//!   not drained the slot when the next sample is sent and samples are
//!   dropped.
//! - Use [`SimConfig::fast`] in tests: same shape, microsecond ticks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::task::{Priority, TaskSpec};
use crate::runtime::timing::TickSpan;

/// Bounds and step count of the triangular ramp, in millivolts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformConfig {
    pub lower: u32,
    pub upper: u32,
    /// Steps from one bound to the other. The gradient is `range / steps`.
    pub steps: u32,
}

impl WaveformConfig {
    /// Magnitude of the per-period step.
    #[must_use]
    pub fn gradient(&self) -> i32 {
        let step = self.upper.saturating_sub(self.lower) / self.steps.max(1);
        i32::try_from(step).unwrap_or(i32::MAX)
    }
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            lower: 0,
            upper: 10_000,
            steps: 20,
        }
    }
}

/// Temperature range the reading range maps onto, in thousandths of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub t_lower: i32,
    pub t_upper: i32,
    /// Unit name printed after `E-3` in report lines.
    pub unit: String,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            t_lower: -25_000,
            t_upper: 85_000,
            // Spelled as the reference demo prints it.
            unit: "Celcius".to_owned(),
        }
    }
}

/// Tick rate and task periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Length of one kernel tick.
    ///
    /// **Default**: 1ms
    pub tick: Duration,

    /// Ticks between generator wake-ups.
    ///
    /// **Default**: 1000
    pub period_ticks: u32,

    /// Ticks the consumer sleeps after each report.
    ///
    /// **Default**: 1000
    pub consumer_delay_ticks: u32,
}

impl TimingConfig {
    #[must_use]
    pub const fn period(&self) -> TickSpan {
        TickSpan::new(self.period_ticks)
    }

    #[must_use]
    pub const fn consumer_delay(&self) -> TickSpan {
        TickSpan::new(self.consumer_delay_ticks)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1),
            period_ticks: 1000,
            consumer_delay_ticks: 1000,
        }
    }
}

/// Creation parameters for the two tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub generator: TaskSpec,
    pub consumer: TaskSpec,
    /// Pin both tasks to this CPU. `None` leaves placement to the OS.
    pub pin_core: Option<usize>,
}

/// Smallest stack accepted for a task.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

const DEFAULT_STACK_SIZE: usize = 64 * 1024;

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            generator: TaskSpec::new("TX", Priority::above_idle(1), DEFAULT_STACK_SIZE),
            consumer: TaskSpec::new("Rx", Priority::above_idle(2), DEFAULT_STACK_SIZE),
            pin_core: None,
        }
    }
}

/// Error raised by [`SimConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("reading bounds inverted or empty: lower {lower} >= upper {upper}")]
    EmptyRange { lower: u32, upper: u32 },
    #[error("ramp needs at least one step")]
    ZeroSteps,
    #[error("reading range {range} is not a multiple of {steps} steps")]
    UnevenRamp { range: u32, steps: u32 },
    #[error("ramp step {step} does not fit a signed 32-bit gradient")]
    GradientOverflow { step: u32 },
    #[error("temperature bounds inverted or empty: {t_lower} >= {t_upper}")]
    EmptyScale { t_lower: i32, t_upper: i32 },
    #[error("tick length must be non-zero")]
    ZeroTick,
    #[error("generator period must be at least one tick")]
    ZeroPeriod,
    #[error("consumer priority {consumer} must be above generator priority {generator}")]
    PriorityInversion { consumer: u8, generator: u8 },
    #[error("task {task} stack of {size} bytes is below the {min} byte minimum")]
    StackTooSmall {
        task: String,
        size: usize,
        min: usize,
    },
    #[error("reading {reading} is not on the ramp of {config:?}")]
    OffRamp {
        reading: u32,
        config: WaveformConfig,
    },
}

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub waveform: WaveformConfig,
    pub scale: ScaleConfig,
    pub timing: TimingConfig,
    pub tasks: TaskConfig,
}

impl SimConfig {
    /// Reference shape on a 50µs tick with a 20-tick period, for tests.
    #[must_use]
    pub fn fast() -> Self {
        Self::default().with_timing(TimingConfig {
            tick: Duration::from_micros(50),
            period_ticks: 20,
            consumer_delay_ticks: 5,
        })
    }

    /// Checks every invariant the tasks rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let WaveformConfig {
            lower,
            upper,
            steps,
        } = self.waveform;
        if lower >= upper {
            return Err(ConfigError::EmptyRange { lower, upper });
        }
        if steps == 0 {
            return Err(ConfigError::ZeroSteps);
        }
        let range = upper - lower;
        if range % steps != 0 {
            return Err(ConfigError::UnevenRamp { range, steps });
        }
        let step = range / steps;
        if i32::try_from(step).is_err() || upper.checked_add(step).is_none() {
            return Err(ConfigError::GradientOverflow { step });
        }

        if self.scale.t_lower >= self.scale.t_upper {
            return Err(ConfigError::EmptyScale {
                t_lower: self.scale.t_lower,
                t_upper: self.scale.t_upper,
            });
        }

        if self.timing.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.timing.period_ticks == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        let TaskConfig {
            generator,
            consumer,
            ..
        } = &self.tasks;
        if consumer.priority <= generator.priority {
            return Err(ConfigError::PriorityInversion {
                consumer: consumer.priority.0,
                generator: generator.priority.0,
            });
        }
        for task in [generator, consumer] {
            if task.stack_size < MIN_STACK_SIZE {
                return Err(ConfigError::StackTooSmall {
                    task: task.name.clone(),
                    size: task.stack_size,
                    min: MIN_STACK_SIZE,
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn with_waveform(mut self, waveform: WaveformConfig) -> Self {
        self.waveform = waveform;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.timing.tick = tick;
        self
    }

    #[must_use]
    pub const fn with_period_ticks(mut self, ticks: u32) -> Self {
        self.timing.period_ticks = ticks;
        self
    }

    #[must_use]
    pub const fn with_consumer_delay_ticks(mut self, ticks: u32) -> Self {
        self.timing.consumer_delay_ticks = ticks;
        self
    }

    #[must_use]
    pub const fn with_pin_core(mut self, core: Option<usize>) -> Self {
        self.tasks.pin_core = core;
        self
    }
}
