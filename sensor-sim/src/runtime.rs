//! Runtime scaffolding around the two tasks.
//!
//! - `kernel`: the timekeeping contract and its host and virtual clocks.
//! - `task`: thread creation with name, priority, stack size and pinning.
//! - `timing`: tick-space coordinates.
//! - `host`: [`Simulation`], both tasks on their own threads.
//! - `pipeline`: [`Pipeline`], both tasks stepped in lock-step on one thread.

mod host;
pub mod kernel;
mod pipeline;
pub mod task;
pub mod timing;

pub use host::{SimError, Simulation};
pub use pipeline::Pipeline;
