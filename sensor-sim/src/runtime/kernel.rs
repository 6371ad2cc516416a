//! The kernel collaborator: a tick counter plus absolute and relative delays.
//!
//! Task code only ever sees time through [`Kernel`]. [`HostKernel`] maps ticks
//! onto the wall clock, [`VirtualKernel`] advances instantly so whole ramps
//! can be replayed deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use minstant::Instant;

use crate::runtime::timing::{TickInstant, TickSpan};

/// Timekeeping services the simulation tasks depend on.
pub trait Kernel: Send + Sync {
    /// Current value of the monotonic tick counter.
    fn tick_count(&self) -> TickInstant;

    /// Blocks until `*wake + period`, then advances `*wake` by `period`.
    ///
    /// The next deadline is derived from the previous one rather than from
    /// the current tick, so periodic callers do not accumulate drift. A
    /// deadline already in the past returns immediately.
    fn delay_until(&self, wake: &mut TickInstant, period: TickSpan);

    /// Blocks for `span` ticks counted from now.
    fn delay(&self, span: TickSpan);
}

impl<K: Kernel + ?Sized> Kernel for Arc<K> {
    fn tick_count(&self) -> TickInstant {
        (**self).tick_count()
    }

    fn delay_until(&self, wake: &mut TickInstant, period: TickSpan) {
        (**self).delay_until(wake, period);
    }

    fn delay(&self, span: TickSpan) {
        (**self).delay(span);
    }
}

/// Distance from `now` to `target` if `target` lies at most `period` ticks
/// ahead, `None` if it has already passed.
fn pending(now: TickInstant, target: TickInstant, period: TickSpan) -> Option<TickSpan> {
    let ahead = target.since(now);
    (!ahead.is_zero() && ahead <= period).then_some(ahead)
}

/// Wall-clock kernel: `tick = floor((now - origin) / tick_period)`.
#[derive(Debug)]
pub struct HostKernel {
    origin: Instant,
    tick_nanos: u64,
}

impl HostKernel {
    /// Starts a tick counter at zero with the given tick period.
    ///
    /// # Panics
    ///
    /// Panics if `tick_period` is zero. [`crate::SimConfig::validate`]
    /// rejects a zero tick before this point.
    #[must_use]
    pub fn new(tick_period: Duration) -> Self {
        let tick_nanos = u64::try_from(tick_period.as_nanos()).unwrap_or(u64::MAX);
        assert!(tick_nanos > 0, "tick period must be > 0");
        Self {
            origin: Instant::now(),
            tick_nanos,
        }
    }

    /// Unwrapped tick count since start.
    fn elapsed_ticks(&self) -> u64 {
        let nanos = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        nanos / self.tick_nanos
    }

    /// Sleeps until the counter reads `ticks` (unwrapped).
    fn sleep_until_tick(&self, ticks: u64) {
        let deadline = self.origin + Duration::from_nanos(ticks.saturating_mul(self.tick_nanos));
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining);
        }
    }
}

impl Kernel for HostKernel {
    fn tick_count(&self) -> TickInstant {
        // Truncation to the 32-bit counter width is the wrap.
        TickInstant::new(self.elapsed_ticks() as u32)
    }

    fn delay_until(&self, wake: &mut TickInstant, period: TickSpan) {
        let target = *wake + period;
        let now = self.elapsed_ticks();
        if let Some(ahead) = pending(TickInstant::new(now as u32), target, period) {
            self.sleep_until_tick(now + u64::from(ahead.get()));
        }
        *wake = target;
    }

    fn delay(&self, span: TickSpan) {
        let now = self.elapsed_ticks();
        self.sleep_until_tick(now + u64::from(span.get()));
    }
}

/// Kernel whose clock moves only when someone waits on it.
///
/// `delay_until` jumps the counter to the deadline, `delay` adds the span.
/// Nothing ever sleeps, so a run of N periods costs N loop iterations.
#[derive(Debug, Default)]
pub struct VirtualKernel {
    now: AtomicU32,
}

impl VirtualKernel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the counter at an arbitrary tick, e.g. just below the wrap.
    #[must_use]
    pub fn starting_at(tick: TickInstant) -> Self {
        Self {
            now: AtomicU32::new(tick.get()),
        }
    }

    /// Moves the counter forward without any task waiting.
    pub fn advance(&self, span: TickSpan) {
        self.now.fetch_add(span.get(), Ordering::AcqRel);
    }
}

impl Kernel for VirtualKernel {
    fn tick_count(&self) -> TickInstant {
        TickInstant::new(self.now.load(Ordering::Acquire))
    }

    fn delay_until(&self, wake: &mut TickInstant, period: TickSpan) {
        let target = *wake + period;
        if pending(self.tick_count(), target, period).is_some() {
            self.now.store(target.get(), Ordering::Release);
        }
        *wake = target;
    }

    fn delay(&self, span: TickSpan) {
        self.advance(span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_delay_until_does_not_drift() {
        let kernel = VirtualKernel::new();
        let mut wake = kernel.tick_count();
        let period = TickSpan::new(1000);

        kernel.delay_until(&mut wake, period);
        assert_eq!(kernel.tick_count(), TickInstant::new(1000));

        // Work that overruns part of the period does not shift the lattice.
        kernel.advance(TickSpan::new(250));
        kernel.delay_until(&mut wake, period);
        assert_eq!(kernel.tick_count(), TickInstant::new(2000));
        assert_eq!(wake, TickInstant::new(2000));
    }

    #[test]
    fn virtual_delay_until_in_the_past_returns_immediately() {
        let kernel = VirtualKernel::new();
        let mut wake = kernel.tick_count();

        kernel.advance(TickSpan::new(1500));
        kernel.delay_until(&mut wake, TickSpan::new(1000));

        assert_eq!(kernel.tick_count(), TickInstant::new(1500));
        assert_eq!(wake, TickInstant::new(1000));
    }

    #[test]
    fn virtual_counter_wraps() {
        let kernel = VirtualKernel::starting_at(TickInstant::new(u32::MAX - 4));
        let mut wake = kernel.tick_count();

        kernel.delay_until(&mut wake, TickSpan::new(10));
        assert_eq!(kernel.tick_count(), TickInstant::new(5));
    }

    #[test]
    fn virtual_relative_delay_adds_span() {
        let kernel = VirtualKernel::new();
        kernel.delay(TickSpan::new(1000));
        kernel.delay(TickSpan::new(1000));
        assert_eq!(kernel.tick_count(), TickInstant::new(2000));
    }

    #[test]
    fn host_ticks_advance_with_wall_clock() {
        let kernel = HostKernel::new(Duration::from_millis(1));
        let start = kernel.tick_count();

        kernel.delay(TickSpan::new(5));

        assert!(kernel.tick_count().since(start) >= TickSpan::new(5));
    }

    #[test]
    fn host_delay_until_keeps_period_lattice() {
        let kernel = HostKernel::new(Duration::from_millis(1));
        let mut wake = kernel.tick_count();
        let origin = wake;

        for _ in 0..3 {
            kernel.delay_until(&mut wake, TickSpan::new(4));
        }

        assert_eq!(wake.since(origin), TickSpan::new(12));
        assert!(kernel.tick_count().since(origin) >= TickSpan::new(12));
    }

    #[test]
    #[should_panic(expected = "tick period must be > 0")]
    fn host_rejects_zero_tick() {
        let _ = HostKernel::new(Duration::ZERO);
    }
}
