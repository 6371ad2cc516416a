//! Bounded SPSC hand-off channel with a non-blocking send and a blocking
//! receive.
//!
//! The sample pipeline uses a one-slot instance: the producer never waits,
//! and the consumer sleeps until a value lands or the producer goes away.
//!
//! ```
//! use sensor_sim::sync::spsc::{self, Timeout};
//!
//! let (tx, rx) = spsc::channel::<u64, 1>();
//! tx.push(7).unwrap();
//! assert_eq!(tx.push(8), Err(8));
//! assert_eq!(rx.recv(Timeout::Infinite), Ok(7));
//! ```
//!
//! # Blocking
//!
//! `recv` spins for a short while, then registers the calling thread and
//! parks it. `push` and producer drop unpark a registered thread. Both sides
//! put a `SeqCst` fence between publishing their own flag and reading the
//! other's, so a wake-up cannot slip between the consumer's last emptiness
//! check and its park.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering, fence};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, Thread};
use std::time::Duration;

use minstant::Instant;

use crate::spsc::ring::Ring;

/// Spins before the consumer parks.
const SPIN_LIMIT: u32 = 64;

/// Timeout specification for blocking receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Why a blocking receive returned without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// The wait deadline passed with the channel still empty.
    #[error("receive timed out")]
    Timeout,
    /// The producer was dropped and the channel is drained.
    #[error("producer disconnected")]
    Disconnected,
}

struct Shared<T, const N: usize> {
    ring: Ring<T, N>,
    closed: AtomicBool,
    sleeping: AtomicBool,
    waiter: Mutex<Option<Thread>>,
}

impl<T, const N: usize> Shared<T, N> {
    fn wake(&self) {
        fence(Ordering::SeqCst);
        if self.sleeping.load(Ordering::Relaxed) {
            let waiter = self.waiter.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(thread) = waiter.as_ref() {
                thread.unpark();
            }
        }
    }
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end. `Send` but not `Sync`: exactly one thread pushes.
pub struct Producer<T: Send, const N: usize> {
    shared: Arc<Shared<T, N>>,
    _unsync: PhantomUnsync,
}

/// Read end. `Send` but not `Sync`: exactly one thread receives.
pub struct Consumer<T: Send, const N: usize> {
    shared: Arc<Shared<T, N>>,
    _unsync: PhantomUnsync,
}

struct CapacityCheck<const N: usize>;

impl<const N: usize> CapacityCheck<N> {
    const OK: () = assert!(N > 0, "channel capacity must be greater than 0");
}

/// Creates a channel holding at most `N` values.
///
/// Fails to compile if `N == 0`.
#[must_use]
pub fn channel<T: Send, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    let () = CapacityCheck::<N>::OK;

    let shared = Arc::new(Shared {
        ring: Ring::new(),
        closed: AtomicBool::new(false),
        sleeping: AtomicBool::new(false),
        waiter: Mutex::new(None),
    });

    let producer = Producer {
        shared: Arc::clone(&shared),
        _unsync: PhantomData,
    };
    let consumer = Consumer {
        shared,
        _unsync: PhantomData,
    };
    (producer, consumer)
}

impl<T: Send, const N: usize> Producer<T, N> {
    /// Pushes without waiting.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the channel is full.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        // SAFETY: the producer is !Sync and unique per channel.
        unsafe { self.shared.ring.push(item) }?;
        self.shared.wake();
        Ok(())
    }

    /// Returns true if every slot is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.shared.ring.len() >= N
    }
}

impl<T: Send, const N: usize> Drop for Producer<T, N> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.wake();
    }
}

impl<T: Send, const N: usize> Consumer<T, N> {
    /// Takes a value without waiting.
    #[inline]
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        // SAFETY: the consumer is !Sync and unique per channel.
        unsafe { self.shared.ring.pop() }
    }

    /// Returns true if no value is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.ring.len() == 0
    }

    /// Blocks until a value arrives.
    ///
    /// Values pushed before the producer was dropped are still delivered.
    ///
    /// # Errors
    ///
    /// [`RecvError::Timeout`] when a finite wait expires,
    /// [`RecvError::Disconnected`] when the producer is gone and nothing is
    /// left to read.
    pub fn recv(&self, timeout: Timeout) -> Result<T, RecvError> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };

        for _ in 0..SPIN_LIMIT {
            if let Some(item) = self.pop() {
                return Ok(item);
            }
            std::hint::spin_loop();
        }

        *self
            .shared
            .waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current());

        let result = loop {
            self.shared.sleeping.store(true, Ordering::Relaxed);
            fence(Ordering::SeqCst);

            if let Some(item) = self.pop() {
                break Ok(item);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                break self.pop().ok_or(RecvError::Disconnected);
            }

            match deadline {
                None => thread::park(),
                Some(dl) => match dl.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => thread::park_timeout(remaining),
                    _ => break Err(RecvError::Timeout),
                },
            }
        };

        self.shared.sleeping.store(false, Ordering::Relaxed);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_to_full_single_slot_is_rejected() {
        let (tx, rx) = channel::<u64, 1>();

        assert!(tx.push(1).is_ok());
        assert!(tx.is_full());
        assert_eq!(tx.push(2), Err(2));
        assert_eq!(rx.pop(), Some(1));
        assert!(rx.is_empty());
        assert!(tx.push(3).is_ok());
    }

    #[test]
    fn recv_times_out_on_empty_channel() {
        let (_tx, rx) = channel::<u64, 1>();

        let started = Instant::now();
        let result = rx.recv(Timeout::from(Duration::from_millis(20)));

        assert_eq!(result, Err(RecvError::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn recv_drains_before_reporting_disconnect() {
        let (tx, rx) = channel::<u64, 1>();
        tx.push(9).unwrap();
        drop(tx);

        assert_eq!(rx.recv(Timeout::Infinite), Ok(9));
        assert_eq!(rx.recv(Timeout::Infinite), Err(RecvError::Disconnected));
    }

    #[test]
    fn blocked_receiver_is_woken_by_push() {
        let (tx, rx) = channel::<u64, 1>();

        let receiver = thread::spawn(move || rx.recv(Timeout::Infinite));
        thread::sleep(Duration::from_millis(30));
        tx.push(42).unwrap();

        assert_eq!(receiver.join().unwrap(), Ok(42));
    }

    #[test]
    fn blocked_receiver_is_woken_by_drop() {
        let (tx, rx) = channel::<u64, 1>();

        let receiver = thread::spawn(move || rx.recv(Timeout::Infinite));
        thread::sleep(Duration::from_millis(30));
        drop(tx);

        assert_eq!(receiver.join().unwrap(), Err(RecvError::Disconnected));
    }

    #[test]
    fn strict_alternation_preserves_order() {
        let (tx, rx) = channel::<u64, 1>();
        let count = 500u64;

        let producer = thread::spawn(move || {
            for i in 0..count {
                let mut item = i;
                while let Err(back) = tx.push(item) {
                    item = back;
                    thread::yield_now();
                }
            }
        });

        let received: Vec<u64> = std::iter::from_fn(|| rx.recv(Timeout::Infinite).ok()).collect();
        producer.join().unwrap();

        assert_eq!(received, (0..count).collect::<Vec<_>>());
    }
}
