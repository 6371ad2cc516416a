//! Lock-free SPSC ring buffer.
//!
//! The producer owns `head` and its cursor, the consumer owns `tail` and its
//! cursor. A slot is written only while `head - tail < N` and read only while
//! `head != tail`, so a slot is never touched by both sides at once.
//!
//! # Safety
//!
//! `push` and `pop` are unsafe: the caller guarantees there is exactly one
//! pushing thread and one popping thread at any time.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Interior-mutable cell touched by exactly one side of the ring.
#[repr(transparent)]
pub(crate) struct SideCell<T>(UnsafeCell<T>);

impl<T> SideCell<T> {
    const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    fn ptr(&self) -> *mut T {
        self.0.get()
    }
}

// SAFETY: every SideCell is accessed only by the side that owns it (cursors)
// or handed over through the Release/Acquire pair on head/tail (slots).
unsafe impl<T: Send> Sync for SideCell<T> {}

/// Write side: published head plus the producer-local slot cursor.
#[repr(align(64))]
struct Head {
    index: AtomicUsize,
    cursor: SideCell<usize>,
}

/// Read side: published tail plus the consumer-local slot cursor.
#[repr(align(64))]
struct Tail {
    index: AtomicUsize,
    cursor: SideCell<usize>,
}

pub(crate) struct Ring<T, const N: usize> {
    head: Head,
    tail: Tail,
    slots: [SideCell<MaybeUninit<T>>; N],
}

impl<T, const N: usize> Ring<T, N> {
    pub(crate) fn new() -> Self {
        Self {
            head: Head {
                index: AtomicUsize::new(0),
                cursor: SideCell::new(0),
            },
            tail: Tail {
                index: AtomicUsize::new(0),
                cursor: SideCell::new(0),
            },
            slots: std::array::from_fn(|_| SideCell::new(MaybeUninit::uninit())),
        }
    }

    /// `(cursor + 1) % N` without the division.
    #[inline]
    const fn bump(cursor: usize) -> usize {
        let next = cursor + 1;
        if next == N { 0 } else { next }
    }

    /// Number of queued items as seen by the caller. Racy by nature.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        let tail = self.tail.index.load(Ordering::Acquire);
        let head = self.head.index.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Writes `item` into the next free slot.
    ///
    /// # Errors
    ///
    /// Hands `item` back when all `N` slots are occupied.
    ///
    /// # Safety
    ///
    /// Only one thread may call `push` at a time.
    #[inline]
    pub(crate) unsafe fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.index.load(Ordering::Relaxed);
        let tail = self.tail.index.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= N {
            return Err(item);
        }

        // SAFETY: the cursor belongs to the producer and stays in [0, N).
        let slot = unsafe { *self.head.cursor.ptr() };

        // SAFETY: head - tail < N, so the consumer is not reading this slot,
        // and it becomes visible only after the Release store below.
        unsafe {
            self.slots[slot].ptr().write(MaybeUninit::new(item));
            *self.head.cursor.ptr() = Self::bump(slot);
        }

        self.head
            .index
            .store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Takes the oldest item, if any.
    ///
    /// # Safety
    ///
    /// Only one thread may call `pop` at a time.
    #[inline]
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        let tail = self.tail.index.load(Ordering::Relaxed);
        let head = self.head.index.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: the cursor belongs to the consumer and stays in [0, N).
        let slot = unsafe { *self.tail.cursor.ptr() };

        // SAFETY: head != tail, so the producer initialized this slot and
        // will not reuse it until the Release store below.
        let item = unsafe {
            let item = self.slots[slot].ptr().read().assume_init();
            *self.tail.cursor.ptr() = Self::bump(slot);
            item
        };

        self.tail
            .index
            .store(tail.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}

impl<T, const N: usize> Drop for Ring<T, N> {
    fn drop(&mut self) {
        // SAFETY: &mut self means neither side is active any more.
        while unsafe { self.pop() }.is_some() {}
    }
}

// SAFETY: items move between threads, so T must be Send. All shared fields
// are atomics or SideCells governed by the SPSC protocol.
unsafe impl<T: Send, const N: usize> Send for Ring<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Ring<T, N> {}
