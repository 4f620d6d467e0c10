//! The generic circular buffer behind both the notification ring and the
//! receive byte ring (§3, §4.5). One slot is always left unused so that
//! `write == read` is unambiguously "empty"; `(write + 1) % N == read` is
//! "full".
//!
//! The producer side is guarded by a short `critical_section` because
//! several distinct interrupt vectors publish into the same ring (the
//! rollover, capture and UART-Rx handlers all call into the FSM, which in
//! turn pushes notifications) — see DESIGN.md for why a plain SPSC ring
//! does not fit without this. The consumer side (the foreground reporter,
//! the only reader) is lock-free: one `Acquire` load of `write` paired
//! with the producer's `Release` store of the same variable, per §4.5's
//! memory-ordering note.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct SpscRing<T: Copy, const N: usize> {
    buffer: UnsafeCell<[MaybeUninit<T>; N]>,
    read: AtomicUsize,
    write: AtomicUsize,
    overflow: AtomicBool,
}

unsafe impl<T: Copy, const N: usize> Sync for SpscRing<T, N> {}

impl<T: Copy, const N: usize> SpscRing<T, N> {
    pub const fn new() -> Self {
        Self {
            // Safety: an array of `MaybeUninit<T>` is valid in any bit
            // pattern, including uninitialized, so assuming init on the
            // outer `MaybeUninit<[MaybeUninit<T>; N]>` is sound.
            buffer: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
        }
    }

    /// Producer side: called from interrupt context. On a full ring, sets
    /// the sticky overflow flag and drops the value rather than blocking.
    pub fn push(&self, value: T) {
        critical_section::with(|_| {
            let read = self.read.load(Ordering::Acquire);
            let write = self.write.load(Ordering::Relaxed);
            let next = (write + 1) % N;
            if next == read {
                self.overflow.store(true, Ordering::Relaxed);
                return;
            }
            unsafe {
                (*self.buffer.get())[write] = MaybeUninit::new(value);
            }
            self.write.store(next, Ordering::Release);
        });
    }

    /// Consumer side: called only from the foreground reporter.
    pub fn pop(&self) -> Option<T> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        if read == write {
            return None;
        }
        let value = unsafe { (*self.buffer.get())[read].assume_init() };
        self.read.store((read + 1) % N, Ordering::Release);
        Some(value)
    }

    /// Returns and clears the sticky overflow flag. Meant to be read once
    /// per foreground drain (§4.5, §7 item 3).
    pub fn take_overflow(&self) -> bool {
        self.overflow.swap(false, Ordering::Relaxed)
    }

    /// Drains and discards everything, clearing the overflow flag too.
    /// Used when `start()` resets session state (§4.1: "clear rings").
    pub fn clear(&self) {
        while self.pop().is_some() {}
        self.overflow.store(false, Ordering::Relaxed);
    }
}

impl<T: Copy, const N: usize> Default for SpscRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_without_overflow() {
        let ring: SpscRing<u8, 8> = SpscRing::new();
        for i in 0..5u8 {
            ring.push(i);
        }
        let mut drained = heapless::Vec::<u8, 8>::new();
        while let Some(v) = ring.pop() {
            drained.push(v).unwrap();
        }
        assert_eq!(drained.as_slice(), &[0, 1, 2, 3, 4]);
        assert!(!ring.take_overflow());
    }

    #[test]
    fn overflow_is_sticky_then_clears_once() {
        let ring: SpscRing<u8, 4> = SpscRing::new();
        // Usable capacity is N - 1 = 3.
        for i in 0..6u8 {
            ring.push(i);
        }
        assert!(ring.take_overflow());
        assert!(!ring.take_overflow());
    }

    #[test]
    fn notify_overflow_scenario_33_into_32() {
        let ring: SpscRing<u8, 32> = SpscRing::new();
        for i in 0..33u8 {
            ring.push(i);
        }
        let mut count = 0;
        while ring.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 31);
        assert!(ring.take_overflow());
    }
}
