//! # sc_hal
//!
//! Peripheral abstraction for the ISO 7816 sniffer.
//!
//! ## Responsibilities
//! - Defines [`ScPeripherals`], the thin, non-blocking interface the session
//!   FSM and ATR parser use to touch hardware: two free-running counters
//!   (tick, cycle), three edge-capture channels (CLK/HRST/HIO), and one
//!   UART fixed at 8 data bits / even parity / 2 stop bits.
//! - Provides [`stm32f411::Stm32ScPeripherals`], a concrete implementation
//!   for the target board.
//! - Provides [`mock::MockPeripherals`], a software model driven by direct
//!   method calls, used by `sc_core`'s host-run unit tests.
//!
//! ## What this crate does NOT do
//! - It does not decide when to arm or disarm anything — that is the
//!   session FSM's job (`sc_core::session`).
//! - It does not parse ATR bytes or compute baud rates.

#![no_std]

/// The two free-running counters: T_tick counts CLK edges, T_cycle counts
/// host-cycle ticks. Both are 16-bit hardware counters; callers extend them
/// to 32 bits by counting rollovers (see `sc_core::timing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    Tick,
    Cycle,
}

/// The three sniffed edge-capture channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureChannel {
    Clk,
    Hrst,
    Hio,
}

/// Edge polarity to arm a capture channel for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// The digital pins read directly (not through a capture channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    Vbus,
    Hrst,
    Hio,
}

/// Per-byte receive error flags, surfaced alongside the byte (§7 item 4:
/// receive errors are non-fatal and pass through the data stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxStatus {
    pub parity: bool,
    pub framing: bool,
}

/// Non-blocking operations the session FSM and ATR parser use to touch
/// hardware (§4.4). Every method must be callable from any interrupt
/// priority at or above its own and must not block.
pub trait ScPeripherals {
    fn timer_reset(&mut self, t: TimerId);
    fn timer_start(&mut self, t: TimerId);
    fn timer_stop(&mut self, t: TimerId);
    fn timer_period_set(&mut self, t: TimerId, period: u16);
    fn timer_value(&self, t: TimerId) -> u16;

    fn capture_arm(&mut self, ch: CaptureChannel, edge: Edge);
    fn capture_disarm(&mut self, ch: CaptureChannel);
    fn capture_latched(&self, ch: CaptureChannel) -> u16;

    /// Programs the UART divisor. Format is fixed at 8 data bits, even
    /// parity, 2 stop bits (§6); only the divisor varies per session.
    fn uart_configure(&mut self, brg: u16);
    fn uart_enable(&mut self, on: bool);
    /// Drains one received byte, if any, along with its error flags.
    fn uart_rx_drain(&mut self) -> Option<(u8, RxStatus)>;

    fn pin_read(&self, pin: Pin) -> bool;
}

pub mod mock;
#[cfg(feature = "target")]
pub mod stm32f411;
