//! Software peripheral model for host-run unit tests.
//!
//! Stands in for the ISR side of the hardware: tests call
//! `advance_ticks`/`advance_cycles`/`fire_capture`/`push_rx_byte` to drive
//! the session the same way the real interrupts would, then assert on the
//! `Session`'s resulting state.

use crate::{CaptureChannel, Edge, Pin, RxStatus, ScPeripherals, TimerId};

#[derive(Debug, Clone, Copy, Default)]
struct Capture {
    armed: Option<Edge>,
    latched: u16,
}

pub struct MockPeripherals {
    tick: u16,
    cycle: u16,
    tick_period: u16,
    cycle_period: u16,
    tick_running: bool,
    cycle_running: bool,
    captures: [Capture; 3],
    uart_enabled: bool,
    uart_brg: u16,
    rx_queue: heapless::Deque<(u8, RxStatus), 16>,
    pins: [bool; 3],
}

impl Default for MockPeripherals {
    fn default() -> Self {
        Self {
            tick: 0,
            cycle: 0,
            tick_period: 0xFFFF,
            cycle_period: 0xFFFF,
            tick_running: false,
            cycle_running: false,
            captures: [Capture::default(); 3],
            uart_enabled: false,
            uart_brg: 0,
            rx_queue: heapless::Deque::new(),
            pins: [false, true, true], // Vbus, Hrst, Hio indices
        }
    }
}

impl MockPeripherals {
    pub fn new() -> Self {
        Self::default()
    }

    fn idx(ch: CaptureChannel) -> usize {
        match ch {
            CaptureChannel::Clk => 0,
            CaptureChannel::Hrst => 1,
            CaptureChannel::Hio => 2,
        }
    }

    fn pin_idx(p: Pin) -> usize {
        match p {
            Pin::Vbus => 0,
            Pin::Hrst => 1,
            Pin::Hio => 2,
        }
    }

    pub fn set_pin(&mut self, p: Pin, value: bool) {
        self.pins[Self::pin_idx(p)] = value;
    }

    /// Advances the tick counter by `n` without wrapping (tests stay well
    /// under `u16::MAX`; rollover behaviour is exercised separately).
    pub fn advance_ticks(&mut self, n: u16) {
        if self.tick_running {
            self.tick = self.tick.wrapping_add(n);
        }
    }

    pub fn advance_cycles(&mut self, n: u16) {
        if self.cycle_running {
            self.cycle = self.cycle.wrapping_add(n);
        }
    }

    /// Simulates an edge arriving on an armed capture channel: latches the
    /// owning counter's current value (CLK/HRST latch the cycle counter per
    /// the real IC1/IC2 wiring in `stm32f411`; HIO latches the tick
    /// counter) and returns whether the channel was actually armed.
    pub fn fire_capture(&mut self, ch: CaptureChannel) -> bool {
        let i = Self::idx(ch);
        if self.captures[i].armed.is_none() {
            return false;
        }
        self.captures[i].latched = match ch {
            CaptureChannel::Clk => self.cycle,
            CaptureChannel::Hrst | CaptureChannel::Hio => self.tick,
        };
        true
    }

    pub fn push_rx_byte(&mut self, byte: u8) {
        let _ = self.rx_queue.push_back((byte, RxStatus::default()));
    }

    pub fn push_rx_error(&mut self, byte: u8, status: RxStatus) {
        let _ = self.rx_queue.push_back((byte, status));
    }

    pub fn uart_enabled(&self) -> bool {
        self.uart_enabled
    }

    pub fn uart_brg(&self) -> u16 {
        self.uart_brg
    }

    pub fn capture_armed(&self, ch: CaptureChannel) -> bool {
        self.captures[Self::idx(ch)].armed.is_some()
    }
}

impl ScPeripherals for MockPeripherals {
    fn timer_reset(&mut self, t: TimerId) {
        match t {
            TimerId::Tick => self.tick = 0,
            TimerId::Cycle => self.cycle = 0,
        }
    }

    fn timer_start(&mut self, t: TimerId) {
        match t {
            TimerId::Tick => self.tick_running = true,
            TimerId::Cycle => self.cycle_running = true,
        }
    }

    fn timer_stop(&mut self, t: TimerId) {
        match t {
            TimerId::Tick => self.tick_running = false,
            TimerId::Cycle => self.cycle_running = false,
        }
    }

    fn timer_period_set(&mut self, t: TimerId, period: u16) {
        match t {
            TimerId::Tick => self.tick_period = period,
            TimerId::Cycle => self.cycle_period = period,
        }
    }

    fn timer_value(&self, t: TimerId) -> u16 {
        match t {
            TimerId::Tick => self.tick,
            TimerId::Cycle => self.cycle,
        }
    }

    fn capture_arm(&mut self, ch: CaptureChannel, edge: Edge) {
        self.captures[Self::idx(ch)].armed = Some(edge);
    }

    fn capture_disarm(&mut self, ch: CaptureChannel) {
        self.captures[Self::idx(ch)].armed = None;
    }

    fn capture_latched(&self, ch: CaptureChannel) -> u16 {
        self.captures[Self::idx(ch)].latched
    }

    fn uart_configure(&mut self, brg: u16) {
        self.uart_brg = brg;
    }

    fn uart_enable(&mut self, on: bool) {
        self.uart_enabled = on;
    }

    fn uart_rx_drain(&mut self) -> Option<(u8, RxStatus)> {
        if !self.uart_enabled {
            return None;
        }
        self.rx_queue.pop_front()
    }

    fn pin_read(&self, pin: Pin) -> bool {
        self.pins[Self::pin_idx(pin)]
    }
}
