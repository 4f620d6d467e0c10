//! The session FSM (§4.1): the only layer allowed to mutate peripheral
//! configuration once the sniffer is running. Every public method here is
//! either an ISR entry point (`on_*`) or a lifecycle operation exposed to
//! the mode-multiplexer (§6).

use crate::atr::{AtrParser, ReadOutcome};
use crate::config::{ATR_MAX_LEN, COUNTER_PERIOD, SC_NOTIFY_BUFFER_SIZE, SC_RX_BUFFER_SIZE};
use crate::notify::NotifyCode;
use crate::ring::SpscRing;
use crate::state::SessionState;
use crate::timing::{RateEstimate, ResetTimings, RolloverCounter};
use sc_hal::{CaptureChannel, Edge, Pin, RxStatus, ScPeripherals, TimerId};

/// Why `start()` refused to arm the sniffer (§4.1 "Start precondition").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefusal {
    BusActive,
}

impl StartRefusal {
    pub const fn message(self) -> &'static str {
        match self {
            StartRefusal::BusActive => "start refused: bus appears to be active",
        }
    }
}

/// What `stop()` hands back for the foreground to print (§6: "print
/// session summary including the captured ATR bytes").
#[derive(Debug, Clone, Copy)]
pub struct StopSummary {
    pub state_before: SessionState,
    pub atr: [u8; ATR_MAX_LEN],
    pub atr_len: usize,
    pub rate: Option<RateEstimate>,
    /// Tick/cycle rollover counts since the session started (§12).
    pub tick_multiplier: u32,
    pub cycle_multiplier: u32,
}

impl StopSummary {
    pub fn atr_bytes(&self) -> &[u8] {
        &self.atr[..self.atr_len]
    }
}

/// Owns the peripheral handle, the session state, both rollover counters,
/// the ATR parser and both rings (§3 `ParserState`, §5 "the peripheral
/// configuration is a process-wide resource owned by the FSM").
pub struct Session<P: ScPeripherals> {
    hal: P,
    state: SessionState,
    tick: RolloverCounter,
    cycle: RolloverCounter,
    clk_start_cycles: u32,
    reset_timings: ResetTimings,
    rate: Option<RateEstimate>,
    atr: AtrParser,
    notify: SpscRing<NotifyCode, SC_NOTIFY_BUFFER_SIZE>,
    rx: SpscRing<(u8, RxStatus), SC_RX_BUFFER_SIZE>,
    #[cfg(feature = "profile")]
    profile: crate::profile::ProfileLog,
}

impl<P: ScPeripherals> Session<P> {
    pub const fn new(hal: P) -> Self {
        Self {
            hal,
            state: SessionState::Manual,
            tick: RolloverCounter::new(),
            cycle: RolloverCounter::new(),
            clk_start_cycles: 0,
            reset_timings: ResetTimings { reset_ack: None, reset_end: None },
            rate: None,
            atr: AtrParser::new(),
            notify: SpscRing::new(),
            rx: SpscRing::new(),
            #[cfg(feature = "profile")]
            profile: crate::profile::ProfileLog::new(),
        }
    }

    #[cfg(feature = "profile")]
    pub fn profile_events(&self) -> &[crate::profile::ProfileEvent] {
        self.profile.events()
    }

    #[cfg(feature = "profile")]
    fn record_profile(&mut self, tick: u32, label: &'static str) {
        self.profile.record(tick, label);
    }

    #[cfg(not(feature = "profile"))]
    fn record_profile(&mut self, _tick: u32, _label: &'static str) {}

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rate(&self) -> Option<RateEstimate> {
        self.rate
    }

    pub fn reset_timings(&self) -> ResetTimings {
        self.reset_timings
    }

    pub fn clk_start_cycles(&self) -> u32 {
        self.clk_start_cycles
    }

    pub fn atr_bytes(&self) -> &[u8] {
        self.atr.buffer().as_slice()
    }

    pub fn notify_ring(&self) -> &SpscRing<NotifyCode, SC_NOTIFY_BUFFER_SIZE> {
        &self.notify
    }

    pub fn rx_ring(&self) -> &SpscRing<(u8, RxStatus), SC_RX_BUFFER_SIZE> {
        &self.rx
    }

    /// Binds peripherals to a known-quiet baseline, leaving the FSM in
    /// `MANUAL` (§6 `setup()`).
    pub fn setup(&mut self) {
        self.teardown_all();
    }

    /// Unbinds peripherals (§6 `cleanup()`). The peripheral handle is
    /// owned by value, so nothing is literally released; this leaves the
    /// session in the same inert state `setup()` would produce.
    pub fn cleanup(&mut self) {
        self.teardown_all();
    }

    fn teardown_all(&mut self) {
        self.hal.timer_stop(TimerId::Tick);
        self.hal.timer_stop(TimerId::Cycle);
        self.hal.capture_disarm(CaptureChannel::Clk);
        self.hal.capture_disarm(CaptureChannel::Hrst);
        self.hal.capture_disarm(CaptureChannel::Hio);
        self.hal.uart_enable(false);
        self.state = SessionState::Manual;
    }

    /// `MANUAL -> OFFLINE` if the bus reads idle, otherwise a refusal
    /// (§4.1 "Start precondition"). Idle is `VBUS` low and `HRST`/`HIO`
    /// both high, matching the inactive levels of an active-low reset
    /// line and an open-collector I/O line at rest.
    pub fn start(&mut self) -> Result<(), StartRefusal> {
        let vbus = self.hal.pin_read(Pin::Vbus);
        let hrst_idle = self.hal.pin_read(Pin::Hrst);
        let hio_idle = self.hal.pin_read(Pin::Hio);
        if vbus || !hrst_idle || !hio_idle {
            return Err(StartRefusal::BusActive);
        }

        self.notify.clear();
        self.rx.clear();
        self.tick.reset();
        self.cycle.reset();
        self.reset_timings = ResetTimings::default();
        self.rate = None;
        self.clk_start_cycles = 0;
        self.atr.reset();
        #[cfg(feature = "profile")]
        self.profile.clear();

        self.hal.timer_reset(TimerId::Tick);
        self.hal.timer_reset(TimerId::Cycle);
        self.hal.timer_start(TimerId::Tick);
        self.hal.timer_start(TimerId::Cycle);
        self.hal.capture_arm(CaptureChannel::Clk, Edge::Rising);
        self.hal.capture_arm(CaptureChannel::Hio, Edge::Rising);

        self.state = SessionState::Offline;
        Ok(())
    }

    /// Any state -> `MANUAL` (§6 `stop()`). No-op on hardware if already
    /// `MANUAL`, but still returns a summary for the caller to print.
    pub fn stop(&mut self) -> StopSummary {
        let mut atr = [0u8; ATR_MAX_LEN];
        let atr_len = self.atr.buffer().len();
        atr[..atr_len].copy_from_slice(self.atr.buffer().as_slice());
        let summary = StopSummary {
            state_before: self.state,
            atr,
            atr_len,
            rate: self.rate,
            tick_multiplier: self.tick.multiplier(),
            cycle_multiplier: self.cycle.multiplier(),
        };
        if self.state != SessionState::Manual {
            self.teardown_all();
        }
        summary
    }

    /// IC1 capture ISR: `OFFLINE -> RESET` on the CLK rising edge. Reads
    /// the hardware-latched cycle snapshot rather than the live counter
    /// (§4.4), matching the source's `IC1BUF` read and avoiding the
    /// several-cycle skew of reading the counter at ISR entry.
    pub fn on_clk_edge(&mut self) {
        if self.state != SessionState::Offline {
            return;
        }
        let captured = self.hal.capture_latched(CaptureChannel::Clk);
        self.clk_start_cycles = self.cycle.extend(captured, COUNTER_PERIOD);
        self.hal.capture_disarm(CaptureChannel::Clk);
        self.hal.capture_arm(CaptureChannel::Hrst, Edge::Rising);
        self.state = SessionState::Reset;
        self.notify.push(NotifyCode::ClkStart);
        self.record_profile(0, "clk_start");
    }

    /// IC3 capture ISR: records the tick at which HIO first rose during
    /// RESET. Armed continuously from `OFFLINE` through `RESET` (the
    /// "never cleared mid-transition" contract of §4.1 applies to this
    /// channel); only meaningful once `RESET` is entered.
    pub fn on_hio_edge(&mut self) {
        if self.state == SessionState::Reset && self.reset_timings.reset_ack.is_none() {
            let captured = self.hal.capture_latched(CaptureChannel::Hio);
            let tick = self.tick.extend(captured, COUNTER_PERIOD);
            self.reset_timings.reset_ack = Some(tick);
            self.notify.push(NotifyCode::ResetAck);
            self.record_profile(tick, "reset_ack");
        }
    }

    /// IC2 capture ISR: `RESET -> ATR` on the HRST rising edge. Measures
    /// the rate, programs the UART divisor and enables the Rx interrupt,
    /// all within this handler per §4.2's tight deadline.
    ///
    /// The saved `reset_end` timestamp comes from the latched `IC2BUF`
    /// capture; the rate estimate's own tick/cycle inputs are read live
    /// from both counters "as close together as possible", matching the
    /// source's separate `TMR2`/`TMR3` reads in the same handler.
    pub fn on_hrst_edge(&mut self) {
        if self.state != SessionState::Reset {
            return;
        }
        let captured = self.hal.capture_latched(CaptureChannel::Hrst);
        let reset_end_tick = self.tick.extend(captured, COUNTER_PERIOD);
        self.reset_timings.reset_end = Some(reset_end_tick);
        self.notify.push(NotifyCode::ResetEnd);
        self.record_profile(reset_end_tick, "reset_end");

        let ticks_now = self.tick.effective(&self.hal, TimerId::Tick, COUNTER_PERIOD);
        let cycles_now = self.cycle.effective(&self.hal, TimerId::Cycle, COUNTER_PERIOD);
        let cycles = cycles_now.wrapping_sub(self.clk_start_cycles);

        self.hal.capture_disarm(CaptureChannel::Hrst);
        self.hal.capture_disarm(CaptureChannel::Hio);

        match RateEstimate::compute(cycles, ticks_now) {
            Some(rate) => {
                self.rate = Some(rate);
                self.hal.uart_configure(rate.brg);
                self.hal.uart_enable(true);
                self.atr.reset();
                self.state = SessionState::Atr;
                self.notify.push(NotifyCode::ClkRate);
            }
            None => {
                // tick == 0: the rate estimator's precondition (§8
                // property 5) was violated, which should not happen on
                // real hardware once RESET has been entered.
                self.notify.push(NotifyCode::Confused);
                self.teardown_all();
            }
        }
    }

    /// USART2 Rx ISR. Routes bytes to the ATR parser while `ATR`, to the
    /// receive ring otherwise (§4.6, reserved `IDLE`/`COMMAND` bodies).
    pub fn on_uart_rx(&mut self) {
        let Some((byte, status)) = self.hal.uart_rx_drain() else {
            return;
        };

        match self.state {
            SessionState::Atr => {
                let result = self.atr.read(byte);
                if let Some(code) = result.notify {
                    self.notify.push(code);
                }
                match result.outcome {
                    ReadOutcome::Ok => {}
                    ReadOutcome::Done => {
                        // "Disable Rx callback" (§4.1): detach ATR
                        // routing only. UART_ENABLE is never cleared
                        // here — IDLE/COMMAND still receive traffic.
                        self.state = SessionState::Idle;
                    }
                    ReadOutcome::Abort => {
                        self.teardown_all();
                    }
                }
            }
            SessionState::Idle | SessionState::Command => {
                self.rx.push((byte, status));
            }
            SessionState::Manual | SessionState::Offline | SessionState::Reset => {}
        }
    }

    /// Timer rollover ISR, highest static priority (§5, §9).
    pub fn on_timer_rollover(&mut self, timer: TimerId) {
        match timer {
            TimerId::Tick => self.tick.on_rollover(),
            TimerId::Cycle => self.cycle.on_rollover(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_hal::mock::MockPeripherals;

    fn idle_pins() -> MockPeripherals {
        let mut hal = MockPeripherals::new();
        hal.set_pin(Pin::Vbus, false);
        hal.set_pin(Pin::Hrst, true);
        hal.set_pin(Pin::Hio, true);
        hal
    }

    #[test]
    fn idle_start_enters_offline() {
        let mut session = Session::new(idle_pins());
        let result = session.start();
        assert!(result.is_ok());
        assert_eq!(session.state(), SessionState::Offline);
    }

    #[test]
    fn active_bus_refuses_start() {
        let mut hal = idle_pins();
        hal.set_pin(Pin::Vbus, true);
        let mut session = Session::new(hal);
        let result = session.start();
        assert_eq!(result, Err(StartRefusal::BusActive));
        assert!(StartRefusal::BusActive.message().contains("bus appears to be active"));
        assert_eq!(session.state(), SessionState::Manual);
    }

    #[test]
    fn stop_from_any_state_reaches_manual() {
        let mut session = Session::new(idle_pins());
        session.start().unwrap();
        session.on_clk_edge();
        assert_eq!(session.state(), SessionState::Reset);
        let summary = session.stop();
        assert_eq!(summary.state_before, SessionState::Reset);
        assert_eq!(session.state(), SessionState::Manual);
    }

    #[test]
    fn direct_coding_atr_completes_to_idle() {
        let mut session = Session::new(idle_pins());
        session.start().unwrap();

        session.hal.advance_cycles(10);
        session.hal.fire_capture(CaptureChannel::Clk);
        session.on_clk_edge();
        assert_eq!(session.state(), SessionState::Reset);

        session.hal.advance_ticks(100);
        session.hal.fire_capture(CaptureChannel::Hio);
        session.on_hio_edge();

        session.hal.advance_ticks(400);
        session.hal.advance_cycles(186000);
        session.hal.fire_capture(CaptureChannel::Hrst);
        session.on_hrst_edge();
        assert_eq!(session.state(), SessionState::Atr);
        assert!(session.rate().is_some());
        let timings = session.reset_timings();
        assert!(timings.reset_ack.unwrap() <= crate::config::RESET_ACK_MAX_TICKS);
        assert!(timings.reset_end.unwrap() >= crate::config::RESET_END_MIN_TICKS);

        // T0 = 0x00: no interface bytes, no historical bytes, no TCK.
        for byte in [0x3Bu8, 0x00] {
            session.hal.push_rx_byte(byte);
            session.on_uart_rx();
        }

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.atr_bytes(), &[0x3B, 0x00]);

        let mut codes = heapless::Vec::<NotifyCode, 8>::new();
        while let Some(code) = session.notify_ring().pop() {
            codes.push(code).unwrap();
        }
        assert_eq!(
            codes.as_slice(),
            &[
                NotifyCode::ClkStart,
                NotifyCode::ResetAck,
                NotifyCode::ResetEnd,
                NotifyCode::ClkRate,
                NotifyCode::AtrDone,
            ]
        );
    }

    #[test]
    fn inverse_coding_aborts_to_manual() {
        let mut session = Session::new(idle_pins());
        session.start().unwrap();
        session.on_clk_edge();
        session.hal.advance_ticks(400);
        session.on_hrst_edge();
        assert_eq!(session.state(), SessionState::Atr);

        session.hal.push_rx_byte(0x3F);
        session.on_uart_rx();

        assert_eq!(session.state(), SessionState::Manual);
        assert_eq!(session.atr_bytes(), &[0x3F]);
    }

    #[test]
    fn atr_overflow_aborts_to_manual() {
        let mut session = Session::new(idle_pins());
        session.start().unwrap();
        session.on_clk_edge();
        session.hal.advance_ticks(400);
        session.on_hrst_edge();

        session.hal.push_rx_byte(0x3B);
        session.on_uart_rx();
        for _ in 0..31 {
            session.hal.push_rx_byte(0xF0);
            session.on_uart_rx();
        }
        assert_eq!(session.state(), SessionState::Atr);

        session.hal.push_rx_byte(0xAA);
        session.on_uart_rx();
        assert_eq!(session.state(), SessionState::Manual);
    }
}
