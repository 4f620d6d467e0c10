//! The foreground reporter (§4.6): drains both rings on each `periodic()`
//! call and turns codes/bytes into `sc_logger` lines. Kept separate from
//! `Session` so the FSM stays printing-free and testable on its own.

use crate::notify::NotifyCode;
use crate::session::{Session, StartRefusal, StopSummary};
use core::fmt::Write as _;
use sc_hal::{RxStatus, ScPeripherals};

/// Drains the notification ring and the receive ring, logging one line
/// per event (§4.6, §6 `periodic()`). `core_clock_hz` is needed to turn
/// the raw cycle/tick ratio in a `CLK_RATE` notice into kHz; `sc_core`
/// has no notion of the concrete board clock, so `main_app` supplies it.
pub fn periodic<P: ScPeripherals>(session: &Session<P>, core_clock_hz: u32) {
    while let Some(code) = session.notify_ring().pop() {
        report_code(session, code, core_clock_hz);
    }
    if session.notify_ring().take_overflow() {
        sc_logger::log_error!("notification ring overflow; one or more events were dropped");
    }

    while let Some((byte, status)) = session.rx_ring().pop() {
        report_byte(byte, status);
    }
    if session.rx_ring().take_overflow() {
        sc_logger::log_error!("receive ring overflow; one or more bytes were dropped");
    }
}

fn report_code<P: ScPeripherals>(session: &Session<P>, code: NotifyCode, core_clock_hz: u32) {
    match code {
        NotifyCode::ClkStart => {
            sc_logger::log_info!(
                "bus clock started, begin cold reset (cycle={})",
                session.clk_start_cycles()
            );
        }
        NotifyCode::ClkRate => {
            if let Some(rate) = session.rate() {
                sc_logger::log_info!(
                    "measured rate: {} kHz, BRG={}, ticks={}, cycles={}",
                    rate.khz(core_clock_hz),
                    rate.brg,
                    rate.ticks,
                    rate.cycles
                );
            }
        }
        NotifyCode::ResetAck => {
            if let Some(tick) = session.reset_timings().reset_ack {
                sc_logger::log_info!("HIO rose during reset at tick {}", tick);
            }
        }
        NotifyCode::ResetEnd => {
            if let Some(tick) = session.reset_timings().reset_end {
                sc_logger::log_info!("HRST released at tick {}", tick);
            }
        }
        NotifyCode::InverseCoding => {
            sc_logger::log_error!("inverse coding not supported; aborted");
        }
        NotifyCode::AtrOverflow => {
            sc_logger::log_error!(">32 ATR bytes; aborted");
        }
        NotifyCode::AtrInvalid => {
            log_hex_dump("invalid ATR; aborted; bytes so far", session.atr_bytes());
        }
        NotifyCode::AtrDone => {
            sc_logger::log_info!("ATR complete, {} bytes", session.atr_bytes().len());
        }
        NotifyCode::Confused => {
            sc_logger::log_error!("parser reached an undefined mode; aborted");
        }
    }
}

fn report_byte(byte: u8, status: RxStatus) {
    match (status.parity, status.framing) {
        (false, false) => sc_logger::log_info!("read {:02X}", byte),
        (true, false) => sc_logger::log_info!("read {:02X} (p)", byte),
        (false, true) => sc_logger::log_info!("read {:02X} (f)", byte),
        (true, true) => sc_logger::log_info!("read {:02X} (p,f)", byte),
    }
}

fn log_hex_dump(prefix: &str, bytes: &[u8]) {
    let mut hex = heapless::String::<96>::new();
    for byte in bytes {
        let _ = write!(hex, "{:02X} ", byte);
    }
    sc_logger::log_error!("{}: {}", prefix, hex.as_str());
}

/// `start()`'s refusal path (§4.1, §8 scenario 2). Logged directly rather
/// than through the notification ring since the refusal is synchronous
/// with the `start()` call itself, not an asynchronous ISR event.
pub fn report_refusal(refusal: StartRefusal) {
    sc_logger::log_error!("{}", refusal.message());
}

/// `stop()`'s session summary (§6, §12: carries the rollover multipliers
/// alongside the ATR hex dump).
pub fn report_stop(summary: &StopSummary) {
    let mut hex = heapless::String::<96>::new();
    for byte in summary.atr_bytes() {
        let _ = write!(hex, "{:02X} ", byte);
    }
    sc_logger::log_info!(
        "session stopped from {:?}; atr_len={} atr=[{}] t2={} t3={}",
        summary.state_before,
        summary.atr_len,
        hex.as_str(),
        summary.tick_multiplier,
        summary.cycle_multiplier
    );
}
