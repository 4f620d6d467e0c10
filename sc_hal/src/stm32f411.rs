//! Concrete [`ScPeripherals`] implementation for the STM32F411 target.
//!
//! `stm32f4xx-hal` configures clocks, GPIO alternate functions and the UART
//! baud-rate-independent framing bits; the input-capture timer channels this
//! module needs (continuous 16-bit tick/cycle counters driven in capture
//! mode) are not exposed by the HAL crate, so they are poked directly
//! through the PAC register blocks, the same `unsafe { &*pac::TIMx::ptr() }`
//! pattern used throughout the embedded-hal ecosystem for registers the
//! safe HAL layer doesn't cover.
//!
//! Channel assignment mirrors the source firmware's device allocation:
//! TIM2 is the tick counter (synchronous to CLK), TIM3 is the free-running
//! cycle counter. Each capture channel picks up its time base the same way
//! the source's per-channel `ICTMR` bit does: IC1 (CLK start) captures off
//! TIM3's own CH1, since what it measures is an elapsed cycle count, while
//! IC2 (HRST) and IC3 (HIO) capture off TIM2's CH2/CH3, since what they
//! measure is an elapsed tick count.

use crate::{CaptureChannel, Edge, Pin, RxStatus, ScPeripherals, TimerId};
use stm32f4xx_hal::{
    gpio::{ErasedPin, Input},
    pac,
    prelude::*,
    serial::{Rx, Serial, Tx},
};

/// CCMRx/CCER bit position for capture-compare channel `n` (1-indexed),
/// relative to whichever CCMR register holds that channel (CCMR1 for
/// channels 1/2, CCMR2 for channels 3/4 — each occupies the same low/high
/// byte split within its own register).
fn ccmr_cc_input_bits(ch: u8) -> u32 {
    // CCxS = 01 selects "IC mapped on TIx" for the matching direct input.
    0b01 << ((ch - 1) % 2 * 8)
}

pub struct Stm32ScPeripherals {
    tim2: pac::TIM2,
    tim3: pac::TIM3,
    uart_tx: Tx<pac::USART2>,
    uart_rx: Rx<pac::USART2>,
    vbus_pin: ErasedPin<Input>,
    hrst_pin: ErasedPin<Input>,
    hio_pin: ErasedPin<Input>,
}

impl Stm32ScPeripherals {
    /// Takes ownership of the raw timer and USART peripherals plus the
    /// board's three level-sense pins. Pin direction/AF muxing (including
    /// the capture-channel alternate functions on TIM2) is expected to
    /// already be done by the caller (`main_app::init`), matching the
    /// split between `ISO7816setup`'s pin section and its timer section in
    /// the original firmware. The level-sense pins are separate physical
    /// pins from the capture-channel ones: the board fans CLK/HRST/HIO out
    /// to both a timer input-capture pin and a plain GPIO input so the
    /// session can both time edges and poll levels.
    pub fn new(
        tim2: pac::TIM2,
        tim3: pac::TIM3,
        serial: Serial<pac::USART2>,
        vbus_pin: ErasedPin<Input>,
        hrst_pin: ErasedPin<Input>,
        hio_pin: ErasedPin<Input>,
    ) -> Self {
        let (uart_tx, uart_rx) = serial.split();

        // TIM2 free-runs at maximum period; rollover ISR (bound in
        // main_app) increments the session's multiplier. Capture channels
        // are armed/disarmed per session-state transition, never here.
        tim2.arr().write(|w| unsafe { w.bits(0xFFFF) });
        tim3.arr().write(|w| unsafe { w.bits(0xFFFF) });

        Self { tim2, tim3, uart_tx, uart_rx, vbus_pin, hrst_pin, hio_pin }
    }

    fn timer_block(&self, t: TimerId) -> TimerRegs<'_> {
        match t {
            TimerId::Tick => TimerRegs::Tim2(&self.tim2),
            TimerId::Cycle => TimerRegs::Tim3(&self.tim3),
        }
    }
}

enum TimerRegs<'a> {
    Tim2(&'a pac::TIM2),
    Tim3(&'a pac::TIM3),
}

impl ScPeripherals for Stm32ScPeripherals {
    fn timer_reset(&mut self, t: TimerId) {
        match self.timer_block(t) {
            TimerRegs::Tim2(tim) => tim.cnt().write(|w| unsafe { w.bits(0) }),
            TimerRegs::Tim3(tim) => tim.cnt().write(|w| unsafe { w.bits(0) }),
        }
    }

    fn timer_start(&mut self, t: TimerId) {
        match self.timer_block(t) {
            TimerRegs::Tim2(tim) => tim.cr1().modify(|_, w| w.cen().set_bit()),
            TimerRegs::Tim3(tim) => tim.cr1().modify(|_, w| w.cen().set_bit()),
        }
    }

    fn timer_stop(&mut self, t: TimerId) {
        match self.timer_block(t) {
            TimerRegs::Tim2(tim) => tim.cr1().modify(|_, w| w.cen().clear_bit()),
            TimerRegs::Tim3(tim) => tim.cr1().modify(|_, w| w.cen().clear_bit()),
        }
    }

    fn timer_period_set(&mut self, t: TimerId, period: u16) {
        match self.timer_block(t) {
            TimerRegs::Tim2(tim) => tim.arr().write(|w| unsafe { w.bits(period as u32) }),
            TimerRegs::Tim3(tim) => tim.arr().write(|w| unsafe { w.bits(period as u32) }),
        }
    }

    fn timer_value(&self, t: TimerId) -> u16 {
        match self.timer_block(t) {
            TimerRegs::Tim2(tim) => tim.cnt().read().bits() as u16,
            TimerRegs::Tim3(tim) => tim.cnt().read().bits() as u16,
        }
    }

    fn capture_arm(&mut self, ch: CaptureChannel, edge: Edge) {
        let falling = matches!(edge, Edge::Falling);
        match ch {
            // IC1 (clock start): TIM3 CH1, measuring elapsed cycles.
            CaptureChannel::Clk => {
                self.tim3.ccmr1_input().modify(|r, w| unsafe {
                    w.bits(r.bits() | ccmr_cc_input_bits(1))
                });
                self.tim3.ccer().modify(|_, w| w.cc1e().set_bit().cc1p().bit(falling));
                self.tim3.dier().modify(|_, w| w.cc1ie().set_bit());
            }
            // IC2 (HRST): TIM2 CH2, measuring elapsed ticks.
            CaptureChannel::Hrst => {
                self.tim2.ccmr1_input().modify(|r, w| unsafe {
                    w.bits(r.bits() | ccmr_cc_input_bits(2))
                });
                self.tim2.ccer().modify(|_, w| w.cc2e().set_bit().cc2p().bit(falling));
                self.tim2.dier().modify(|_, w| w.cc2ie().set_bit());
            }
            // IC3 (HIO): TIM2 CH3, measuring elapsed ticks.
            CaptureChannel::Hio => {
                self.tim2.ccmr2_input().modify(|r, w| unsafe {
                    w.bits(r.bits() | ccmr_cc_input_bits(3))
                });
                self.tim2.ccer().modify(|_, w| w.cc3e().set_bit().cc3p().bit(falling));
                self.tim2.dier().modify(|_, w| w.cc3ie().set_bit());
            }
        }
    }

    fn capture_disarm(&mut self, ch: CaptureChannel) {
        match ch {
            CaptureChannel::Clk => {
                self.tim3.ccer().modify(|_, w| w.cc1e().clear_bit());
                self.tim3.dier().modify(|_, w| w.cc1ie().clear_bit());
            }
            CaptureChannel::Hrst => {
                self.tim2.ccer().modify(|_, w| w.cc2e().clear_bit());
                self.tim2.dier().modify(|_, w| w.cc2ie().clear_bit());
            }
            CaptureChannel::Hio => {
                self.tim2.ccer().modify(|_, w| w.cc3e().clear_bit());
                self.tim2.dier().modify(|_, w| w.cc3ie().clear_bit());
            }
        }
    }

    fn capture_latched(&self, ch: CaptureChannel) -> u16 {
        match ch {
            CaptureChannel::Clk => self.tim3.ccr1().read().bits() as u16,
            CaptureChannel::Hrst => self.tim2.ccr2().read().bits() as u16,
            CaptureChannel::Hio => self.tim2.ccr3().read().bits() as u16,
        }
    }

    fn uart_configure(&mut self, brg: u16) {
        // stm32f4xx-hal's Serial was already set up for 8E2 in main_app's
        // init; only the divisor changes per session, so it is written
        // through the raw BRR register rather than re-running the whole
        // HAL configuration sequence.
        let usart = unsafe { &*pac::USART2::ptr() };
        usart.brr().write(|w| unsafe { w.bits(brg as u32) });
    }

    fn uart_enable(&mut self, on: bool) {
        let usart = unsafe { &*pac::USART2::ptr() };
        usart.cr1().modify(|_, w| w.ue().bit(on));
    }

    fn uart_rx_drain(&mut self) -> Option<(u8, RxStatus)> {
        match self.uart_rx.read() {
            Ok(byte) => Some((byte, RxStatus::default())),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(_)) => {
                // The HAL's serial error type doesn't distinguish parity
                // from framing at this API surface; surface both flags so
                // the caller doesn't silently drop the byte's error state.
                Some((0, RxStatus { parity: true, framing: true }))
            }
        }
    }

    fn pin_read(&self, pin: Pin) -> bool {
        match pin {
            Pin::Vbus => self.vbus_pin.is_high(),
            Pin::Hrst => self.hrst_pin.is_high(),
            Pin::Hio => self.hio_pin.is_high(),
        }
    }
}

// Silence an unused-import warning when `uart_tx` is never read directly;
// it is retained so `Stm32ScPeripherals` owns (and can later drive) the Tx
// half for symmetry with `Rx`, even though the sniffer never transmits.
#[allow(dead_code)]
fn _assert_tx_field_used(p: &Stm32ScPeripherals) -> &Tx<pac::USART2> {
    &p.uart_tx
}
