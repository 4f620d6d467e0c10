#![no_std]
#![no_main]

use panic_halt as _;
use rtic::app;
use stm32f4xx_hal::{
    pac,
    prelude::*,
    serial::{Config as SerialConfig, Serial},
};

use sc_core::Session;
use sc_hal::stm32f411::Stm32ScPeripherals;

// ---------------------------------------------------------------------------
// Logger writer — a dedicated debug UART, separate from the sniffed card's
// USART2 line (§6: CLK/HRST/HIO/VBUS plus the card's own Rx belong to the
// sniffer; the reporter's own text output cannot share that wire).
// ---------------------------------------------------------------------------
mod log_uart {
    use core::fmt;
    use stm32f4xx_hal::{pac, prelude::*, serial::Tx};

    pub struct UartLogWriter(pub Option<Tx<pac::USART1>>);

    impl fmt::Write for UartLogWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if let Some(tx) = self.0.as_mut() {
                for byte in s.as_bytes() {
                    let _ = nb::block!(tx.write(*byte));
                }
            }
            Ok(())
        }
    }

    // Safety: only ever accessed from a single core under RTIC's
    // priority-ceiling locking, same rationale as the teacher's own
    // `static mut` logger writer.
    unsafe impl Send for UartLogWriter {}

    pub static mut LOGGER_WRITER: UartLogWriter = UartLogWriter(None);
}

#[app(device = stm32f4xx_hal::pac, peripherals = true)]
mod app {
    use super::*;
    use log_uart::{UartLogWriter, LOGGER_WRITER};
    use sc_logger::{init_logger, log_info, LogLevel, LoggerConfig};

    // ---- Shared resources (touched by multiple tasks / ISRs) --------------
    #[shared]
    struct Shared {
        session: Session<Stm32ScPeripherals>,
    }

    // ---- Local resources (single owner) -----------------------------------
    #[local]
    struct Local {
        core_clock_hz: u32,
    }

    // -----------------------------------------------------------------------
    // init — hardware setup only (§11.3: board pin/clock assignment lives
    // here, next to the peripheral objects it produces).
    // -----------------------------------------------------------------------
    #[init]
    fn init(ctx: init::Context) -> (Shared, Local) {
        let dp = ctx.device;

        // Clocks: 100 MHz sysclk, matching the teacher's board bring-up.
        let rcc = dp.RCC.constrain();
        let clocks = rcc
            .cfgr
            .sysclk(100.MHz())
            .pclk1(50.MHz())
            .pclk2(100.MHz())
            .freeze();

        // TIM2/TIM3 are poked directly through their PAC register blocks
        // (§4.4), so their APB clocks must be enabled by hand; the HAL's
        // `Timer::new` wrapper is what normally does this, but `sc_hal`
        // bypasses it to reach the capture/compare registers.
        dp.RCC
            .apb1enr()
            .modify(|_, w| w.tim2en().set_bit().tim3en().set_bit());

        let gpioa = dp.GPIOA.split();
        let gpiob = dp.GPIOB.split();
        let gpioc = dp.GPIOC.split();

        // Debug/log UART: USART1 on PA9 (TX) / PA10 (RX, unused).
        let log_serial = Serial::new(
            dp.USART1,
            (gpioa.pa9.into_alternate(), gpioa.pa10.into_alternate()),
            SerialConfig::default().baudrate(115_200.bps()),
            &clocks,
        )
        .unwrap();
        let (log_tx, _log_rx) = log_serial.split();

        unsafe {
            LOGGER_WRITER = UartLogWriter(Some(log_tx));
            init_logger(
                LoggerConfig { color_entire_line: true, min_level: LogLevel::Debug },
                &mut *core::ptr::addr_of_mut!(LOGGER_WRITER),
            );
        }

        // Card I/O line: PA3 (USART2 Rx, 8 data bits / even parity / 2 stop
        // bits per §6; PA2 TX is wired but never driven). The initial BRR
        // divisor is a placeholder — `on_hrst_edge` reprograms it once the
        // rate estimate is available (§4.2).
        let card_serial = Serial::new(
            dp.USART2,
            (gpioa.pa2.into_alternate(), gpioa.pa3.into_alternate()),
            SerialConfig::default()
                .baudrate(9_600.bps())
                .parity_even()
                .stopbits(stm32f4xx_hal::serial::config::StopBits::STOP2),
            &clocks,
        )
        .unwrap();

        // Capture channels: CLK on PA6/TIM3_CH1 (AF2, cycle counter — §4.4
        // measures elapsed cycles from clock start), HRST on PB3/TIM2_CH2
        // and HIO on PB10/TIM2_CH3 (both AF1, tick counter). These are
        // separate physical pins from the level-sense and USART2-Rx pins
        // below — the board fans each bus line out to more than one MCU
        // pin so the session can both time edges and poll levels or
        // receive bytes on the same net.
        let _clk_capture = gpioa.pa6.into_alternate::<2>();
        let _hrst_capture = gpiob.pb3.into_alternate::<1>();
        let _hio_capture = gpiob.pb10.into_alternate::<1>();

        // Level-sense pins read directly by `Session::start`'s idle-bus
        // guard (§4.1).
        let vbus_pin = gpioc.pc0.into_floating_input().erase();
        let hrst_pin = gpioc.pc1.into_floating_input().erase();
        let hio_pin = gpioc.pc2.into_floating_input().erase();

        let hal = Stm32ScPeripherals::new(dp.TIM2, dp.TIM3, card_serial, vbus_pin, hrst_pin, hio_pin);
        let mut session = Session::new(hal);

        session.setup();
        match session.start() {
            Ok(()) => log_info!("sniffer armed, waiting for bus clock"),
            Err(refusal) => sc_core::report::report_refusal(refusal),
        }

        (
            Shared { session },
            Local { core_clock_hz: clocks.sysclk().raw() },
        )
    }

    // -----------------------------------------------------------------------
    // TIM2 ISR — tick rollover and all three edge captures (§5 tier 1 for
    // the rollover, folded into the same vector as tier 3's edge captures
    // because STM32F411 has one NVIC line per timer; the SR flags tell
    // `sc_core` which condition(s) fired).
    // -----------------------------------------------------------------------
    #[task(binds = TIM2, shared = [session], priority = 4)]
    fn tim2_isr(mut ctx: tim2_isr::Context) {
        let tim2 = unsafe { &*pac::TIM2::ptr() };
        let sr = tim2.sr().read();

        if sr.uif().bit_is_set() {
            tim2.sr().modify(|_, w| w.uif().clear_bit());
            ctx.shared.session.lock(|s| s.on_timer_rollover(sc_hal::TimerId::Tick));
        }
        if sr.cc1if().bit_is_set() {
            tim2.sr().modify(|_, w| w.cc1if().clear_bit());
            ctx.shared.session.lock(|s| s.on_clk_edge());
        }
        if sr.cc2if().bit_is_set() {
            tim2.sr().modify(|_, w| w.cc2if().clear_bit());
            ctx.shared.session.lock(|s| s.on_hrst_edge());
        }
        if sr.cc3if().bit_is_set() {
            tim2.sr().modify(|_, w| w.cc3if().clear_bit());
            ctx.shared.session.lock(|s| s.on_hio_edge());
        }
    }

    // -----------------------------------------------------------------------
    // TIM3 ISR — cycle-counter rollover only (§5 tier 1).
    // -----------------------------------------------------------------------
    #[task(binds = TIM3, shared = [session], priority = 4)]
    fn tim3_isr(mut ctx: tim3_isr::Context) {
        let tim3 = unsafe { &*pac::TIM3::ptr() };
        tim3.sr().modify(|_, w| w.uif().clear_bit());
        ctx.shared.session.lock(|s| s.on_timer_rollover(sc_hal::TimerId::Cycle));
    }

    // -----------------------------------------------------------------------
    // USART2 ISR — card Rx (§5 tier 2).
    // -----------------------------------------------------------------------
    #[task(binds = USART2, shared = [session], priority = 3)]
    fn usart2_isr(mut ctx: usart2_isr::Context) {
        ctx.shared.session.lock(|s| s.on_uart_rx());
    }

    // -----------------------------------------------------------------------
    // Idle — the foreground reporter (§5 "single foreground task
    // (cooperative polling)"): drains both rings on every wake, then sleeps
    // until the next interrupt.
    // -----------------------------------------------------------------------
    #[idle(shared = [session], local = [core_clock_hz])]
    fn idle(mut ctx: idle::Context) -> ! {
        loop {
            let clock_hz = *ctx.local.core_clock_hz;
            ctx.shared.session.lock(|s| sc_core::report::periodic(s, clock_hz));
            cortex_m::asm::wfi();
        }
    }
}
