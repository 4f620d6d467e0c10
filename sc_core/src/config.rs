//! Constants shared across the session FSM, the ATR parser and the rings.
//! Names and values are pulled straight from the source firmware's
//! `iso7816.h` / `iso7816/private.h`.

/// Receive byte ring capacity. One slot is always left empty to
/// distinguish full from empty without a separate counter.
pub const SC_RX_BUFFER_SIZE: usize = 128;

/// Notification ring capacity, same full/empty discipline as the Rx ring.
pub const SC_NOTIFY_BUFFER_SIZE: usize = 32;

/// Hard cap on ATR length (§4.3). The 33rd byte is never stored.
pub const ATR_MAX_LEN: usize = 32;

/// Expected upper bound on the tick count at which HIO rises during
/// RESET (§3, `ResetTimings::reset_ack`). Not enforced by the parser;
/// informational, checked by tests against literal scenarios.
pub const RESET_ACK_MAX_TICKS: u32 = 200;

/// Expected lower bound on the tick count at which HRST releases
/// (§3, `ResetTimings::reset_end`).
pub const RESET_END_MIN_TICKS: u32 = 400;

/// The UART divider constant from §4.2: 93 encodes the dividing factor
/// and the 372-cycles-per-ETU convention of ISO 7816-3.
pub const BRG_FACTOR: f64 = 93.0;

/// Rollover period of both 16-bit hardware counters (ARR = 0xFFFF, so the
/// counter wraps every 0x1_0000 ticks).
pub const COUNTER_PERIOD: u32 = 0x1_0000;
