//! The session FSM's state set (§3, §4.1). The transition function lives
//! on [`crate::session::Session`], since it must touch the peripheral
//! handle, the rollover counters and the ATR parser together; this module
//! holds only the tagged variant itself, kept deliberately free of any
//! "is X enabled" boolean matrix (§9).

/// One of six session states. `MANUAL` is initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Manual,
    Offline,
    Reset,
    Atr,
    Idle,
    Command,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Manual
    }
}
