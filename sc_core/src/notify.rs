//! Notification codes published by interrupt context and consumed by the
//! foreground reporter (§4.5).

/// Small enum codes carried by a [`crate::ring::SpscRing`]. Variants match
/// the source firmware's `SCM_*` constants one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyCode {
    /// Bus clock started; cold reset begins. Carries the CLK-start cycle
    /// count separately (the FSM stashes it, report.rs reads it back).
    ClkStart,
    /// Rate measured and BRG programmed.
    ClkRate,
    /// HIO rose during RESET.
    ResetAck,
    /// HRST released, ending cold reset.
    ResetEnd,
    /// TS byte indicated inverse coding; unsupported.
    InverseCoding,
    /// ATR exceeded 32 bytes.
    AtrOverflow,
    /// TS byte was neither direct nor inverse coding.
    AtrInvalid,
    /// ATR parser reached the end of the historical bytes / TCK.
    AtrDone,
    /// Parser reached a mode it should never be able to reach.
    Confused,
}
