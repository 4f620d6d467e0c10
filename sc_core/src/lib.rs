//! # sc_core
//!
//! The ISO 7816 sniffer itself: the session FSM, the timing/rate
//! estimator, the ATR parser, the notification and receive rings, and
//! the foreground reporter that turns them into log lines.
//!
//! `sc_hal::ScPeripherals` is the only way this crate touches hardware;
//! everything here is generic over it, which is what makes the unit
//! tests (driven by `sc_hal::mock::MockPeripherals`) exercise the exact
//! same code paths the target binary runs.
//!
//! Builds `no_std` for the target; the host test build (`cfg(test)`)
//! pulls in `std` for the test harness only (§11.4).

#![cfg_attr(not(test), no_std)]

pub mod atr;
pub mod config;
pub mod notify;
pub mod report;
pub mod ring;
pub mod session;
pub mod state;
pub mod timing;

#[cfg(feature = "profile")]
pub mod profile;

pub use notify::NotifyCode;
pub use session::{Session, StartRefusal, StopSummary};
pub use state::SessionState;
