//! Optional bring-up instrumentation (§12), mirroring the source
//! firmware's `SC_PROF_ENABLE` event log. Off by default; enable with the
//! `profile` feature to record a fixed-capacity timeline of named events
//! against the tick counter, dumped by `Session::stop()`'s caller.

use heapless::Vec;

/// One recorded event: the tick count at which it was logged and a
/// `'static` label (no formatting, no allocation, so it is cheap enough
/// to call from ISR context).
#[derive(Debug, Clone, Copy)]
pub struct ProfileEvent {
    pub tick: u32,
    pub label: &'static str,
}

/// Fixed-capacity ring of the most recent events. Capacity matches the
/// source firmware's `sc_prof[]` bring-up log size.
pub struct ProfileLog {
    events: Vec<ProfileEvent, 32>,
}

impl ProfileLog {
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Records an event, silently dropping it once the log is full rather
    /// than blocking or panicking (this can be called from an ISR).
    pub fn record(&mut self, tick: u32, label: &'static str) {
        let _ = self.events.push(ProfileEvent { tick, label });
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[ProfileEvent] {
        &self.events
    }
}

impl Default for ProfileLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_in_order_up_to_capacity() {
        let mut log = ProfileLog::new();
        log.record(10, "clk_start");
        log.record(20, "reset_ack");
        assert_eq!(log.events().len(), 2);
        assert_eq!(log.events()[0].label, "clk_start");
        assert_eq!(log.events()[1].tick, 20);
    }

    #[test]
    fn drops_events_past_capacity() {
        let mut log = ProfileLog::new();
        for i in 0..40u32 {
            log.record(i, "event");
        }
        assert_eq!(log.events().len(), 32);
    }
}
