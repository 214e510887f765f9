//! Mirrors clock telemetry to the debug log.
//!
//! The scheduler keeps events in its ring; after every pass the main loop hands
//! the ring to [`LogCursor::flush`], which logs the records it has not seen yet
//! over `defmt` on target and stdout on the host.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use clock_core::config::ClockConfig;
use clock_core::telemetry::{ClockEvent, EventId, TelemetryRecorder};

use crate::instant::FirmwareInstant;

/// Remembers the last record already written to the log.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogCursor {
    last_logged: Option<EventId>,
}

impl LogCursor {
    pub const fn new() -> Self {
        Self { last_logged: None }
    }

    /// Logs every record newer than the cursor and returns how many were written.
    pub fn flush<const N: usize>(
        &mut self,
        recorder: &TelemetryRecorder<FirmwareInstant, N>,
    ) -> usize {
        let mut written = 0;
        for record in recorder.records_after(self.last_logged) {
            emit_event(record.id, record.timestamp.as_micros(), &record.event);
            self.last_logged = Some(record.id);
            written += 1;
        }
        written
    }
}

/// Logs the configuration captured at boot.
pub fn log_boot(config: &ClockConfig, sweep: bool) {
    let pulse_ms = u64::try_from(config.pulse_duration().as_millis()).unwrap_or(u64::MAX);
    emit_boot(config.jumpers.value(), pulse_ms, sweep);
}

#[cfg(target_os = "none")]
fn emit_event(id: EventId, timestamp_us: u64, event: &ClockEvent) {
    defmt::info!(
        "telemetry:clock #{} t={}us {}",
        id,
        timestamp_us,
        defmt::Display2Format(event)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_event(id: EventId, timestamp_us: u64, event: &ClockEvent) {
    println!("telemetry:clock #{id} t={timestamp_us}us {event}");
}

#[cfg(target_os = "none")]
fn emit_boot(jumpers: u8, pulse_ms: u64, sweep: bool) {
    defmt::info!(
        "boot: jumpers={} pulse={}ms sweep={}",
        jumpers,
        pulse_ms,
        sweep
    );
}

#[cfg(not(target_os = "none"))]
fn emit_boot(jumpers: u8, pulse_ms: u64, sweep: bool) {
    println!("boot: jumpers={jumpers} pulse={pulse_ms}ms sweep={sweep}");
}
