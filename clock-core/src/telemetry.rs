//! Event catalog and ring buffer for clock activity.
//!
//! Tasks report what they did through [`EventSink`]; the scheduler stamps each
//! event with the pass timestamp and stores it in a fixed-capacity
//! [`TelemetryRecorder`]. Firmware mirrors new records to `defmt`, the emulator
//! prints them. Nothing here allocates.

use core::fmt;

use heapless::HistoryBuf;

use crate::battery::{BatteryCell, BatteryReport};
use crate::hbridge::Polarity;
use crate::time::ClockTime;

/// Default number of records retained.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Identifier assigned to each record, increasing by one per event.
pub type EventId = u32;

/// Things the tasks report while running.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockEvent {
    /// The bridge was energized and the displayed time advanced to `displayed`.
    PulseStarted {
        polarity: Polarity,
        displayed: ClockTime,
    },
    /// A pulse cycle ran while paused; the outputs stayed silent.
    PulseSkippedPaused,
    /// The pulse cycle finished and the bridge is released.
    PulseReleased,
    /// The bridge is off but the time signal is still present.
    AwaitingSignalClear,
    /// The display lags by `behind` minutes; another cycle is queued.
    CatchUpScheduled { behind: u16 },
    /// The display caught up with the authoritative time.
    CycleComplete { displayed: ClockTime },
    /// One pass over the battery cells.
    BatterySampled(BatteryReport),
    /// The check button was released and the indicators went dark.
    BatteryCheckFinished,
    /// The time-signal line cleared and its interrupt is enabled again.
    TimeSignalRearmed,
}

impl fmt::Display for ClockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockEvent::PulseStarted {
                polarity,
                displayed,
            } => write!(f, "pulse {} -> {displayed}", polarity.label()),
            ClockEvent::PulseSkippedPaused => f.write_str("pulse skipped (paused)"),
            ClockEvent::PulseReleased => f.write_str("bridge released"),
            ClockEvent::AwaitingSignalClear => f.write_str("waiting for time signal to clear"),
            ClockEvent::CatchUpScheduled { behind } => {
                write!(f, "catch-up queued ({behind} min behind)")
            }
            ClockEvent::CycleComplete { displayed } => write!(f, "display settled at {displayed}"),
            ClockEvent::BatterySampled(report) => {
                f.write_str("battery")?;
                for cell in BatteryCell::ALL {
                    let verdict = if report.is_ok(cell) { "ok" } else { "low" };
                    write!(f, " {}={}({verdict})", cell.label(), report.sample(cell))?;
                }
                Ok(())
            }
            ClockEvent::BatteryCheckFinished => f.write_str("battery check finished"),
            ClockEvent::TimeSignalRearmed => f.write_str("time-signal irq re-enabled"),
        }
    }
}

/// Receiver for events emitted by task bodies.
pub trait EventSink {
    fn emit(&mut self, event: ClockEvent);
}

/// Sink that discards every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _: ClockEvent) {}
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: ClockEvent,
}

/// Records clock events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records an event and returns its identifier.
    pub fn record(&mut self, event: ClockEvent, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records newer than `cursor` (all retained records when `cursor` is `None`).
    pub fn records_after(
        &self,
        cursor: Option<EventId>,
    ) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.oldest_first()
            .filter(move |record| cursor.is_none_or(|seen| record.id > seen))
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Binds the recorder to a timestamp so task bodies can emit into it.
    pub fn stamped(&mut self, timestamp: TInstant) -> StampedSink<'_, TInstant, CAPACITY> {
        StampedSink {
            recorder: self,
            timestamp,
        }
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// [`EventSink`] that records into a [`TelemetryRecorder`] at a fixed timestamp.
pub struct StampedSink<'a, TInstant, const CAPACITY: usize>
where
    TInstant: Copy,
{
    recorder: &'a mut TelemetryRecorder<TInstant, CAPACITY>,
    timestamp: TInstant,
}

impl<TInstant, const CAPACITY: usize> EventSink for StampedSink<'_, TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn emit(&mut self, event: ClockEvent) {
        self.recorder.record(event, self.timestamp);
    }
}
