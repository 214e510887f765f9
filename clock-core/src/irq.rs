//! Interrupt handlers and the task that re-enables the time-signal interrupt.
//!
//! Handlers only touch shared words and interrupt masks. Each one masks its own
//! source before returning; the source stays masked until the triggering line
//! has physically cleared, which keeps a long master-clock pulse or a held
//! button from flooding the scheduler with edges.

use crate::board::{ClockInputs, IrqControl, IrqSource, NoonIndicator};
use crate::config::ClockTimings;
use crate::registry::TaskId;
use crate::scheduler::TaskOutcome;
use crate::shared::ClockShared;
use crate::telemetry::{ClockEvent, EventSink};
use crate::time::ClockTime;

/// Falling edge on the time-signal line: one more minute has passed.
pub fn on_time_signal_edge<N, Q>(shared: &ClockShared, noon: &mut N, irqs: &mut Q) -> ClockTime
where
    N: NoonIndicator + ?Sized,
    Q: IrqControl + ?Sized,
{
    let time = shared.advance_time();
    noon.set_noon(time.is_noon());

    let registry = shared.registry();
    registry.arm(TaskId::IncMinute);
    registry.arm(TaskId::ReenableTimeSignalIrq);

    irqs.disable(IrqSource::TimeSignal);
    time
}

/// Battery-check button pressed.
pub fn on_battery_button<Q>(shared: &ClockShared, irqs: &mut Q)
where
    Q: IrqControl + ?Sized,
{
    shared.registry().arm(TaskId::CheckBatteries);
    irqs.disable(IrqSource::BatteryCheck);
}

/// Catches an edge that landed while `source` was being unmasked.
///
/// Call right after unmasking, with the line level and the pending flag read
/// back from the hardware. Stale flags are cleared before unmasking, so an edge
/// that fell after the caller last saw the line released is gone from the
/// pending register. A line that reads asserted with nothing latched is that
/// edge; it is handled here exactly as the interrupt would have. A latched flag
/// means the interrupt is about to fire on its own. Returns whether the edge
/// was taken here.
pub fn take_unlatched_edge<N, Q>(
    source: IrqSource,
    line_asserted: bool,
    edge_latched: bool,
    shared: &ClockShared,
    noon: &mut N,
    irqs: &mut Q,
) -> bool
where
    N: NoonIndicator + ?Sized,
    Q: IrqControl + ?Sized,
{
    if !line_asserted || edge_latched {
        return false;
    }

    match source {
        IrqSource::TimeSignal => {
            on_time_signal_edge(shared, noon, irqs);
        }
        IrqSource::BatteryCheck => on_battery_button(shared, irqs),
    }
    true
}

/// State for the `ReenableTimeSignalIrq` task.
#[derive(Copy, Clone, Debug, Default)]
pub struct TimeSignalRearm {
    held_polls: u16,
}

impl TimeSignalRearm {
    #[must_use]
    pub const fn new() -> Self {
        Self { held_polls: 0 }
    }

    /// Polls that found the line still asserted since the last re-enable.
    #[must_use]
    pub const fn held_polls(&self) -> u16 {
        self.held_polls
    }

    /// One dispatch: re-enable the interrupt once the line reads clear.
    pub fn run<B, S>(
        &mut self,
        shared: &ClockShared,
        board: &mut B,
        timings: &ClockTimings,
        events: &mut S,
    ) -> TaskOutcome
    where
        B: ClockInputs + IrqControl,
        S: EventSink,
    {
        if board.time_signal_present() {
            self.held_polls = self.held_polls.saturating_add(1);
        } else {
            self.held_polls = 0;
            shared.registry().disarm(TaskId::ReenableTimeSignalIrq);
            board.enable(IrqSource::TimeSignal);
            events.emit(ClockEvent::TimeSignalRearmed);
        }
        TaskOutcome::RunAfter(timings.rearm_poll)
    }
}
