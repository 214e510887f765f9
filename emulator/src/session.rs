//! Simulated slave-clock board driven on virtual time.
//!
//! The session owns the shared context, the scheduler and a [`SimBoard`]. Time
//! only moves when a command asks for it: pulses and waits fast-forward from one
//! scheduler deadline to the next, so a minute of movement costs a handful of
//! passes instead of a real minute.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use clock_core::battery::BatteryCell;
use clock_core::board::{
    BatteryPanel, BatterySampler, BridgeOutputs, ClockInputs, IrqControl, IrqSource,
    NoonIndicator,
};
use clock_core::config::{BootOptions, ClockConfig, JumperIndex};
use clock_core::hbridge::{BridgePhase, Polarity};
use clock_core::irq::{on_battery_button, on_time_signal_edge};
use clock_core::telemetry::{EventId, TelemetryRecord};
use clock_core::{Clock, ClockShared, TaskId};

use crate::grammar::{self, Command, CommandError};

/// Spacing between consecutive master-clock pulses.
pub const PULSE_SPACING: Duration = Duration::from_secs(60);

/// Hold time used when `pulse` does not name one.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(250);

/// Longest single `wait`, which also bounds how far a typo can run the clock.
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Most pulses a single command may emit.
const MAX_PULSES: u32 = 2 * 720;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "pulse",
        "pulse [count] [hold=<duration>] - emit master-clock pulses one minute apart",
    ),
    ("pause", "pause on|off                    - set the pause switch"),
    (
        "press",
        "press                           - press the battery-check button",
    ),
    (
        "release",
        "release                         - release the battery-check button",
    ),
    (
        "battery",
        "battery <1-3> <units>           - set a cell's 8-bit ADC reading",
    ),
    (
        "wait",
        "wait <duration>                 - let virtual time pass",
    ),
    (
        "status",
        "status                          - show counters, outputs and armed tasks",
    ),
    (
        "log",
        "log                             - replay the retained telemetry",
    ),
    (
        "help",
        "help [topic]                    - show help for a command",
    ),
];

/// Virtual time since the session started, in microseconds.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    pub const START: Self = Self(0);
}

impl Add<Duration> for SimInstant {
    type Output = SimInstant;

    fn add(self, rhs: Duration) -> SimInstant {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl fmt::Display for SimInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0 / 1_000;
        write!(f, "+{}.{:03}s", millis / 1_000, millis % 1_000)
    }
}

/// Session start-up options taken from the command line.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionOptions {
    pub jumpers: JumperIndex,
    pub sweep: bool,
}

/// Board state seen by the scheduler.
#[derive(Debug, Default)]
pub struct SimBoard {
    pub time_signal: bool,
    pub button: bool,
    pub paused: bool,
    pub bridge: [bool; 2],
    pub voltage_fet: bool,
    pub battery_ok: [bool; 3],
    pub battery_units: [u8; 3],
    pub time_signal_irq: bool,
    pub battery_irq: bool,
}

impl ClockInputs for SimBoard {
    fn time_signal_present(&self) -> bool {
        self.time_signal
    }

    fn check_button_pressed(&self) -> bool {
        self.button
    }

    fn clock_paused(&self) -> bool {
        self.paused
    }
}

impl BridgeOutputs for SimBoard {
    fn set_bridge(&mut self, polarity: Polarity, energized: bool) {
        let index = match polarity {
            Polarity::Forward => 0,
            Polarity::Reverse => 1,
        };
        self.bridge[index] = energized;
    }
}

impl BatteryPanel for SimBoard {
    fn set_voltage_fet(&mut self, on: bool) {
        self.voltage_fet = on;
    }

    fn set_battery_ok(&mut self, cell: BatteryCell, ok: bool) {
        self.battery_ok[cell.as_index()] = ok;
    }
}

impl BatterySampler for SimBoard {
    fn sample_8bit(&mut self, cell: BatteryCell) -> u8 {
        // With the FET off the divider floats to ground.
        if self.voltage_fet {
            self.battery_units[cell.as_index()]
        } else {
            0
        }
    }
}

impl IrqControl for SimBoard {
    fn enable(&mut self, source: IrqSource) {
        match source {
            IrqSource::TimeSignal => self.time_signal_irq = true,
            IrqSource::BatteryCheck => self.battery_irq = true,
        }
    }

    fn disable(&mut self, source: IrqSource) {
        match source {
            IrqSource::TimeSignal => self.time_signal_irq = false,
            IrqSource::BatteryCheck => self.battery_irq = false,
        }
    }
}

/// Noon output, kept apart from the board so the time-signal handler can
/// borrow both.
#[derive(Debug, Default)]
pub struct NoonLamp {
    pub lit: bool,
}

impl NoonIndicator for NoonLamp {
    fn set_noon(&mut self, asserted: bool) {
        self.lit = asserted;
    }
}

pub struct Session {
    shared: ClockShared,
    board: SimBoard,
    noon: NoonLamp,
    clock: Clock<SimInstant>,
    now: SimInstant,
    last_shown: Option<EventId>,
    /// Telemetry lines collected pass by pass while a command runs.
    pending: Vec<String>,
    next_pulse_at: SimInstant,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let shared = ClockShared::new();
        let mut board = SimBoard {
            battery_units: [255; 3],
            ..SimBoard::default()
        };
        let mut noon = NoonLamp::default();
        let boot = if options.sweep {
            BootOptions::SWEEP
        } else {
            BootOptions::COLD
        };
        let clock = Clock::initialize(
            &shared,
            &mut board,
            &mut noon,
            ClockConfig::with_jumpers(options.jumpers),
            boot,
        );

        Self {
            shared,
            board,
            noon,
            clock,
            now: SimInstant::START,
            last_shown: None,
            pending: Vec::new(),
            next_pulse_at: SimInstant::START,
        }
    }

    #[cfg(test)]
    pub fn now(&self) -> SimInstant {
        self.now
    }

    #[cfg(test)]
    pub fn shared(&self) -> &ClockShared {
        &self.shared
    }

    #[cfg(test)]
    pub fn board(&self) -> &SimBoard {
        &self.board
    }

    #[cfg(test)]
    pub fn noon(&self) -> &NoonLamp {
        &self.noon
    }

    /// Lines describing the session configuration, printed at start-up.
    pub fn banner(&self) -> Vec<String> {
        let config = self.clock.config();
        vec![
            format!(
                "jumpers={} pulse={}ms",
                config.jumpers.value(),
                config.pulse_duration().as_millis()
            ),
            self.time_line(),
        ]
    }

    /// Parses and runs one line, returning the response and any new telemetry.
    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut lines = match grammar::parse(trimmed).and_then(|command| self.execute(command)) {
            Ok(lines) => lines,
            Err(err) => vec![format!("ERR {err}")],
        };

        self.drain_telemetry();
        lines.append(&mut self.pending);
        lines
    }

    fn execute(&mut self, command: Command) -> Result<Vec<String>, CommandError> {
        match command {
            Command::Pulse { count, hold } => self.pulse(count, hold.unwrap_or(DEFAULT_HOLD)),
            Command::Pause(on) => {
                self.board.paused = on;
                Ok(vec![format!("OK pause {}", if on { "on" } else { "off" })])
            }
            Command::Press => Ok(vec![self.press()]),
            Command::Release => {
                self.board.button = false;
                Ok(vec!["OK release".to_string()])
            }
            Command::Battery { cell, units } => {
                let cell = usize::from(cell)
                    .checked_sub(1)
                    .and_then(BatteryCell::from_index)
                    .ok_or(CommandError::Argument("battery cell must be 1-3"))?;
                self.board.battery_units[cell.as_index()] = units;
                Ok(vec![format!("OK {} = {units}", cell.label())])
            }
            Command::Wait(span) => {
                if span > MAX_WAIT {
                    return Err(CommandError::Argument("wait is limited to 24h"));
                }
                self.advance(span);
                Ok(vec![format!("OK t={}", self.now)])
            }
            Command::Status => Ok(self.status()),
            Command::Log => Ok(self.log()),
            Command::Help(topic) => Ok(help(topic.as_deref())),
        }
    }

    fn pulse(&mut self, count: u32, hold: Duration) -> Result<Vec<String>, CommandError> {
        if count > MAX_PULSES {
            return Err(CommandError::Argument("at most 1440 pulses per command"));
        }
        if hold >= PULSE_SPACING {
            return Err(CommandError::Argument("hold must be shorter than one minute"));
        }

        let mut dropped = 0u32;
        for _ in 0..count {
            let start = self.next_pulse_at.max(self.now);
            self.advance_to(start);

            self.board.time_signal = true;
            if self.board.time_signal_irq {
                on_time_signal_edge(&self.shared, &mut self.noon, &mut self.board);
            } else {
                dropped += 1;
            }
            self.advance(hold);
            self.board.time_signal = false;

            self.next_pulse_at = start + PULSE_SPACING;
        }

        let mut lines = vec![format!("OK pulse x{count} {}", self.time_line())];
        if dropped > 0 {
            lines.push(format!("note: {dropped} pulse(s) arrived while the interrupt was masked"));
        }
        Ok(lines)
    }

    fn press(&mut self) -> String {
        self.board.button = true;
        if !self.board.battery_irq {
            return "OK press (check already running)".to_string();
        }
        on_battery_button(&self.shared, &mut self.board);
        self.advance(Duration::ZERO);
        "OK press".to_string()
    }

    /// Runs every pass due within `span`, then parks the clock at its end.
    fn advance(&mut self, span: Duration) {
        let deadline = self.now + span;
        self.advance_to(deadline);
    }

    fn advance_to(&mut self, deadline: SimInstant) {
        loop {
            let report = self
                .clock
                .run_one_pass(&self.shared, &mut self.board, self.now);
            // The ring only keeps the newest records, so collect after every pass.
            self.drain_telemetry();
            match report.next_due {
                Some(due) if due <= deadline => self.now = due,
                _ => break,
            }
        }
        self.now = self.now.max(deadline);
    }

    fn time_line(&self) -> String {
        format!(
            "time={} displayed={} behind={}",
            self.shared.time(),
            self.shared.displayed_time(),
            self.shared.minutes_behind()
        )
    }

    fn status(&self) -> Vec<String> {
        let armed: Vec<&str> = self
            .shared
            .registry()
            .armed()
            .map(TaskId::label)
            .collect();
        let phase = match self.clock.bridge_phase() {
            BridgePhase::Released => "released",
            BridgePhase::Energized => "energized",
        };
        let cells: Vec<String> = BatteryCell::ALL
            .iter()
            .map(|cell| {
                format!(
                    "{}={}{}",
                    cell.label(),
                    self.board.battery_units[cell.as_index()],
                    if self.board.battery_ok[cell.as_index()] { "(ok)" } else { "" }
                )
            })
            .collect();
        let minimum: Vec<String> = self
            .clock
            .battery()
            .thresholds()
            .minimum
            .iter()
            .map(u8::to_string)
            .collect();

        vec![
            format!("t={} {}", self.now, self.time_line()),
            format!(
                "bridge={phase} out1={} out2={} noon={} paused={}",
                on_off(self.board.bridge[0]),
                on_off(self.board.bridge[1]),
                on_off(self.noon.lit),
                on_off(self.board.paused)
            ),
            format!(
                "battery fet={} {} min={}",
                on_off(self.board.voltage_fet),
                cells.join(" "),
                minimum.join("/")
            ),
            format!(
                "irq time-signal={} battery={}",
                on_off(self.board.time_signal_irq),
                on_off(self.board.battery_irq)
            ),
            format!(
                "armed=[{}] bits={:#05b}",
                armed.join(", "),
                self.shared.registry().bits()
            ),
        ]
    }

    fn log(&self) -> Vec<String> {
        let lines: Vec<String> = self
            .clock
            .telemetry()
            .oldest_first()
            .map(format_record)
            .collect();
        if lines.is_empty() {
            vec!["(no telemetry)".to_string()]
        } else {
            lines
        }
    }

    fn drain_telemetry(&mut self) {
        for record in self.clock.telemetry().records_after(self.last_shown) {
            self.pending.push(format_record(record));
            self.last_shown = Some(record.id);
        }
    }
}

fn format_record(record: &TelemetryRecord<SimInstant>) -> String {
    format!("  [{}] {}", record.timestamp, record.event)
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn help(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match HELP_TOPICS.iter().find(|(name, _)| *name == target) {
            Some((_, detail)) => vec![(*detail).to_string()],
            None => vec![
                format!("No help available for `{target}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(HELP_TOPICS.iter().map(|(_, detail)| format!("  {detail}")));
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
