//! Parser for emulator commands.
//!
//! Lines are short and keyword-led, so the grammar works directly on `&str`
//! with `winnow` combinators. Keywords are matched case-insensitively.

use std::fmt;
use std::time::Duration;

use winnow::ascii::{Caseless, Uint, alpha1, dec_uint, space0, space1};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded};
use winnow::error::{ContextError, ErrMode, ParseError, StrContext, StrContextValue};
use winnow::prelude::*;

/// Commands understood by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Emit `count` time-signal pulses, each held for `hold` (session default when `None`).
    Pulse { count: u32, hold: Option<Duration> },
    Pause(bool),
    Press,
    Release,
    Battery { cell: u8, units: u8 },
    Wait(Duration),
    Status,
    Log,
    Help(Option<String>),
}

/// Failure to turn a line into a usable command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The line does not match the grammar; `offset` is the byte where parsing stopped.
    Syntax { offset: usize, detail: String },
    /// The line parsed but an argument is unusable in the current session.
    Argument(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Syntax { offset, detail } if detail.is_empty() => {
                write!(f, "syntax error at column {}", offset + 1)
            }
            CommandError::Syntax { offset, detail } => {
                write!(f, "syntax error at column {}: {detail}", offset + 1)
            }
            CommandError::Argument(reason) => write!(f, "bad argument: {reason}"),
        }
    }
}

impl From<ParseError<&str, ContextError>> for CommandError {
    fn from(error: ParseError<&str, ContextError>) -> Self {
        CommandError::Syntax {
            offset: error.offset(),
            detail: error.inner().to_string(),
        }
    }
}

/// Parses one REPL line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    delimited(space0, command, space0)
        .parse(line)
        .map_err(CommandError::from)
}

fn command(input: &mut &str) -> ModalResult<Command> {
    alt((
        pulse, pause, press, release, battery, wait, status, log, help,
    ))
    .context(StrContext::Label("command"))
    .parse_next(input)
}

fn keyword<'s>(name: &'static str) -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    Caseless(name)
}

fn number<T: Uint>(input: &mut &str) -> ModalResult<T> {
    dec_uint(input)
}

fn pulse(input: &mut &str) -> ModalResult<Command> {
    keyword("pulse").parse_next(input)?;
    let count = opt(preceded(space1, count)).parse_next(input)?;
    let hold = opt(preceded(
        (space1, keyword("hold"), "="),
        cut_err(duration),
    ))
    .parse_next(input)?;

    Ok(Command::Pulse {
        count: count.unwrap_or(1),
        hold,
    })
}

fn count(input: &mut &str) -> ModalResult<u32> {
    number::<u32>
        .verify(|count: &u32| *count > 0)
        .context(StrContext::Expected(StrContextValue::Description(
            "pulse count above zero",
        )))
        .parse_next(input)
}

fn pause(input: &mut &str) -> ModalResult<Command> {
    preceded(
        (keyword("pause"), space1),
        cut_err(alt((keyword("on").value(true), keyword("off").value(false))))
            .context(StrContext::Expected(StrContextValue::Description("on or off"))),
    )
    .map(Command::Pause)
    .parse_next(input)
}

fn press(input: &mut &str) -> ModalResult<Command> {
    keyword("press").value(Command::Press).parse_next(input)
}

fn release(input: &mut &str) -> ModalResult<Command> {
    keyword("release").value(Command::Release).parse_next(input)
}

fn battery(input: &mut &str) -> ModalResult<Command> {
    preceded(
        (keyword("battery"), space1),
        cut_err((cell, preceded(space1, units))),
    )
    .map(|(cell, units)| Command::Battery { cell, units })
    .parse_next(input)
}

fn cell(input: &mut &str) -> ModalResult<u8> {
    number::<u8>
        .verify(|cell: &u8| (1..=3).contains(cell))
        .context(StrContext::Expected(StrContextValue::Description(
            "battery cell 1-3",
        )))
        .parse_next(input)
}

fn units(input: &mut &str) -> ModalResult<u8> {
    number::<u8>
        .context(StrContext::Expected(StrContextValue::Description(
            "8-bit reading 0-255",
        )))
        .parse_next(input)
}

fn wait(input: &mut &str) -> ModalResult<Command> {
    preceded((keyword("wait"), space1), cut_err(duration))
        .map(Command::Wait)
        .parse_next(input)
}

fn status(input: &mut &str) -> ModalResult<Command> {
    keyword("status").value(Command::Status).parse_next(input)
}

fn log(input: &mut &str) -> ModalResult<Command> {
    keyword("log").value(Command::Log).parse_next(input)
}

fn help(input: &mut &str) -> ModalResult<Command> {
    preceded(keyword("help"), opt(preceded(space1, alpha1)))
        .map(|topic: Option<&str>| Command::Help(topic.map(str::to_ascii_lowercase)))
        .parse_next(input)
}

/// Duration literal: an integer followed by `ms` or `s`.
fn duration(input: &mut &str) -> ModalResult<Duration> {
    let value = number::<u64>.parse_next(input)?;
    alt((
        keyword("ms").value(Duration::from_millis(value)),
        keyword("s").value(Duration::from_secs(value)),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "duration ending in ms or s",
    )))
    .parse_next(input)
}
