#![no_std]

// Shared logic for the slave clock driver.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware access happens through the collaborator traits
// in `board`; the firmware and the emulator supply the implementations.

pub mod battery;
pub mod board;
pub mod config;
pub mod hbridge;
pub mod idle;
pub mod irq;
pub mod registry;
pub mod scheduler;
pub mod shared;
pub mod telemetry;
pub mod time;

pub use registry::{TaskId, TaskRegistry};
pub use scheduler::{Clock, PassReport, TaskOutcome};
pub use shared::ClockShared;
pub use time::ClockTime;
