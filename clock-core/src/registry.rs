//! Task eligibility bitmask shared between interrupt handlers and the scheduler.
//!
//! Every operation is a single read or a single read-modify-write of one byte.
//! On targets without native atomic RMW `portable-atomic` routes the update
//! through `critical-section`, so an interrupt can never observe half a write.

use portable_atomic::{AtomicU8, Ordering};

/// Number of tasks known to the scheduler.
pub const TASK_COUNT: usize = 3;

/// Identifier for every task the scheduler can dispatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TaskId {
    IncMinute,
    CheckBatteries,
    ReenableTimeSignalIrq,
}

impl TaskId {
    /// Fixed dispatch order used by every scheduler pass.
    pub const ALL: [TaskId; TASK_COUNT] = [
        TaskId::IncMinute,
        TaskId::CheckBatteries,
        TaskId::ReenableTimeSignalIrq,
    ];

    /// Deterministic index for per-task tables.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            TaskId::IncMinute => 0,
            TaskId::CheckBatteries => 1,
            TaskId::ReenableTimeSignalIrq => 2,
        }
    }

    /// Attempts to construct a [`TaskId`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(TaskId::IncMinute),
            1 => Some(TaskId::CheckBatteries),
            2 => Some(TaskId::ReenableTimeSignalIrq),
            _ => None,
        }
    }

    /// Bit owned by this task inside the registry word.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << self.as_index()
    }

    /// Short label used in logs and the emulator status view.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TaskId::IncMinute => "inc-minute",
            TaskId::CheckBatteries => "check-batteries",
            TaskId::ReenableTimeSignalIrq => "rearm-time-signal",
        }
    }
}

/// Bitmask of armed tasks. Zero is the only state that permits sleep.
#[derive(Debug)]
pub struct TaskRegistry {
    bits: AtomicU8,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    /// Marks `task` eligible for the next scheduler pass.
    pub fn arm(&self, task: TaskId) {
        self.bits.fetch_or(task.bit(), Ordering::AcqRel);
    }

    /// Clears the eligibility bit for `task`.
    pub fn disarm(&self, task: TaskId) {
        self.bits.fetch_and(!task.bit(), Ordering::AcqRel);
    }

    /// Disarms every task. Only used at boot.
    pub fn clear_all(&self) {
        self.bits.store(0, Ordering::Release);
    }

    /// Returns `true` when no task is armed.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    /// Returns `true` when the bit for `task` is set.
    #[must_use]
    pub fn is_armed(&self, task: TaskId) -> bool {
        self.bits.load(Ordering::Acquire) & task.bit() != 0
    }

    /// Raw registry word.
    #[must_use]
    pub fn bits(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }

    /// Iterates the armed tasks in dispatch order.
    pub fn armed(&self) -> impl Iterator<Item = TaskId> {
        let bits = self.bits();
        TaskId::ALL
            .into_iter()
            .filter(move |task| bits & task.bit() != 0)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
