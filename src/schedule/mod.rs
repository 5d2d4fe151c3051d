//! Recurring weekly run schedule
//!
//! Entries pair a local wall-clock time with a set of weekdays. The runner
//! checks the schedule and asks the job engine for a run when a trigger comes
//! due; triggers that arrive while a job is active are dropped.

mod entry;
mod runner;

pub use entry::{Schedule, ScheduleEntry};
pub use runner::{ScheduleRunner, TickOutcome};
