//! Job module for running prefetch jobs in the background
//!
//! # Components
//!
//! - `JobStatus`: The job state machine (idle, running, paused, terminal states)
//! - `ControlSignals`: Pending pause and cancel requests read at checkpoints
//! - `JobEngine`: The trigger interface and the single background worker

mod control;
mod engine;
mod status;

pub use control::ControlSignals;
pub use engine::{JobEngine, JobEvent, JobState, RunRejected, SignalOutcome};
pub use status::JobStatus;
