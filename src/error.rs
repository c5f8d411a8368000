use thiserror::Error;

use crate::entry::TaskStatus;

/// Errors surfaced on the stream returned by [`crate::start`].
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task's `perform` panicked. The payload is stringified because
    /// panic payloads are not guaranteed to be printable.
    #[error("task {task} panicked: {message}")]
    Panicked { task: String, message: String },

    /// The task's `perform` returned an error.
    #[error("task {task} failed: {source}")]
    Failed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// The scheduler was asked to run an entry in a state it cannot run.
    /// This is an internal invariant violation and terminates the run.
    #[error("unexpected status {status} for scheduled task")]
    UnexpectedStatus { status: TaskStatus },

    /// Scheduling stopped with tasks still waiting on dependencies that can
    /// no longer complete.
    #[error("dependency graph deadlocked: {waiting} task(s) waiting with no runnable work")]
    Deadlock { waiting: usize },
}

/// Errors from the named-task front end. These never reach the scheduler.
#[derive(Debug, Error)]
pub enum NamedTaskError {
    #[error("task {name:?} not found")]
    NotFound { name: String },

    #[error("failed to construct task {name:?} with arg {arg:?}: {source}")]
    Construction {
        name: String,
        arg: String,
        #[source]
        source: anyhow::Error,
    },
}
