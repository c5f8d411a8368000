//! # taskmill: deduplicating, dependency-driven parallel task runner
//!
//! Tasks are plain values implementing [`Task`]: an identity (`hash` plus a
//! structural `matches`) and a `perform` body. While performing, a task may
//! declare further requirements through its [`Handler`] and then [`Handler::wait`]
//! until they have all completed. Matching tasks are deduplicated: only the
//! first resolved instance ever performs, however many tasks require it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::any::Any;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use taskmill::{fingerprint, matches_as, Handler, Task};
//!
//! #[derive(Debug, PartialEq)]
//! struct Greet(String);
//!
//! #[async_trait]
//! impl Task for Greet {
//!     fn hash(&self) -> u64 { fingerprint(&self.0) }
//!     fn matches(&self, other: &dyn Task) -> bool { matches_as(self, other) }
//!     fn as_any(&self) -> &dyn Any { self }
//!     async fn perform(&self, _handler: &Handler) -> anyhow::Result<()> {
//!         println!("hello, {}", self.0);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut errors = taskmill::start(Arc::new(Greet("world".into())), 4);
//!     while let Some(error) = errors.recv().await {
//!         eprintln!("{error}");
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod named;

mod entry;
mod handler;
mod messages;
mod ready_queue;
mod registry;
mod scheduler;
mod supervisor;
mod task;

pub use cli::Args;
pub use config::{RunnerConfig, RunnerConfigBuilder};
pub use entry::TaskStatus;
pub use error::{NamedTaskError, TaskError};
pub use handler::Handler;
pub use named::{NamedTaskSet, TaskSupplier};
pub use task::{fingerprint, matches_as, Task};

use std::sync::Arc;

use tokio::sync::mpsc;

use scheduler::Scheduler;

/// Starts scheduling `main_task` with up to `max_parallel` concurrent
/// workers and returns the stream of task errors.
///
/// The caller must drain the stream; once the channel fills, an undrained
/// stream stalls the scheduler. The stream closes when scheduling
/// terminates. Must be called from within a tokio runtime.
///
/// # Panics
///
/// Panics if `max_parallel` is zero.
pub fn start(main_task: Arc<dyn Task>, max_parallel: usize) -> mpsc::Receiver<TaskError> {
    let config = RunnerConfig {
        max_parallel,
        ..RunnerConfig::default()
    };
    start_with_config(main_task, config)
}

/// [`start`] with explicit tuning parameters.
///
/// # Panics
///
/// Panics if the configuration fails validation.
pub fn start_with_config(
    main_task: Arc<dyn Task>,
    config: RunnerConfig,
) -> mpsc::Receiver<TaskError> {
    if let Err(reason) = config.validate() {
        panic!("invalid runner configuration: {reason}");
    }
    let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity());
    let scheduler = Scheduler::new(&config, errors_tx);
    tokio::spawn(scheduler.run(main_task));
    errors_rx
}
