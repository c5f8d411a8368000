//! The single-owner scheduling loop.
//!
//! Every mutation of the registry, the dependency edges, the counters and
//! the ready queue happens on this loop; workers and supervisors only ever
//! talk to it through bounded channels, so no scheduler state needs a lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::RunnerConfig;
use crate::entry::{EntryId, TaskStatus};
use crate::error::TaskError;
use crate::handler::Handler;
use crate::messages::{ResolveRequest, SchedulerMessage};
use crate::registry::TaskRegistry;
use crate::ready_queue::ReadyQueue;
use crate::supervisor::{supervise, SupervisorComms};
use crate::task::Task;

pub(crate) struct Scheduler {
    registry: TaskRegistry,
    ready: ReadyQueue,
    /// Entries currently Running on a worker.
    num_executing: usize,
    /// Entries currently in the Waiting state.
    num_waiting: usize,
    max_parallel: usize,
    handler_capacity: usize,
    messages: mpsc::Receiver<SchedulerMessage>,
    resolutions: mpsc::Receiver<ResolveRequest>,
    comms: SupervisorComms,
    errors: mpsc::Sender<TaskError>,
}

impl Scheduler {
    pub fn new(config: &RunnerConfig, errors: mpsc::Sender<TaskError>) -> Self {
        let (messages_tx, messages_rx) = mpsc::channel(config.message_capacity());
        let (resolutions_tx, resolutions_rx) = mpsc::channel(config.resolution_capacity());
        Self {
            registry: TaskRegistry::new(),
            ready: ReadyQueue::new(),
            num_executing: 0,
            num_waiting: 0,
            max_parallel: config.max_parallel,
            handler_capacity: config.handler_capacity,
            messages: messages_rx,
            resolutions: resolutions_rx,
            comms: SupervisorComms {
                messages: messages_tx,
                resolutions: resolutions_tx,
            },
            errors,
        }
    }

    /// Runs the loop until no task is executing. The error stream closes
    /// when this returns; a caller that stops draining it stalls the loop
    /// once the channel fills, which is part of the contract.
    pub async fn run(mut self, main_task: Arc<dyn Task>) {
        debug!(max_parallel = self.max_parallel, "scheduler starting");
        let root = self.registry.resolve(main_task);
        self.ready.push(root);
        if self.dispatch().await.is_err() {
            return;
        }

        while self.num_executing > 0 {
            tokio::select! {
                Some(message) = self.messages.recv() => {
                    self.handle_message(message).await;
                }
                Some(request) = self.resolutions.recv() => {
                    self.handle_resolution(request);
                }
                else => break,
            }
            if self.dispatch().await.is_err() {
                return;
            }
        }

        if self.num_waiting > 0 {
            warn!(waiting = self.num_waiting, "scheduler exiting with waiting tasks");
            let _ = self
                .errors
                .send(TaskError::Deadlock {
                    waiting: self.num_waiting,
                })
                .await;
        }
        debug!("scheduler finished");
    }

    async fn handle_message(&mut self, message: SchedulerMessage) {
        let SchedulerMessage { subject, body } = message;
        if let Some(dependencies) = body.dependencies {
            self.process_requirement(subject, dependencies);
        }
        if let Some(error) = body.error {
            debug!(entry = subject, %error, "task reported an error");
            // Only the originally failing task surfaces an error; its
            // dependents are aborted silently below.
            let _ = self.errors.send(error).await;
        }
        match body.status {
            None => {}
            Some(TaskStatus::Complete) => self.process_complete(subject),
            Some(TaskStatus::Waiting) => self.process_wait(subject),
            Some(TaskStatus::Errored) => {
                self.num_executing -= 1;
                self.process_errored(subject);
            }
            Some(status) => {
                warn!(entry = subject, %status, "ignoring invalid status request");
            }
        }
    }

    /// Answers a resolution round-trip. The reply slot is reserved by the
    /// requester, so this never blocks the loop. Resolution alone neither
    /// records an edge nor schedules the resolved entry.
    fn handle_resolution(&mut self, request: ResolveRequest) {
        let id = self.registry.resolve(request.task);
        let _ = request.reply.send(self.registry.entry(id).task.clone());
    }

    /// Records edges for each dependency declared by `dependent` and
    /// enqueues fresh dependencies that are ready to run.
    fn process_requirement(&mut self, dependent: EntryId, dependencies: Vec<Arc<dyn Task>>) {
        for task in dependencies {
            let resolved = self.registry.resolve(task);
            let status = self.registry.entry(resolved).status;
            trace!(entry = dependent, dependency = resolved, %status, "requirement declared");
            match status {
                // Already satisfied: no edge in either direction (a Complete
                // entry never transitions again, see process_complete).
                TaskStatus::Complete => {}
                // Already failed: the dependent must abort at its next
                // yield, the same cooperative rule used for propagation.
                TaskStatus::Errored => {
                    self.registry
                        .entry_mut(dependent)
                        .on_waiting(Box::new(|scheduler, entry| {
                            scheduler.process_errored(entry)
                        }));
                }
                _ => {
                    self.registry
                        .entry_mut(dependent)
                        .outstanding
                        .insert(resolved);
                    self.registry.entry_mut(resolved).dependents.push(dependent);
                    // Fresh dependencies start at once; a Running or Waiting
                    // entry must not be double-queued and will make its own
                    // way forward.
                    if status == TaskStatus::New && self.registry.entry(resolved).is_ready() {
                        self.ready.push(resolved);
                    }
                }
            }
        }
    }

    fn process_complete(&mut self, subject: EntryId) {
        self.num_executing -= 1;
        self.registry.entry_mut(subject).status = TaskStatus::Complete;
        // A task may have declared requirements it never waited for; drop
        // those edges so terminal entries hold no outstanding set.
        self.clear_outstanding(subject);
        let dependents = self.registry.entry(subject).dependents.clone();
        trace!(entry = subject, dependents = dependents.len(), "task complete");
        for dependent in dependents {
            self.registry
                .entry_mut(dependent)
                .outstanding
                .remove(&subject);
            self.process_waiting_entry(dependent);
        }
    }

    fn process_wait(&mut self, subject: EntryId) {
        self.num_executing -= 1;
        self.num_waiting += 1;
        self.registry.entry_mut(subject).status = TaskStatus::Waiting;
        let hooks = self.registry.entry_mut(subject).take_waiting_hooks();
        for hook in hooks {
            hook(self, subject);
        }
        // A hook may have aborted the entry; only a still-Waiting entry is
        // eligible to resume.
        if self.registry.entry(subject).status == TaskStatus::Waiting {
            self.process_waiting_entry(subject);
        }
    }

    /// Enqueues a Waiting entry whose outstanding dependencies are gone.
    fn process_waiting_entry(&mut self, id: EntryId) {
        let entry = self.registry.entry(id);
        if entry.status == TaskStatus::Waiting && entry.is_ready() {
            self.ready.push(id);
        }
    }

    /// Marks `id` Errored and propagates the abort through its dependents.
    /// Running dependents cannot be interrupted; they are hooked to abort at
    /// their next voluntary yield instead.
    fn process_errored(&mut self, id: EntryId) {
        let status = self.registry.entry(id).status;
        if status.is_terminal() {
            return;
        }
        if status == TaskStatus::Waiting {
            self.num_waiting -= 1;
        }
        self.registry.entry_mut(id).status = TaskStatus::Errored;
        self.clear_outstanding(id);
        let dependents = self.registry.entry(id).dependents.clone();
        trace!(entry = id, dependents = dependents.len(), "task errored");
        for dependent in dependents {
            match self.registry.entry(dependent).status {
                TaskStatus::New | TaskStatus::Waiting => self.process_errored(dependent),
                TaskStatus::Running => {
                    self.registry
                        .entry_mut(dependent)
                        .on_waiting(Box::new(|scheduler, entry| {
                            scheduler.process_errored(entry)
                        }));
                }
                TaskStatus::Complete | TaskStatus::Errored => {}
            }
        }
    }

    /// Removes every forward edge of `id`, paired with the matching
    /// back-edge removal on the dependency side.
    fn clear_outstanding(&mut self, id: EntryId) {
        let outstanding = std::mem::take(&mut self.registry.entry_mut(id).outstanding);
        for dependency in outstanding {
            self.registry
                .entry_mut(dependency)
                .dependents
                .retain(|&dependent| dependent != id);
        }
    }

    /// Drains the ready queue up to the parallelism budget. An entry in a
    /// non-runnable state here is an internal invariant violation and ends
    /// the run.
    async fn dispatch(&mut self) -> Result<(), ()> {
        while self.num_executing < self.max_parallel {
            let Some(id) = self.ready.pop() else {
                break;
            };
            if let Err(error) = self.run_entry(id) {
                warn!(%error, "fatal scheduler error");
                let _ = self.errors.send(error).await;
                return Err(());
            }
        }
        Ok(())
    }

    /// Dispatches one entry: a fresh execution for a New entry, a resumption
    /// signal for a Waiting one. Either way the entry becomes Running and a
    /// new supervisor is bound to its handler.
    fn run_entry(&mut self, id: EntryId) -> Result<(), TaskError> {
        let status = self.registry.entry(id).status;
        match status {
            TaskStatus::New => {
                let (handler, seat) = Handler::channel(self.handler_capacity);
                let inbound = seat.inbound.clone();
                let entry = self.registry.entry_mut(id);
                entry.status = TaskStatus::Running;
                entry.handler = Some(seat);
                let task = entry.task.clone();
                self.num_executing += 1;
                trace!(entry = id, "starting task");
                spawn_worker(task, handler);
                tokio::spawn(supervise(id, inbound, self.comms.clone()));
            }
            TaskStatus::Waiting => {
                self.num_waiting -= 1;
                let entry = self.registry.entry_mut(id);
                entry.status = TaskStatus::Running;
                let Some(seat) = entry.handler.as_ref() else {
                    return Err(TaskError::UnexpectedStatus { status });
                };
                let inbound = seat.inbound.clone();
                if seat.resume_tx.try_send(()).is_err() {
                    warn!(entry = id, "resumption slot unavailable");
                }
                self.num_executing += 1;
                trace!(entry = id, "resuming task");
                tokio::spawn(supervise(id, inbound, self.comms.clone()));
            }
            _ => return Err(TaskError::UnexpectedStatus { status }),
        }
        Ok(())
    }
}

/// Runs one task execution on its own spawned future. The return value or
/// panic of `perform` is the sole producer on the handler's message channel:
/// a failure becomes an error message, and the channel close when the
/// handler drops is the terminator either way.
fn spawn_worker(task: Arc<dyn Task>, handler: Arc<Handler>) {
    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(task.perform(&handler))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                let error = TaskError::Failed {
                    task: format!("{task:?}"),
                    source,
                };
                handler.send_error(error).await;
            }
            Err(payload) => {
                let error = TaskError::Panicked {
                    task: format!("{task:?}"),
                    message: panic_message(payload.as_ref()),
                };
                handler.send_error(error).await;
            }
        }
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_stringified() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&42_u32), "non-string panic payload");
    }
}
