use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::entry::TaskStatus;
use crate::error::TaskError;
use crate::messages::{ResolveRequest, TaskMessage};
use crate::task::Task;

/// Per-task façade handed to [`Task::perform`].
///
/// All operations are message sends to the scheduler via the task's current
/// supervisor. The handler is created when the task first runs and reused
/// across every Waiting→Running resumption; dropping it (by returning from
/// `perform`) closes the message channel, which is the completion signal.
pub struct Handler {
    messages: mpsc::Sender<TaskMessage>,
    resolutions: mpsc::Sender<ResolveRequest>,
    resume: Mutex<mpsc::Receiver<()>>,
}

impl Handler {
    /// Builds the handler façade together with the scheduler-side seat.
    pub(crate) fn channel(capacity: usize) -> (Arc<Handler>, HandlerSeat) {
        let (messages_tx, messages_rx) = mpsc::channel(capacity);
        let (resolutions_tx, resolutions_rx) = mpsc::channel(capacity);
        let (resume_tx, resume_rx) = mpsc::channel(1);
        let handler = Arc::new(Handler {
            messages: messages_tx,
            resolutions: resolutions_tx,
            resume: Mutex::new(resume_rx),
        });
        let seat = HandlerSeat {
            resume_tx,
            inbound: Arc::new(SupervisorInbound {
                messages: Mutex::new(messages_rx),
                resolutions: Mutex::new(resolutions_rx),
            }),
        };
        (handler, seat)
    }

    /// Declares a dependency on `task`. Non-blocking from the task's point
    /// of view; the scheduler resolves the declared task to its canonical
    /// instance and records the edge.
    pub async fn require(&self, task: Arc<dyn Task>) {
        let _ = self.messages.send(TaskMessage::require(vec![task])).await;
    }

    /// Yields this task's worker slot until every dependency declared so
    /// far has completed. Declarations and the wait travel on the same
    /// ordered channel, so the scheduler observes them in order.
    pub async fn wait(&self) {
        if self
            .messages
            .send(TaskMessage::status(TaskStatus::Waiting))
            .await
            .is_err()
        {
            // The scheduler has abandoned this task; code past wait() must
            // never run.
            pending::<()>().await;
        }
        let mut resume = self.resume.lock().await;
        if resume.recv().await.is_none() {
            drop(resume);
            pending::<()>().await;
        }
    }

    /// Returns the canonical instance of `task` without declaring a
    /// dependency and without yielding the Running slot. Blocks briefly on
    /// a scheduler round-trip.
    pub async fn resolve(&self, task: Arc<dyn Task>) -> Arc<dyn Task> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ResolveRequest {
            task: task.clone(),
            reply: reply_tx,
        };
        if self.resolutions.send(request).await.is_err() {
            // Scheduler gone; the run is shutting down. The argument is the
            // best available answer.
            return task;
        }
        reply_rx.await.unwrap_or(task)
    }

    /// Reports a failure from the worker wrapper. The message both carries
    /// the error and requests the Errored status; the channel close that
    /// follows is the execution terminator.
    pub(crate) async fn send_error(&self, error: TaskError) {
        let _ = self.messages.send(TaskMessage::errored(error)).await;
    }
}

/// Scheduler-side ends of a handler's channels, stored in the task's entry:
/// the resumption slot for waking a Waiting task, and the receivers each
/// freshly spawned supervisor drains.
pub(crate) struct HandlerSeat {
    pub resume_tx: mpsc::Sender<()>,
    pub inbound: Arc<SupervisorInbound>,
}

/// Receivers shared by successive supervisors of one entry. At most one
/// supervisor exists per entry at a time, so the mutexes are uncontended;
/// they only carry the receivers from one supervisor to the next.
pub(crate) struct SupervisorInbound {
    pub messages: Mutex<mpsc::Receiver<TaskMessage>>,
    pub resolutions: Mutex<mpsc::Receiver<ResolveRequest>>,
}
