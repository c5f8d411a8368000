//! Supervisors relay a running task's handler traffic to the scheduler.
//! One is spawned per execution (fresh run and every resumption) and exits
//! as soon as its task yields, so they carry no persistent state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::entry::{EntryId, TaskStatus};
use crate::handler::SupervisorInbound;
use crate::messages::{ResolveRequest, SchedulerMessage, TaskMessage};

/// Scheduler-side senders handed to every supervisor.
#[derive(Clone)]
pub(crate) struct SupervisorComms {
    pub messages: mpsc::Sender<SchedulerMessage>,
    pub resolutions: mpsc::Sender<ResolveRequest>,
}

/// Shuttles messages from `subject`'s handler to the scheduler, annotating
/// each with the owning entry. Exits after forwarding any yielding status
/// (a new supervisor is spawned when the task is scheduled again), or after
/// synthesizing a Complete when the handler's message channel closes.
///
/// Channel closure doubles as the completion signal so that a panic in task
/// code (whose error travels as a pre-close message) needs no special
/// terminator of its own.
pub(crate) async fn supervise(
    subject: EntryId,
    inbound: Arc<SupervisorInbound>,
    comms: SupervisorComms,
) {
    let mut messages = inbound.messages.lock().await;
    let mut resolutions = inbound.resolutions.lock().await;
    let mut resolutions_open = true;
    loop {
        tokio::select! {
            request = resolutions.recv(), if resolutions_open => match request {
                Some(request) => {
                    if comms.resolutions.send(request).await.is_err() {
                        return;
                    }
                }
                None => resolutions_open = false,
            },
            message = messages.recv() => match message {
                Some(body) => {
                    let yielded = body.requested_status().is_some_and(is_yielding);
                    if comms
                        .messages
                        .send(SchedulerMessage { subject, body })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    if yielded {
                        trace!(entry = subject, "supervisor exiting after yield");
                        return;
                    }
                }
                None => {
                    // Clean return from perform: the close is the terminator.
                    let _ = comms
                        .messages
                        .send(SchedulerMessage {
                            subject,
                            body: TaskMessage::status(TaskStatus::Complete),
                        })
                        .await;
                    return;
                }
            },
        }
    }
}

/// A status that ends the current execution, and with it the supervisor.
fn is_yielding(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::Waiting | TaskStatus::Complete | TaskStatus::Errored
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yielding_statuses_end_the_supervisor() {
        assert!(is_yielding(TaskStatus::Waiting));
        assert!(is_yielding(TaskStatus::Complete));
        assert!(is_yielding(TaskStatus::Errored));
        assert!(!is_yielding(TaskStatus::New));
        assert!(!is_yielding(TaskStatus::Running));
    }
}
