use std::sync::Arc;

use tokio::sync::oneshot;

use crate::entry::{EntryId, TaskStatus};
use crate::error::TaskError;
use crate::task::Task;

/// Traffic from an executing task to its supervisor. A single message may
/// carry dependency declarations, a requested status change, and an error;
/// an error alone does not fail the task, which is why [`TaskMessage::errored`]
/// also requests the Errored status.
pub(crate) struct TaskMessage {
    pub dependencies: Option<Vec<Arc<dyn Task>>>,
    pub status: Option<TaskStatus>,
    pub error: Option<TaskError>,
}

impl TaskMessage {
    pub fn require(dependencies: Vec<Arc<dyn Task>>) -> Self {
        Self {
            dependencies: Some(dependencies),
            status: None,
            error: None,
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self {
            dependencies: None,
            status: Some(status),
            error: None,
        }
    }

    pub fn errored(error: TaskError) -> Self {
        Self {
            dependencies: None,
            status: Some(TaskStatus::Errored),
            error: Some(error),
        }
    }

    pub fn requested_status(&self) -> Option<TaskStatus> {
        self.status
    }
}

/// A task message annotated with the entry it concerns. Only the supervisor
/// knows which entry owns a handler's traffic, so it adds the subject before
/// forwarding to the scheduler.
pub(crate) struct SchedulerMessage {
    pub subject: EntryId,
    pub body: TaskMessage,
}

/// Round-trip request for the canonical instance of a task. The reply slot
/// is reserved by the requester, so the scheduler's answer never blocks.
pub(crate) struct ResolveRequest {
    pub task: Arc<dyn Task>,
    pub reply: oneshot::Sender<Arc<dyn Task>>,
}
