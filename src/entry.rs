use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::handler::HandlerSeat;
use crate::scheduler::Scheduler;
use crate::task::Task;

/// Index of a canonical task inside the registry arena. Edges between
/// entries are stored as these handles, never as owning references, so the
/// dependency graph can be cyclic without any ownership cycle.
pub(crate) type EntryId = usize;

/// Lifecycle of a canonical task.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    New = 0,
    Running = 1,
    Waiting = 2,
    Complete = 3,
    Errored = 4,
}

impl TaskStatus {
    /// Complete and Errored are terminal: no further work is scheduled.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Errored)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::New => "New",
            TaskStatus::Running => "Running",
            TaskStatus::Waiting => "Waiting",
            TaskStatus::Complete => "Complete",
            TaskStatus::Errored => "Errored",
        };
        f.write_str(name)
    }
}

/// One-shot callback fired on an entry's next transition into Waiting.
pub(crate) type WaitingHook = Box<dyn FnOnce(&mut Scheduler, EntryId) + Send>;

/// The scheduler's node for a canonical task. Owned exclusively by the
/// registry; lives from first resolution until shutdown, since late-arriving
/// edges may still target it.
pub(crate) struct TaskEntry {
    pub task: Arc<dyn Task>,
    pub status: TaskStatus,
    /// Back-edges: entries still waiting on this one.
    pub dependents: Vec<EntryId>,
    /// Forward-edges: entries this one is still waiting for.
    pub outstanding: HashSet<EntryId>,
    /// Channel ends kept for resuming the execution and feeding supervisors.
    /// Populated the first time the entry runs, reused across resumptions.
    pub handler: Option<HandlerSeat>,
    on_waiting: Vec<WaitingHook>,
}

impl TaskEntry {
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            status: TaskStatus::New,
            dependents: Vec::new(),
            outstanding: HashSet::new(),
            handler: None,
            on_waiting: Vec::new(),
        }
    }

    /// An entry is ready once every outstanding dependency has completed.
    pub fn is_ready(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Registers a callback for this entry's next Waiting transition. Hooks
    /// registered while hooks are firing accumulate for the transition after
    /// that, never the current one.
    pub fn on_waiting(&mut self, hook: WaitingHook) {
        self.on_waiting.push(hook);
    }

    /// Swaps the hook list to empty and returns the prior hooks for firing.
    pub fn take_waiting_hooks(&mut self) -> Vec<WaitingHook> {
        std::mem::take(&mut self.on_waiting)
    }
}
