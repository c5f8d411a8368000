use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::entry::{EntryId, TaskEntry};
use crate::task::Task;

/// Arena of canonical task entries plus the hash-bucketed lookup chains.
///
/// The registry is the sole owner of every [`TaskEntry`]; all graph edges
/// are [`EntryId`] lookups into it. Per-hash chains handle collisions by
/// linear `matches` scan, which is O(1) for a well-distributed hash.
pub(crate) struct TaskRegistry {
    entries: Vec<TaskEntry>,
    chains: HashMap<u64, SmallVec<[EntryId; 2]>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            chains: HashMap::new(),
        }
    }

    /// Deduplicating lookup: returns the canonical entry for `task`,
    /// creating a fresh New entry on first sight. The first-inserted entry
    /// wins; later matching tasks are discarded and will never perform.
    pub fn resolve(&mut self, task: Arc<dyn Task>) -> EntryId {
        let key = task.hash();
        let chain = self.chains.entry(key).or_default();
        for &id in chain.iter() {
            if task.matches(self.entries[id].task.as_ref()) {
                return id;
            }
        }
        let id = self.entries.len();
        trace!(hash = key, entry = id, "registering new canonical task");
        self.entries.push(TaskEntry::new(task));
        chain.push(id);
        id
    }

    pub fn entry(&self, id: EntryId) -> &TaskEntry {
        &self.entries[id]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut TaskEntry {
        &mut self.entries[id]
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    use async_trait::async_trait;

    use crate::handler::Handler;

    /// Test task with an explicit hash so collisions can be forced.
    #[derive(Debug)]
    struct Stub {
        key: u64,
        tag: &'static str,
    }

    #[async_trait]
    impl Task for Stub {
        fn hash(&self) -> u64 {
            self.key
        }

        fn matches(&self, other: &dyn Task) -> bool {
            other
                .as_any()
                .downcast_ref::<Stub>()
                .is_some_and(|other| other.tag == self.tag)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn perform(&self, _handler: &Handler) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn resolve_deduplicates_matching_tasks() {
        let mut registry = TaskRegistry::new();
        let first = registry.resolve(Arc::new(Stub { key: 1, tag: "a" }));
        let second = registry.resolve(Arc::new(Stub { key: 1, tag: "a" }));
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn colliding_hashes_chain_separately() {
        let mut registry = TaskRegistry::new();
        let a = registry.resolve(Arc::new(Stub { key: 7, tag: "a" }));
        let b = registry.resolve(Arc::new(Stub { key: 7, tag: "b" }));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn first_inserted_entry_wins() {
        let mut registry = TaskRegistry::new();
        let original: Arc<dyn Task> = Arc::new(Stub { key: 3, tag: "x" });
        let id = registry.resolve(original.clone());
        let duplicate = registry.resolve(Arc::new(Stub { key: 3, tag: "x" }));
        assert_eq!(id, duplicate);
        assert!(Arc::ptr_eq(&registry.entry(id).task, &original));
    }
}
