use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::handler::Handler;

/// A user-defined unit of work.
///
/// A task carries its own identity: `hash` buckets it in the registry and
/// `matches` decides structural equality within a bucket. Two tasks that
/// match are the *same* work, and only the first one resolved will ever have
/// its `perform` called. Matching tasks must therefore return equal hashes.
#[async_trait]
pub trait Task: fmt::Debug + Send + Sync + 'static {
    /// Deduplication hash. Must be deterministic for the process lifetime.
    fn hash(&self) -> u64;

    /// Structural equality against another task. Should be reflexive,
    /// symmetric and transitive, and consistent with [`Task::hash`].
    fn matches(&self, other: &dyn Task) -> bool;

    /// Downcast support for implementing [`Task::matches`].
    fn as_any(&self) -> &dyn Any;

    /// The work itself. Runs at most once per canonical task. Use the
    /// handler to declare further requirements and to yield until they
    /// complete.
    async fn perform(&self, handler: &Handler) -> anyhow::Result<()>;
}

/// Hashes any `Hash` value with the standard hasher. Convenience for
/// implementing [`Task::hash`] from a task's identifying fields.
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Downcast-and-compare convenience for implementing [`Task::matches`] on
/// tasks that derive `PartialEq`.
pub fn matches_as<T>(task: &T, other: &dyn Task) -> bool
where
    T: Task + PartialEq,
{
    other
        .as_any()
        .downcast_ref::<T>()
        .is_some_and(|other| task == other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Echo(&'static str);

    #[async_trait]
    impl Task for Echo {
        fn hash(&self) -> u64 {
            fingerprint(self.0)
        }

        fn matches(&self, other: &dyn Task) -> bool {
            matches_as(self, other)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn perform(&self, _handler: &Handler) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint("hello.c"), fingerprint("hello.c"));
        assert_ne!(fingerprint("hello.c"), fingerprint("main.c"));
    }

    #[test]
    fn matches_as_compares_within_type() {
        let a = Echo("a");
        let b = Echo("b");
        assert!(a.matches(&Echo("a")));
        assert!(!a.matches(&b));
    }
}
