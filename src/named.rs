//! Named-task front end: maps string requests such as `build` or
//! `compile(main.c)` onto registered task constructors, producing a root
//! task that requires every requested task. Useful for driving the runner
//! from command-line arguments.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::NamedTaskError;
use crate::handler::Handler;
use crate::task::Task;

/// Constructor for a registered task name. Receives the parenthesised
/// argument of the request, or the empty string when none was given.
pub type TaskSupplier = Box<dyn Fn(&str) -> anyhow::Result<Arc<dyn Task>> + Send + Sync>;

static TASK_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\w+)(?:\((?P<arg>.+)\))?$").expect("task request pattern is valid")
});

/// Registry of named task constructors.
#[derive(Default)]
pub struct NamedTaskSet {
    suppliers: HashMap<String, TaskSupplier>,
}

impl NamedTaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `supplier` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, supplier: F)
    where
        F: Fn(&str) -> anyhow::Result<Arc<dyn Task>> + Send + Sync + 'static,
    {
        self.suppliers.insert(name.into(), Box::new(supplier));
    }

    /// Constructs every requested task and wraps them in a root task that
    /// requires them all. Requests that do not parse are reported as
    /// not-found; a supplier failure is wrapped with the offending name and
    /// argument.
    pub fn build(&self, requests: &[String]) -> Result<Arc<dyn Task>, NamedTaskError> {
        let mut targets = Vec::with_capacity(requests.len());
        for request in requests {
            let Some(captures) = TASK_REQUEST.captures(request) else {
                return Err(NamedTaskError::NotFound {
                    name: request.clone(),
                });
            };
            let name = &captures["name"];
            let arg = captures.name("arg").map(|m| m.as_str()).unwrap_or("");
            let supplier = self
                .suppliers
                .get(name)
                .ok_or_else(|| NamedTaskError::NotFound {
                    name: name.to_string(),
                })?;
            let task = supplier(arg).map_err(|source| NamedTaskError::Construction {
                name: name.to_string(),
                arg: arg.to_string(),
                source,
            })?;
            targets.push(task);
        }
        Ok(Arc::new(RootTask { targets }))
    }
}

/// Hidden root of a named run. Matches nothing so repeated runs never
/// deduplicate against each other, and completes as soon as its targets are
/// declared; target errors still surface on the error stream.
#[derive(Debug)]
struct RootTask {
    targets: Vec<Arc<dyn Task>>,
}

#[async_trait]
impl Task for RootTask {
    fn hash(&self) -> u64 {
        0
    }

    fn matches(&self, _other: &dyn Task) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn perform(&self, handler: &Handler) -> anyhow::Result<()> {
        for target in &self.targets {
            handler.require(target.clone()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[derive(Debug, PartialEq)]
    struct MockTask(u32);

    #[async_trait]
    impl Task for MockTask {
        fn hash(&self) -> u64 {
            0
        }

        fn matches(&self, other: &dyn Task) -> bool {
            crate::task::matches_as(self, other)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn perform(&self, _handler: &Handler) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn mock_set() -> NamedTaskSet {
        let mut set = NamedTaskSet::new();
        set.register("one", |_| Ok(Arc::new(MockTask(1)) as Arc<dyn Task>));
        set.register("two", |_| Ok(Arc::new(MockTask(2)) as Arc<dyn Task>));
        set.register("three", |_| Ok(Arc::new(MockTask(3)) as Arc<dyn Task>));
        set
    }

    /// Performs the root task against a fresh handler and returns the ids
    /// of every MockTask it required.
    async fn required_ids(root: Arc<dyn Task>) -> Vec<u32> {
        let (handler, seat) = Handler::channel(16);
        root.perform(&handler).await.unwrap();
        let mut messages = seat.inbound.messages.lock().await;
        let mut ids = Vec::new();
        while let Ok(message) = messages.try_recv() {
            for dependency in message.dependencies.unwrap_or_default() {
                let mock = dependency
                    .as_any()
                    .downcast_ref::<MockTask>()
                    .expect("required task is a MockTask");
                ids.push(mock.0);
            }
        }
        ids
    }

    #[tokio::test]
    async fn requires_each_named_task() {
        for (input, expected) in [
            (vec!["one", "two", "three"], vec![1, 2, 3]),
            (vec![], vec![]),
            (vec!["two"], vec![2]),
            (vec!["three", "two"], vec![3, 2]),
        ] {
            let requests: Vec<String> = input.iter().map(|s| s.to_string()).collect();
            let root = mock_set().build(&requests).unwrap();
            assert_eq!(required_ids(root).await, expected, "input {input:?}");
        }
    }

    #[tokio::test]
    async fn passes_arguments_to_suppliers() {
        let mut set = NamedTaskSet::new();
        set.register("compile", |arg| {
            let id = match arg {
                "hello.c" => 1,
                "main.c" => 2,
                "" => 3,
                other => return Err(anyhow!("unexpected arg {other:?}")),
            };
            Ok(Arc::new(MockTask(id)) as Arc<dyn Task>)
        });
        let requests = vec![
            "compile(hello.c)".to_string(),
            "compile(main.c)".to_string(),
            "compile".to_string(),
        ];
        let root = set.build(&requests).unwrap();
        assert_eq!(required_ids(root).await, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let requests = vec!["one".to_string(), "nonexistent".to_string()];
        let err = mock_set().build(&requests).unwrap_err();
        match err {
            NamedTaskError::NotFound { name } => assert_eq!(name, "nonexistent"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_request_is_not_found() {
        let requests = vec!["one(".to_string()];
        let err = mock_set().build(&requests).unwrap_err();
        assert!(matches!(err, NamedTaskError::NotFound { .. }));
    }

    #[test]
    fn supplier_failure_wraps_construction_error() {
        let mut set = NamedTaskSet::new();
        set.register("broken", |_| Err(anyhow!("no such source file")));
        let err = set.build(&["broken(x)".to_string()]).unwrap_err();
        match err {
            NamedTaskError::Construction { name, arg, source } => {
                assert_eq!(name, "broken");
                assert_eq!(arg, "x");
                assert_eq!(source.to_string(), "no such source file");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
