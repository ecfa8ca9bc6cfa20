//! Deferred finalization
//!
//! Generated types may reference types that are still being completed while
//! code generation runs. Their finalization is registered here as ordered
//! completion tasks and run once by the unit driver after all code
//! generation of the unit is done.

use parking_lot::Mutex;

use crate::compiler::types::TypeError;

/// Error raised by a completion task
#[derive(Debug, thiserror::Error)]
pub enum FinishError {
    #[error("Finish task `{task}` failed: {source}")]
    Type {
        task: String,
        #[source]
        source: TypeError,
    },
    #[error("Type {0} was already finalized")]
    AlreadyFinalized(String),
}

type TaskFn = Box<dyn FnOnce() -> Result<(), FinishError> + Send>;

/// A named one-shot completion task
pub struct FinishTask {
    name: String,
    run: TaskFn,
}

impl FinishTask {
    /// Task name, for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for FinishTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinishTask").field("name", &self.name).finish()
    }
}

/// Ordered queue of completion tasks
///
/// Registration may happen from any thread; draining consumes the queue so
/// each task runs at most once.
#[derive(Debug, Default)]
pub struct FinishQueue {
    tasks: Mutex<Vec<FinishTask>>,
}

impl FinishQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task to run after code generation
    pub fn register<F>(&self, name: impl Into<String>, task: F)
    where
        F: FnOnce() -> Result<(), FinishError> + Send + 'static,
    {
        self.tasks.lock().push(FinishTask {
            name: name.into(),
            run: Box::new(task),
        });
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no task is pending
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Names of pending tasks in registration order
    pub fn pending(&self) -> Vec<String> {
        self.tasks.lock().iter().map(|t| t.name.clone()).collect()
    }

    /// Run every task in registration order, stopping at the first failure
    pub fn run_all(self) -> Result<usize, FinishError> {
        let tasks = self.tasks.into_inner();
        let count = tasks.len();
        for task in tasks {
            log::debug!("running finish task `{}`", task.name);
            (task.run)()?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_runs_in_order() {
        let queue = FinishQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            queue.register(format!("task{}", i), move || {
                log.lock().push(i);
                Ok(())
            });
        }

        assert_eq!(queue.pending(), vec!["task0", "task1", "task2"]);
        assert_eq!(queue.run_all().unwrap(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_stops_at_first_failure() {
        let queue = FinishQueue::new();
        let ran = Arc::new(Mutex::new(false));
        queue.register("bad", || Err(FinishError::AlreadyFinalized("demo/A".to_string())));
        let flag = ran.clone();
        queue.register("after", move || {
            *flag.lock() = true;
            Ok(())
        });

        let err = queue.run_all().unwrap_err();
        assert!(matches!(err, FinishError::AlreadyFinalized(_)));
        assert!(!*ran.lock());
    }

    #[test]
    fn test_register_from_threads() {
        let queue = FinishQueue::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let queue = &queue;
                s.spawn(move || queue.register(format!("t{}", i), || Ok(())));
            }
        });
        assert_eq!(queue.len(), 8);
    }
}
