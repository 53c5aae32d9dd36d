//! Concurrent fan-out with per-task failure isolation.
//!
//! [`gather_all`] polls every task at the same time and always returns one
//! [`TaskOutcome`] per task, in submission order. A task that errors or
//! panics only loses its own slot.

use futures::FutureExt;
use futures::future::join_all;
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

// ============================================================================
// Task Outcome
// ============================================================================

/// Why a task produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The task returned an error.
    Error {
        /// Rust type name of the error.
        error_type: &'static str,
        /// Rendered error message.
        message: String,
    },
    /// The task panicked.
    Panicked,
    /// The task was still running when the batch deadline passed.
    Cancelled,
}

/// A failed slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Position of the task in the submitted list.
    pub index: usize,
    /// What went wrong.
    pub kind: FailureKind,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Error { error_type, message } => {
                write!(f, "task {} failed ({error_type}): {message}", self.index)
            }
            FailureKind::Panicked => write!(f, "task {} panicked", self.index),
            FailureKind::Cancelled => write!(f, "task {} was cancelled", self.index),
        }
    }
}

/// Result slot of one orchestrated task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// The task produced a value.
    Completed(T),
    /// The task produced nothing usable.
    Failed(TaskFailure),
}

impl<T> TaskOutcome<T> {
    /// Returns true if the slot holds a value.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Borrows the value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Takes the value, turning a failure into `None`.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Borrows the failure, if any.
    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

// ============================================================================
// Gather
// ============================================================================

/// Runs all tasks concurrently and collects one outcome per task.
///
/// Never fails as a whole. Dropping the returned future cancels every task
/// still in flight.
pub async fn gather_all<T, E, F>(tasks: Vec<F>) -> Vec<TaskOutcome<T>>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let total = tasks.len();
    debug!(tasks = total, "Gathering tasks");

    let outcomes = join_all(
        tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| run_isolated(index, task)),
    )
    .await;

    log_summary(total, &outcomes);
    outcomes
}

/// Like [`gather_all`], but stops waiting at `deadline`.
///
/// Tasks unfinished at the deadline are dropped, which cancels their
/// in-flight requests, and their slots are reported as
/// [`FailureKind::Cancelled`].
pub async fn gather_all_until<T, E, F>(tasks: Vec<F>, deadline: Instant) -> Vec<TaskOutcome<T>>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let total = tasks.len();
    debug!(tasks = total, "Gathering tasks with deadline");

    let outcomes = join_all(tasks.into_iter().enumerate().map(|(index, task)| async move {
        match timeout_at(deadline, run_isolated(index, task)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(task = index, "Task cancelled at batch deadline");
                TaskOutcome::Failed(TaskFailure {
                    index,
                    kind: FailureKind::Cancelled,
                })
            }
        }
    }))
    .await;

    log_summary(total, &outcomes);
    outcomes
}

async fn run_isolated<T, E, F>(index: usize, task: F) -> TaskOutcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(Ok(value)) => TaskOutcome::Completed(value),
        Ok(Err(e)) => {
            let error_type = type_name::<E>();
            warn!(task = index, error_type, error = %e, "Task failed");
            TaskOutcome::Failed(TaskFailure {
                index,
                kind: FailureKind::Error {
                    error_type,
                    message: e.to_string(),
                },
            })
        }
        Err(_) => {
            warn!(task = index, "Task panicked");
            TaskOutcome::Failed(TaskFailure {
                index,
                kind: FailureKind::Panicked,
            })
        }
    }
}

fn log_summary<T>(total: usize, outcomes: &[TaskOutcome<T>]) {
    let failed = outcomes.iter().filter(|o| !o.is_completed()).count();
    if failed > 0 {
        warn!(tasks = total, failed, "Gather finished with failures");
    } else {
        debug!(tasks = total, "Gather finished");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::time::Duration;

    type Task = BoxFuture<'static, Result<u32, String>>;

    fn ok(value: u32) -> Task {
        Box::pin(async move { Ok(value) })
    }

    fn fail(message: &str) -> Task {
        let message = message.to_string();
        Box::pin(async move { Err(message) })
    }

    fn slow(value: u32, delay: Duration) -> Task {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        })
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let outcomes = gather_all(vec![ok(1), fail("boom"), ok(2)]).await;

        let values: Vec<Option<u32>> = outcomes.iter().map(|o| o.value().copied()).collect();
        assert_eq!(values, vec![Some(1), None, Some(2)]);

        let failure = outcomes[1].failure().unwrap();
        assert_eq!(failure.index, 1);
        assert!(matches!(&failure.kind, FailureKind::Error { message, .. } if message == "boom"));
    }

    #[tokio::test]
    async fn test_cardinality_and_order() {
        for n in 0..8u32 {
            let tasks: Vec<Task> = (0..n)
                .map(|i| if i % 3 == 0 { fail("x") } else { ok(i) })
                .collect();
            let outcomes = gather_all(tasks).await;

            assert_eq!(outcomes.len(), n as usize);
            for (i, outcome) in outcomes.iter().enumerate() {
                let i = u32::try_from(i).unwrap();
                if i % 3 == 0 {
                    assert_eq!(outcome.failure().map(|f| f.index), Some(i as usize));
                } else {
                    assert_eq!(outcome.value(), Some(&i));
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_when_completion_order_differs() {
        let outcomes = gather_all(vec![
            slow(1, Duration::from_millis(300)),
            slow(2, Duration::from_millis(100)),
            slow(3, Duration::from_millis(200)),
        ])
        .await;

        let values: Vec<u32> = outcomes.into_iter().filter_map(TaskOutcome::into_value).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_concurrently() {
        let started = Instant::now();
        gather_all(vec![
            slow(1, Duration::from_secs(1)),
            slow(2, Duration::from_secs(1)),
            slow(3, Duration::from_secs(1)),
        ])
        .await;

        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_failure() {
        let panicking: Task = Box::pin(async { panic!("bad payload") });
        let outcomes = gather_all(vec![ok(1), panicking]).await;

        assert_eq!(outcomes[0].value(), Some(&1));
        assert_eq!(
            outcomes[1].failure().map(|f| f.kind.clone()),
            Some(FailureKind::Panicked)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_slow_tasks() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let outcomes = gather_all_until(
            vec![
                slow(1, Duration::from_secs(1)),
                slow(2, Duration::from_secs(60)),
                fail("nope"),
            ],
            deadline,
        )
        .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].value(), Some(&1));
        assert_eq!(
            outcomes[1].failure().map(|f| f.kind.clone()),
            Some(FailureKind::Cancelled)
        );
        assert!(matches!(
            outcomes[2].failure().map(|f| &f.kind),
            Some(FailureKind::Error { .. })
        ));
        assert!(Instant::now() <= deadline);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcomes = gather_all(Vec::<Task>::new()).await;
        assert!(outcomes.is_empty());
    }
}
