//! CIS task lookup and task waiting.
//!
//! A submitted task is polled until it is terminal, the configured deadline
//! passes, or the cancellation token fires.

use crate::api::VsphereApi;
use crate::error::{VmwareError, VmwareResult};
use crate::types::{TaskHandle, TaskInfo, TaskOutcome, TaskStatus, VsphereConfig};
use crate::vsphere::escape;
use crate::vsphere::VsphereClient;

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Task record access.
pub struct TaskManager<'a> {
    client: &'a VsphereClient,
}

impl<'a> TaskManager<'a> {
    pub fn new(client: &'a VsphereClient) -> Self {
        Self { client }
    }

    /// GET /api/cis/tasks/{task}
    pub async fn get_task(&self, task_id: &str) -> VmwareResult<TaskInfo> {
        let path = format!("/api/cis/tasks/{}", escape(task_id));
        self.client.get::<TaskInfo>(&path).await
    }
}

/// Bounded, cancellable wait on task handles.
#[derive(Debug, Clone)]
pub struct TaskWaiter {
    timeout: Duration,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl TaskWaiter {
    pub fn new(timeout: Duration, poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, poll_interval, cancel }
    }

    pub fn from_config(config: &VsphereConfig, cancel: CancellationToken) -> Self {
        Self::new(
            Duration::from_secs(config.task_timeout_secs),
            Duration::from_millis(config.task_poll_interval_ms),
            cancel,
        )
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Block until the task behind `handle` succeeds or fails.
    pub async fn wait(&self, api: &dyn VsphereApi, handle: TaskHandle) -> VmwareResult<TaskOutcome> {
        let task_id = match handle {
            TaskHandle::Completed { result } => return Ok(TaskOutcome { result }),
            TaskHandle::Pending { task_id } => task_id,
        };

        // A timeout too large to represent means no deadline.
        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            if self.cancel.is_cancelled() {
                return Err(VmwareError::cancelled(format!(
                    "Stopped waiting for task {task_id}; it may still be running on vCenter"
                )));
            }

            let info = api.task_info(&task_id).await?;
            log::debug!("Task {task_id} is {:?}", info.status);
            match info.status {
                TaskStatus::Succeeded => {
                    return Ok(TaskOutcome { result: info.result_text() });
                }
                TaskStatus::Failed => {
                    return Err(VmwareError::task(format!(
                        "Task {task_id} failed: {}",
                        info.error_message()
                    )));
                }
                _ => {}
            }

            let now = Instant::now();
            let nap = match deadline {
                Some(d) if now >= d => {
                    return Err(VmwareError::timeout(format!(
                        "Task {task_id} did not finish within {}s",
                        self.timeout.as_secs()
                    )));
                }
                Some(d) => self.poll_interval.min(d - now),
                None => self.poll_interval,
            };
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = sleep(nap) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmwareErrorKind;
    use crate::mock::MockVsphere;

    fn waiter(timeout_ms: u64) -> TaskWaiter {
        TaskWaiter::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(5),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn completed_handle_returns_immediately() {
        let mock = MockVsphere::new();
        let out = waiter(10)
            .wait(&mock, TaskHandle::done_with("vm-5"))
            .await
            .unwrap();
        assert_eq!(out.result.as_deref(), Some("vm-5"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn pending_task_polled_until_success() {
        let mock = MockVsphere::new();
        mock.script_task("task-1", &[TaskStatus::Pending, TaskStatus::Running], Ok("vm-77"));
        let out = waiter(5_000)
            .wait(&mock, TaskHandle::Pending { task_id: "task-1".into() })
            .await
            .unwrap();
        assert_eq!(out.result.as_deref(), Some("vm-77"));
        assert_eq!(mock.count_calls("task_info"), 3);
    }

    #[tokio::test]
    async fn failed_task_surfaces_fault() {
        let mock = MockVsphere::new();
        mock.script_task("task-2", &[TaskStatus::Running], Err("Insufficient disk space"));
        let err = waiter(5_000)
            .wait(&mock, TaskHandle::Pending { task_id: "task-2".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::TaskError);
        assert!(err.message.contains("Insufficient disk space"));
    }

    #[tokio::test]
    async fn never_finishing_task_times_out() {
        let mock = MockVsphere::new();
        mock.script_task("task-3", &[TaskStatus::Running; 10_000], Ok("never"));
        let err = waiter(30)
            .wait(&mock, TaskHandle::Pending { task_id: "task-3".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::Timeout);
    }

    #[tokio::test]
    async fn unbounded_timeout_still_polls_to_success() {
        let mock = MockVsphere::new();
        mock.script_task("task-5", &[TaskStatus::Running, TaskStatus::Running], Ok("vm-88"));
        let w = TaskWaiter::new(Duration::from_secs(u64::MAX), Duration::from_millis(1), CancellationToken::new());
        let out = w
            .wait(&mock, TaskHandle::Pending { task_id: "task-5".into() })
            .await
            .unwrap();
        assert_eq!(out.result.as_deref(), Some("vm-88"));
    }

    #[tokio::test]
    async fn cancelled_wait_stops_polling() {
        let mock = MockVsphere::new();
        mock.script_task("task-4", &[TaskStatus::Running; 10_000], Ok("never"));
        let w = waiter(60_000);
        w.cancel_token().cancel();
        let err = w
            .wait(&mock, TaskHandle::Pending { task_id: "task-4".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::Cancelled);
        assert_eq!(mock.count_calls("task_info"), 0);
    }
}
