use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::context::ExecutionContext;
use crate::core::parameters::JobParameters;
use crate::error::BatchError;

pub mod memory;

/// Lifecycle status shared by job and step executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Execution record created, resources not yet opened.
    Starting,
    /// Actively processing.
    Started,
    /// Finished successfully.
    Completed,
    /// Finished with an unresolved failure.
    Failed,
    /// Stopped on request at a chunk or step boundary.
    Stopped,
    /// Marked as not restartable by an operator.
    Abandoned,
}

impl BatchStatus {
    /// Terminal statuses never transition again; a new execution must be
    /// created to make further progress on the instance.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Stopped
                | BatchStatus::Abandoned
        )
    }

    pub fn is_running(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Stopped => "STOPPED",
            BatchStatus::Abandoned => "ABANDONED",
        };
        f.write_str(label)
    }
}

/// The logical identity of one job + parameters combination.
///
/// Created once on first launch with the given parameters; a later launch
/// with equal parameters resolves to the same instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: Uuid,
    pub job_name: String,
    pub parameters: JobParameters,
}

/// One attempt to run a job instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub status: BatchStatus,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub exit_description: Option<String>,
    pub context: ExecutionContext,
}

/// One attempt to run a step within a job execution.
///
/// Counters follow chunk commits: `read_count` covers every successfully
/// read item including ones later filtered or skipped, `write_count` only
/// items actually applied by the writer, and `commit_count` the number of
/// committed chunks. The context carries the reader's checkpoint token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Uuid,
    pub job_execution_id: Uuid,
    pub step_name: String,
    pub status: BatchStatus,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub read_count: usize,
    pub write_count: usize,
    pub filter_count: usize,
    pub skip_count: usize,
    pub commit_count: usize,
    pub rollback_count: usize,
    pub exit_description: Option<String>,
    pub context: ExecutionContext,
}

/// Durable store of job/step execution records; the single source of truth
/// for restart decisions.
///
/// Contract for every implementation:
///
/// - Writes are atomic with respect to a single execution/step record; no
///   partial update is ever observable.
/// - Every update is durable before the call returns, so a crash immediately
///   after a chunk commit leaves recoverable state.
/// - Concurrent readers are supported; writes are serialized per job
///   instance.
/// - [`create_job_execution`](ExecutionRepository::create_job_execution)
///   atomically enforces the single-running-execution rule: a non-terminal
///   execution for the instance makes it fail with
///   [`BatchError::AlreadyRunning`]. That check-and-insert is the engine's
///   inter-launch mutual exclusion.
pub trait ExecutionRepository {
    /// Creates the instance for this job name + parameters combination.
    /// Fails with [`BatchError::DuplicateInstance`] if it already exists.
    fn create_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobInstance, BatchError>;

    fn find_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<Option<JobInstance>, BatchError>;

    /// Creates a new execution in `Starting` status, or fails with
    /// [`BatchError::AlreadyRunning`] when a non-terminal execution exists.
    fn create_job_execution(&self, instance: &JobInstance) -> Result<JobExecution, BatchError>;

    fn update_job_execution(&self, execution: &JobExecution) -> Result<(), BatchError>;

    /// The most recently created execution of this instance, if any.
    fn find_last_job_execution(
        &self,
        instance: &JobInstance,
    ) -> Result<Option<JobExecution>, BatchError>;

    fn create_step_execution(
        &self,
        execution: &JobExecution,
        step_name: &str,
    ) -> Result<StepExecution, BatchError>;

    fn update_step_execution(&self, step: &StepExecution) -> Result<(), BatchError>;

    /// The most recently created execution of this step across every
    /// execution of the instance, if any. Drives run/skip/resume decisions.
    fn find_last_step_execution(
        &self,
        instance: &JobInstance,
        step_name: &str,
    ) -> Result<Option<StepExecution>, BatchError>;
}
