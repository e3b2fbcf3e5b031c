use log::{info, warn};
use time::OffsetDateTime;

use crate::core::repository::{
    BatchStatus, ExecutionRepository, JobExecution, JobInstance, StepExecution,
};
use crate::core::step::{Step, StopSignal};
use crate::error::BatchError;

use super::build_name;

/// A named, ordered sequence of steps executed as one logical unit of work.
///
/// Immutable once built. The definition carries no execution state; every
/// run is tracked as a [`JobExecution`] in the repository.
pub struct JobDefinition<'a> {
    name: String,
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobDefinition<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[&'a dyn Step] {
        &self.steps
    }
}

/// Builder for a [`JobDefinition`].
///
/// Steps are executed in the order they are added. If no name has been
/// provided, a random one is generated.
#[derive(Default)]
pub struct JobBuilder<'a> {
    name: Option<String>,
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> JobBuilder<'a> {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the first step of the job. Semantically identical to `next()`.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> JobDefinition<'a> {
        JobDefinition {
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
        }
    }
}

/// What the executor decided to do with a step, given its history.
enum StepDisposition {
    RunFresh,
    SkipCompleted,
    Resume(StepExecution),
}

/// Sequences a job's steps, deciding per step whether to run, skip or
/// resume based on prior execution history, and finalizes the job status.
///
/// The executor never interprets step business semantics; it only reads
/// [`StepExecution`] status.
pub struct JobExecutor<'a> {
    repository: &'a dyn ExecutionRepository,
    stop: StopSignal,
}

impl<'a> JobExecutor<'a> {
    pub fn new(repository: &'a dyn ExecutionRepository) -> Self {
        Self {
            repository,
            stop: StopSignal::new(),
        }
    }

    pub fn with_stop_signal(repository: &'a dyn ExecutionRepository, stop: StopSignal) -> Self {
        Self { repository, stop }
    }

    /// Runs the job's steps in sequence, updating `execution` in place.
    ///
    /// Step failures are absorbed into the job status (`Failed` plus an exit
    /// description); only repository failures propagate as errors.
    pub fn execute(
        &self,
        definition: &JobDefinition<'_>,
        instance: &JobInstance,
        execution: &mut JobExecution,
    ) -> Result<(), BatchError> {
        execution.status = BatchStatus::Started;
        execution.start_time = Some(OffsetDateTime::now_utc());
        self.repository.update_job_execution(execution)?;

        info!(
            "Start of job: {}, execution: {}",
            definition.name(),
            execution.id
        );

        for step in definition.steps() {
            if self.stop.is_stopped() {
                return self.finalize(
                    definition,
                    execution,
                    BatchStatus::Stopped,
                    Some("stop requested".to_string()),
                );
            }

            let disposition = self.disposition_for(instance, *step)?;

            let mut step_execution = match disposition {
                StepDisposition::SkipCompleted => {
                    info!(
                        "Step {} already completed, not re-running",
                        step.name()
                    );
                    continue;
                }
                StepDisposition::RunFresh => {
                    self.repository.create_step_execution(execution, step.name())?
                }
                StepDisposition::Resume(prior) => {
                    let mut fresh =
                        self.repository.create_step_execution(execution, step.name())?;
                    if !prior.context.is_empty() {
                        // Seed the checkpoint so the reader resumes from the
                        // last committed chunk boundary.
                        fresh.context = prior.context.clone();
                        self.repository.update_step_execution(&fresh)?;
                        info!(
                            "Resuming step {} from prior execution {}",
                            step.name(),
                            prior.id
                        );
                    }
                    fresh
                }
            };

            let result = step.execute(&mut step_execution, self.repository, &self.stop);

            match result {
                Ok(()) if step_execution.status == BatchStatus::Stopped => {
                    return self.finalize(
                        definition,
                        execution,
                        BatchStatus::Stopped,
                        step_execution.exit_description.clone(),
                    );
                }
                Ok(()) => {}
                Err(err @ BatchError::Repository(_)) => {
                    // Best effort: the repository is already failing, but the
                    // record should be terminal if the update goes through.
                    let _ = self.finalize(
                        definition,
                        execution,
                        BatchStatus::Failed,
                        Some(err.to_string()),
                    );
                    return Err(err);
                }
                Err(err) => {
                    if step.is_optional() {
                        warn!(
                            "Optional step {} failed, continuing: {}",
                            step.name(),
                            err
                        );
                        continue;
                    }
                    return self.finalize(
                        definition,
                        execution,
                        BatchStatus::Failed,
                        Some(err.to_string()),
                    );
                }
            }
        }

        self.finalize(definition, execution, BatchStatus::Completed, None)
    }

    fn disposition_for(
        &self,
        instance: &JobInstance,
        step: &dyn Step,
    ) -> Result<StepDisposition, BatchError> {
        match self.repository.find_last_step_execution(instance, step.name())? {
            None => Ok(StepDisposition::RunFresh),
            Some(prior) if prior.status == BatchStatus::Completed => {
                if step.allow_start_if_complete() {
                    Ok(StepDisposition::RunFresh)
                } else {
                    Ok(StepDisposition::SkipCompleted)
                }
            }
            Some(prior) => Ok(StepDisposition::Resume(prior)),
        }
    }

    fn finalize(
        &self,
        definition: &JobDefinition<'_>,
        execution: &mut JobExecution,
        status: BatchStatus,
        exit_description: Option<String>,
    ) -> Result<(), BatchError> {
        execution.status = status;
        execution.end_time = Some(OffsetDateTime::now_utc());
        execution.exit_description = exit_description;
        self.repository.update_job_execution(execution)?;

        info!(
            "End of job: {}, execution: {}, status: {}",
            definition.name(),
            execution.id,
            execution.status
        );
        Ok(())
    }
}
