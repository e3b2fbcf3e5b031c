use std::collections::HashSet;
use std::sync::Arc;

use log::info;

use crate::core::job::{JobDefinition, JobExecutor};
use crate::core::parameters::JobParameters;
use crate::core::repository::{BatchStatus, ExecutionRepository, JobExecution, JobInstance};
use crate::core::step::StopSignal;
use crate::error::BatchError;

/// Entry point that starts a job execution for a given job definition and a
/// set of run parameters.
///
/// The launcher resolves (or creates) the [`JobInstance`] for the
/// name + parameters combination and creates a new [`JobExecution`] for it;
/// the repository rejects that creation with
/// [`BatchError::AlreadyRunning`] while a non-terminal execution exists, so
/// no two concurrent runs of the same instance are possible.
///
/// Execution is synchronous on the calling thread: one thread per job
/// execution, steps strictly sequential. Asynchronous launching is invoking
/// [`launch`](JobLauncher::launch) from a worker thread.
///
/// Restart goes through the same interface: launching parameters whose
/// instance has a non-`Completed` history resumes that instance, while a
/// fully completed instance is rejected with
/// [`BatchError::DuplicateInstance`].
pub struct JobLauncher {
    repository: Arc<dyn ExecutionRepository + Send + Sync>,
}

impl JobLauncher {
    pub fn new(repository: Arc<dyn ExecutionRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Launches the job and blocks until it reaches a terminal status.
    ///
    /// The returned [`JobExecution`] reflects the final status; callers must
    /// inspect it rather than expect success. `Err` is reserved for launch
    /// refusals (validation, duplicate, already running) and repository
    /// failures.
    pub fn launch(
        &self,
        definition: &JobDefinition<'_>,
        parameters: &JobParameters,
    ) -> Result<JobExecution, BatchError> {
        self.launch_with_signal(definition, parameters, StopSignal::new())
    }

    /// Same as [`launch`](JobLauncher::launch), with a caller-held stop
    /// signal. Setting the signal stops the run cooperatively at the next
    /// chunk or step boundary.
    pub fn launch_with_signal(
        &self,
        definition: &JobDefinition<'_>,
        parameters: &JobParameters,
        stop: StopSignal,
    ) -> Result<JobExecution, BatchError> {
        Self::validate(definition, parameters)?;

        let repository = self.repository.as_ref();
        let instance = self.resolve_instance(definition, parameters)?;
        let mut execution = repository.create_job_execution(&instance)?;

        info!(
            "Launching job: {}, instance: {}, execution: {}",
            definition.name(),
            instance.id,
            execution.id
        );

        let executor = JobExecutor::with_stop_signal(repository, stop);
        executor.execute(definition, &instance, &mut execution)?;

        Ok(execution)
    }

    fn resolve_instance(
        &self,
        definition: &JobDefinition<'_>,
        parameters: &JobParameters,
    ) -> Result<JobInstance, BatchError> {
        let repository = self.repository.as_ref();
        match repository.find_job_instance(definition.name(), parameters)? {
            Some(instance) => {
                if let Some(last) = repository.find_last_job_execution(&instance)?
                    && last.status == BatchStatus::Completed
                {
                    return Err(BatchError::DuplicateInstance(format!(
                        "{} [{}]",
                        definition.name(),
                        parameters.identity()
                    )));
                }
                info!(
                    "Found existing job instance {} for {}, restarting",
                    instance.id,
                    definition.name()
                );
                Ok(instance)
            }
            None => repository.create_job_instance(definition.name(), parameters),
        }
    }

    fn validate(
        definition: &JobDefinition<'_>,
        parameters: &JobParameters,
    ) -> Result<(), BatchError> {
        if definition.name().trim().is_empty() {
            return Err(BatchError::Validation("job name must not be empty".to_string()));
        }
        if definition.steps().is_empty() {
            return Err(BatchError::Validation(format!(
                "job '{}' has no steps",
                definition.name()
            )));
        }

        let mut names = HashSet::new();
        for step in definition.steps() {
            if !names.insert(step.name()) {
                return Err(BatchError::Validation(format!(
                    "job '{}' declares step '{}' more than once",
                    definition.name(),
                    step.name()
                )));
            }
        }

        for (name, _) in parameters.iter() {
            if name.trim().is_empty() {
                return Err(BatchError::Validation(
                    "job parameter names must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
