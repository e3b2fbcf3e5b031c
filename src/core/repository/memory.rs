use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use uuid::Uuid;

use crate::core::context::ExecutionContext;
use crate::core::parameters::JobParameters;
use crate::core::repository::{
    BatchStatus, ExecutionRepository, JobExecution, JobInstance, StepExecution,
};
use crate::error::BatchError;

#[derive(Default)]
struct Store {
    // Vec order doubles as creation order for the find_last_* queries.
    instances: Vec<JobInstance>,
    job_executions: Vec<JobExecution>,
    step_executions: Vec<StepExecution>,
}

/// In-memory [`ExecutionRepository`].
///
/// Suitable for tests and single-process runs that do not need persistence
/// across process restarts. A `RwLock` gives concurrent readers and
/// serialized writes; the check-and-insert in `create_job_execution` runs
/// under one write lock, which makes the single-running-execution rule
/// atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, BatchError> {
        self.store
            .read()
            .map_err(|_| BatchError::Repository("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, BatchError> {
        self.store
            .write()
            .map_err(|_| BatchError::Repository("store lock poisoned".to_string()))
    }
}

impl ExecutionRepository for InMemoryRepository {
    fn create_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<JobInstance, BatchError> {
        let mut store = self.write()?;
        let identity = parameters.identity();

        if store
            .instances
            .iter()
            .any(|i| i.job_name == job_name && i.parameters.identity() == identity)
        {
            return Err(BatchError::DuplicateInstance(format!(
                "{job_name} [{identity}]"
            )));
        }

        let instance = JobInstance {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            parameters: parameters.clone(),
        };
        debug!("Created job instance {} for {}", instance.id, job_name);
        store.instances.push(instance.clone());
        Ok(instance)
    }

    fn find_job_instance(
        &self,
        job_name: &str,
        parameters: &JobParameters,
    ) -> Result<Option<JobInstance>, BatchError> {
        let store = self.read()?;
        let identity = parameters.identity();
        Ok(store
            .instances
            .iter()
            .find(|i| i.job_name == job_name && i.parameters.identity() == identity)
            .cloned())
    }

    fn create_job_execution(&self, instance: &JobInstance) -> Result<JobExecution, BatchError> {
        let mut store = self.write()?;

        if store
            .job_executions
            .iter()
            .any(|e| e.instance_id == instance.id && e.status.is_running())
        {
            return Err(BatchError::AlreadyRunning(instance.job_name.clone()));
        }

        let execution = JobExecution {
            id: Uuid::new_v4(),
            instance_id: instance.id,
            status: BatchStatus::Starting,
            start_time: None,
            end_time: None,
            exit_description: None,
            context: ExecutionContext::new(),
        };
        debug!(
            "Created job execution {} for instance {}",
            execution.id, instance.id
        );
        store.job_executions.push(execution.clone());
        Ok(execution)
    }

    fn update_job_execution(&self, execution: &JobExecution) -> Result<(), BatchError> {
        let mut store = self.write()?;
        match store
            .job_executions
            .iter_mut()
            .find(|e| e.id == execution.id)
        {
            Some(slot) => {
                *slot = execution.clone();
                Ok(())
            }
            None => Err(BatchError::Repository(format!(
                "unknown job execution: {}",
                execution.id
            ))),
        }
    }

    fn find_last_job_execution(
        &self,
        instance: &JobInstance,
    ) -> Result<Option<JobExecution>, BatchError> {
        let store = self.read()?;
        Ok(store
            .job_executions
            .iter()
            .rev()
            .find(|e| e.instance_id == instance.id)
            .cloned())
    }

    fn create_step_execution(
        &self,
        execution: &JobExecution,
        step_name: &str,
    ) -> Result<StepExecution, BatchError> {
        let mut store = self.write()?;
        let step = StepExecution {
            id: Uuid::new_v4(),
            job_execution_id: execution.id,
            step_name: step_name.to_string(),
            status: BatchStatus::Starting,
            start_time: None,
            end_time: None,
            read_count: 0,
            write_count: 0,
            filter_count: 0,
            skip_count: 0,
            commit_count: 0,
            rollback_count: 0,
            exit_description: None,
            context: ExecutionContext::new(),
        };
        store.step_executions.push(step.clone());
        Ok(step)
    }

    fn update_step_execution(&self, step: &StepExecution) -> Result<(), BatchError> {
        let mut store = self.write()?;
        match store.step_executions.iter_mut().find(|s| s.id == step.id) {
            Some(slot) => {
                *slot = step.clone();
                Ok(())
            }
            None => Err(BatchError::Repository(format!(
                "unknown step execution: {}",
                step.id
            ))),
        }
    }

    fn find_last_step_execution(
        &self,
        instance: &JobInstance,
        step_name: &str,
    ) -> Result<Option<StepExecution>, BatchError> {
        let store = self.read()?;
        let execution_ids: Vec<Uuid> = store
            .job_executions
            .iter()
            .filter(|e| e.instance_id == instance.id)
            .map(|e| e.id)
            .collect();

        Ok(store
            .step_executions
            .iter()
            .rev()
            .find(|s| s.step_name == step_name && execution_ids.contains(&s.job_execution_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRepository;
    use crate::core::parameters::JobParametersBuilder;
    use crate::core::repository::{BatchStatus, ExecutionRepository};
    use crate::error::BatchError;

    #[test]
    fn second_instance_with_identical_parameters_is_rejected() {
        let repository = InMemoryRepository::new();
        let params = JobParametersBuilder::new().long("cycle", 3).build();

        repository.create_job_instance("billing", &params).unwrap();
        let duplicate = repository.create_job_instance("billing", &params);

        assert!(matches!(duplicate, Err(BatchError::DuplicateInstance(_))));

        // Same parameters under another job name are a distinct instance.
        repository.create_job_instance("settlement", &params).unwrap();
    }

    #[test]
    fn non_terminal_execution_locks_the_instance() {
        let repository = InMemoryRepository::new();
        let params = JobParametersBuilder::new().string("region", "emea").build();
        let instance = repository.create_job_instance("billing", &params).unwrap();

        let mut first = repository.create_job_execution(&instance).unwrap();
        let second = repository.create_job_execution(&instance);
        assert!(matches!(second, Err(BatchError::AlreadyRunning(_))));

        first.status = BatchStatus::Failed;
        repository.update_job_execution(&first).unwrap();

        // Terminal status releases the lock; a restart may proceed.
        repository.create_job_execution(&instance).unwrap();
    }

    #[test]
    fn find_last_step_execution_spans_all_executions_of_the_instance() {
        let repository = InMemoryRepository::new();
        let params = JobParametersBuilder::new().build();
        let instance = repository.create_job_instance("billing", &params).unwrap();

        let mut first = repository.create_job_execution(&instance).unwrap();
        let step_a = repository.create_step_execution(&first, "compute").unwrap();
        first.status = BatchStatus::Failed;
        repository.update_job_execution(&first).unwrap();

        let second = repository.create_job_execution(&instance).unwrap();
        let step_b = repository.create_step_execution(&second, "compute").unwrap();

        let last = repository
            .find_last_step_execution(&instance, "compute")
            .unwrap()
            .unwrap();
        assert_eq!(last.id, step_b.id);
        assert_ne!(last.id, step_a.id);

        assert!(
            repository
                .find_last_step_execution(&instance, "report")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn updates_replace_the_stored_record() {
        let repository = InMemoryRepository::new();
        let params = JobParametersBuilder::new().build();
        let instance = repository.create_job_instance("billing", &params).unwrap();
        let execution = repository.create_job_execution(&instance).unwrap();
        let mut step = repository.create_step_execution(&execution, "compute").unwrap();

        step.read_count = 5;
        step.commit_count = 2;
        step.context.put("position", 5);
        repository.update_step_execution(&step).unwrap();

        let stored = repository
            .find_last_step_execution(&instance, "compute")
            .unwrap()
            .unwrap();
        assert_eq!(stored.read_count, 5);
        assert_eq!(stored.commit_count, 2);
        assert_eq!(stored.context.get_u64("position"), Some(5));
    }
}
