use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use time::OffsetDateTime;

use crate::core::chunk::{Chunk, ChunkStatus};
use crate::core::item::{ItemProcessor, ItemReader, ItemWriter};
use crate::core::policy::{RetryPolicy, SkipPolicy};
use crate::core::repository::{BatchStatus, ExecutionRepository, StepExecution};
use crate::error::BatchError;

/// Cooperative stop flag shared between a launch and its requester.
///
/// The flag is observed between chunk boundaries (and between tasklet
/// repeats), never mid-chunk: the in-flight chunk is allowed to complete or
/// fail normally, then the step and job transition to `Stopped`.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One stage of a job.
///
/// Implementations run themselves to completion or failure, maintain the
/// counters on their [`StepExecution`], and persist every status transition
/// and chunk commit through the repository.
pub trait Step {
    fn name(&self) -> &str;

    /// A failed optional step does not abort the remaining job sequence.
    fn is_optional(&self) -> bool {
        false
    }

    /// Re-run this step even when a prior execution already completed.
    fn allow_start_if_complete(&self) -> bool {
        false
    }

    /// Executes the step.
    ///
    /// # Returns
    /// - `Ok(())` when the execution ends `Completed` or `Stopped`
    /// - `Err(BatchError::StepFailed)` when the execution ends `Failed`
    /// - `Err(BatchError::Repository)` on a persistence failure
    fn execute(
        &self,
        execution: &mut StepExecution,
        repository: &dyn ExecutionRepository,
        stop: &StopSignal,
    ) -> Result<(), BatchError>;
}

enum StepOutcome {
    Completed,
    Stopped,
}

/// Records the terminal status, stamps the end time and persists the record.
///
/// Failures other than repository errors are surfaced as `StepFailed` so the
/// job executor sees one uniform error shape per failed step.
fn finalize(
    name: &str,
    execution: &mut StepExecution,
    repository: &dyn ExecutionRepository,
    outcome: Result<StepOutcome, BatchError>,
) -> Result<(), BatchError> {
    execution.end_time = Some(OffsetDateTime::now_utc());

    match outcome {
        Ok(StepOutcome::Completed) => {
            execution.status = BatchStatus::Completed;
            repository.update_step_execution(execution)?;
            info!("End of step: {}, status: {}", name, execution.status);
            Ok(())
        }
        Ok(StepOutcome::Stopped) => {
            execution.status = BatchStatus::Stopped;
            execution.exit_description = Some("stop requested".to_string());
            repository.update_step_execution(execution)?;
            info!("End of step: {}, status: {}", name, execution.status);
            Ok(())
        }
        Err(err) => {
            if execution.status == BatchStatus::Started {
                // The in-flight chunk's transaction is rolled back; chunks
                // committed earlier in this step remain committed.
                execution.rollback_count += 1;
            }
            execution.status = BatchStatus::Failed;
            execution.exit_description = Some(err.to_string());
            repository.update_step_execution(execution)?;
            error!("End of step: {}, status: {}: {}", name, execution.status, err);
            match err {
                BatchError::Repository(_) => Err(err),
                _ => Err(BatchError::StepFailed(name.to_string(), err.to_string())),
            }
        }
    }
}

/// Chunk-oriented step: reads items one at a time, batches them into
/// fixed-size chunks, processes each item, and writes every chunk as one
/// transaction.
///
/// Each successful chunk ends with a commit: the writer is flushed, the
/// reader records its checkpoint into the execution context, counters are
/// updated and the [`StepExecution`] is persisted before the next chunk
/// begins reading. The committed chunk boundary is therefore the unit of
/// restart.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    reader: &'a dyn ItemReader<I>,
    processor: &'a dyn ItemProcessor<I, O>,
    writer: &'a dyn ItemWriter<O>,
    chunk_size: usize,
    retry_policy: RetryPolicy,
    skip_policy: SkipPolicy,
    optional: bool,
    allow_start_if_complete: bool,
}

impl<I, O> Step for ChunkOrientedStep<'_, I, O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn allow_start_if_complete(&self) -> bool {
        self.allow_start_if_complete
    }

    fn execute(
        &self,
        execution: &mut StepExecution,
        repository: &dyn ExecutionRepository,
        stop: &StopSignal,
    ) -> Result<(), BatchError> {
        info!("Start of step: {}, execution: {}", self.name, execution.id);
        execution.status = BatchStatus::Starting;
        execution.start_time = Some(OffsetDateTime::now_utc());
        repository.update_step_execution(execution)?;

        let outcome = self.try_execute(execution, repository, stop);

        finalize(&self.name, execution, repository, outcome)
    }
}

impl<I, O> ChunkOrientedStep<'_, I, O> {
    fn try_execute(
        &self,
        execution: &mut StepExecution,
        repository: &dyn ExecutionRepository,
        stop: &StopSignal,
    ) -> Result<StepOutcome, BatchError> {
        // The reader seeks to the checkpoint saved by the last committed
        // chunk of a prior execution, if any.
        self.reader.open(&execution.context)?;
        self.writer.open()?;

        execution.status = BatchStatus::Started;
        repository.update_step_execution(execution)?;

        let result = self.drive_chunks(execution, repository, stop);

        Self::manage_close(self.reader.close());
        Self::manage_close(self.writer.close());

        result
    }

    fn drive_chunks(
        &self,
        execution: &mut StepExecution,
        repository: &dyn ExecutionRepository,
        stop: &StopSignal,
    ) -> Result<StepOutcome, BatchError> {
        let mut skips: HashMap<String, u32> = HashMap::new();

        loop {
            if stop.is_stopped() {
                return Ok(StepOutcome::Stopped);
            }

            let chunk = self.read_chunk(execution, &mut skips)?;

            // End of input on a chunk boundary: nothing left to commit.
            if chunk.is_empty() {
                return Ok(StepOutcome::Completed);
            }

            let outputs = self.process_chunk(execution, chunk.items(), &mut skips)?;
            let written = self.write_chunk(execution, &outputs, &mut skips)?;
            self.commit_chunk(execution, repository, written)?;

            if chunk.status() == ChunkStatus::Finished {
                return Ok(StepOutcome::Completed);
            }
        }
    }

    fn read_chunk(
        &self,
        execution: &mut StepExecution,
        skips: &mut HashMap<String, u32>,
    ) -> Result<Chunk<I>, BatchError> {
        debug!("Start reading chunk");
        let mut chunk = Chunk::new(self.chunk_size);

        while chunk.status() == ChunkStatus::Continuable {
            match self.reader.read() {
                Ok(Some(item)) => {
                    execution.read_count += 1;
                    chunk.push(item);
                }
                Ok(None) => chunk.finish(),
                Err(error) => {
                    // A failed read consumed the source record, so there is
                    // nothing to re-attempt; resolve via the skip policy.
                    warn!("Error reading item: {error}");
                    if !self.try_skip(execution, skips, &error) {
                        return Err(error);
                    }
                }
            }
        }

        debug!("End reading chunk: {:?}, {} items", chunk.status(), chunk.len());
        Ok(chunk)
    }

    fn process_chunk(
        &self,
        execution: &mut StepExecution,
        items: &[I],
        skips: &mut HashMap<String, u32>,
    ) -> Result<Vec<O>, BatchError> {
        debug!("Processing chunk of {} items", items.len());
        let mut outputs = Vec::with_capacity(items.len());

        for item in items {
            let mut attempts = 0u32;
            loop {
                match self.processor.process(item) {
                    Ok(Some(output)) => {
                        outputs.push(output);
                        break;
                    }
                    Ok(None) => {
                        // Filtered out: dropped silently, not a failure.
                        execution.filter_count += 1;
                        break;
                    }
                    Err(error) => {
                        attempts += 1;
                        warn!("Error processing item (attempt {attempts}): {error}");
                        if let Some(item_error) = error.item_error()
                            && self.retry_policy.should_retry(item_error, attempts)
                        {
                            continue;
                        }
                        if self.try_skip(execution, skips, &error) {
                            break;
                        }
                        return Err(error);
                    }
                }
            }
        }

        Ok(outputs)
    }

    /// Writes the chunk, falling back to an item-by-item scan when the bulk
    /// write fails. The writer's transactional contract means the failed
    /// bulk call applied nothing, so every item can be re-attempted as its
    /// own single-item write with the retry/skip policies deciding each one.
    ///
    /// Returns the number of items actually applied.
    fn write_chunk(
        &self,
        execution: &mut StepExecution,
        items: &[O],
        skips: &mut HashMap<String, u32>,
    ) -> Result<usize, BatchError> {
        if items.is_empty() {
            debug!("No items to write, skipping write call");
            return Ok(0);
        }

        debug!("Writing chunk of {} items", items.len());
        match self.writer.write(items) {
            Ok(()) => Ok(items.len()),
            Err(error) => {
                warn!("Chunk write failed, re-writing item by item: {error}");
                let mut written = 0;
                for item in items {
                    if self.write_single(execution, item, skips)? {
                        written += 1;
                    }
                }
                Ok(written)
            }
        }
    }

    fn write_single(
        &self,
        execution: &mut StepExecution,
        item: &O,
        skips: &mut HashMap<String, u32>,
    ) -> Result<bool, BatchError> {
        let mut attempts = 0u32;
        loop {
            match self.writer.write(std::slice::from_ref(item)) {
                Ok(()) => return Ok(true),
                Err(error) => {
                    attempts += 1;
                    warn!("Error writing item (attempt {attempts}): {error}");
                    if let Some(item_error) = error.item_error()
                        && self.retry_policy.should_retry(item_error, attempts)
                    {
                        continue;
                    }
                    if self.try_skip(execution, skips, &error) {
                        return Ok(false);
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Commits the chunk: flush the writer, let the reader record its
    /// checkpoint, then persist counters and context so the next chunk only
    /// starts reading once this one is durable.
    fn commit_chunk(
        &self,
        execution: &mut StepExecution,
        repository: &dyn ExecutionRepository,
        written: usize,
    ) -> Result<(), BatchError> {
        self.writer.flush()?;
        self.reader.update_context(&mut execution.context)?;
        execution.write_count += written;
        execution.commit_count += 1;
        repository.update_step_execution(execution)?;
        debug!(
            "Chunk committed: read={}, written={}, commits={}",
            execution.read_count, execution.write_count, execution.commit_count
        );
        Ok(())
    }

    /// Applies the skip policy to a failed item. Returns `true` when the
    /// item was dropped and processing may continue.
    fn try_skip(
        &self,
        execution: &mut StepExecution,
        skips: &mut HashMap<String, u32>,
        error: &BatchError,
    ) -> bool {
        let Some(item_error) = error.item_error() else {
            return false;
        };
        let skipped = skips.get(item_error.kind()).copied().unwrap_or(0);
        if self.skip_policy.may_skip(item_error, skipped) {
            skips.insert(item_error.kind().to_string(), skipped + 1);
            execution.skip_count += 1;
            warn!(
                "Skipping item ({} skipped for kind '{}'): {}",
                skipped + 1,
                item_error.kind(),
                item_error.message()
            );
            true
        } else {
            false
        }
    }

    fn manage_close(result: Result<(), BatchError>) {
        if let Err(error) = result {
            warn!("Non-fatal error on close: {error}");
        }
    }
}

/// Outcome of one tasklet invocation.
pub enum RepeatStatus {
    /// The tasklet wants to be invoked again.
    Continuable,
    /// The tasklet has finished its work.
    Finished,
}

/// A single opaque unit of work for non-chunked steps.
///
/// The tasklet is invoked repeatedly until it reports
/// [`RepeatStatus::Finished`]; each invocation is committed separately and
/// the stop flag is honored between invocations.
pub trait Tasklet {
    fn execute(&self, execution: &mut StepExecution) -> Result<RepeatStatus, BatchError>;
}

/// Step wrapping a [`Tasklet`].
pub struct TaskletStep<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
    optional: bool,
    allow_start_if_complete: bool,
}

impl Step for TaskletStep<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    fn allow_start_if_complete(&self) -> bool {
        self.allow_start_if_complete
    }

    fn execute(
        &self,
        execution: &mut StepExecution,
        repository: &dyn ExecutionRepository,
        stop: &StopSignal,
    ) -> Result<(), BatchError> {
        info!("Start of step: {}, execution: {}", self.name, execution.id);
        execution.status = BatchStatus::Starting;
        execution.start_time = Some(OffsetDateTime::now_utc());
        repository.update_step_execution(execution)?;

        execution.status = BatchStatus::Started;
        repository.update_step_execution(execution)?;

        let outcome = loop {
            if stop.is_stopped() {
                break Ok(StepOutcome::Stopped);
            }
            match self.tasklet.execute(execution) {
                Ok(repeat) => {
                    execution.commit_count += 1;
                    if let Err(err) = repository.update_step_execution(execution) {
                        break Err(err);
                    }
                    if matches!(repeat, RepeatStatus::Finished) {
                        break Ok(StepOutcome::Completed);
                    }
                }
                Err(err) => break Err(err),
            }
        };

        finalize(&self.name, execution, repository, outcome)
    }
}

/// Entry point of the step builder family.
///
/// `StepBuilder::new("compute").chunk(10)` starts a chunk-oriented step;
/// `StepBuilder::new("cleanup").tasklet(&t)` starts a tasklet step.
pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn chunk<'a, I, O>(self, chunk_size: usize) -> ChunkOrientedStepBuilder<'a, I, O> {
        ChunkOrientedStepBuilder::new(&self.name).chunk_size(chunk_size)
    }

    pub fn tasklet<'a>(self, tasklet: &'a dyn Tasklet) -> TaskletStepBuilder<'a> {
        TaskletStepBuilder::new(&self.name, tasklet)
    }
}

pub struct ChunkOrientedStepBuilder<'a, I, O> {
    name: String,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a dyn ItemProcessor<I, O>>,
    writer: Option<&'a dyn ItemWriter<O>>,
    chunk_size: usize,
    retry_policy: RetryPolicy,
    skip_policy: SkipPolicy,
    optional: bool,
    allow_start_if_complete: bool,
}

impl<'a, I, O> ChunkOrientedStepBuilder<'a, I, O> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reader: None,
            processor: None,
            writer: None,
            chunk_size: 10,
            retry_policy: RetryPolicy::default(),
            skip_policy: SkipPolicy::default(),
            optional: false,
            allow_start_if_complete: false,
        }
    }

    pub fn reader(mut self, reader: &'a dyn ItemReader<I>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a dyn ItemProcessor<I, O>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a dyn ItemWriter<O>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn skip_policy(mut self, skip_policy: SkipPolicy) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    pub fn optional(mut self, yes: bool) -> Self {
        self.optional = yes;
        self
    }

    pub fn allow_start_if_complete(mut self, yes: bool) -> Self {
        self.allow_start_if_complete = yes;
        self
    }

    pub fn build(self) -> ChunkOrientedStep<'a, I, O> {
        assert!(self.chunk_size > 0, "Chunk size must be at least 1");
        ChunkOrientedStep {
            name: self.name,
            reader: self.reader.expect("Reader is required for building a step"),
            processor: self
                .processor
                .expect("Processor is required for building a step"),
            writer: self.writer.expect("Writer is required for building a step"),
            chunk_size: self.chunk_size,
            retry_policy: self.retry_policy,
            skip_policy: self.skip_policy,
            optional: self.optional,
            allow_start_if_complete: self.allow_start_if_complete,
        }
    }
}

pub struct TaskletStepBuilder<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
    optional: bool,
    allow_start_if_complete: bool,
}

impl<'a> TaskletStepBuilder<'a> {
    pub fn new(name: &str, tasklet: &'a dyn Tasklet) -> Self {
        Self {
            name: name.to_string(),
            tasklet,
            optional: false,
            allow_start_if_complete: false,
        }
    }

    pub fn optional(mut self, yes: bool) -> Self {
        self.optional = yes;
        self
    }

    pub fn allow_start_if_complete(mut self, yes: bool) -> Self {
        self.allow_start_if_complete = yes;
        self
    }

    pub fn build(self) -> TaskletStep<'a> {
        TaskletStep {
            name: self.name,
            tasklet: self.tasklet,
            optional: self.optional,
            allow_start_if_complete: self.allow_start_if_complete,
        }
    }
}
