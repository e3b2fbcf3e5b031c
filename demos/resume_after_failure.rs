//! Demonstrates the restart guarantee: a job fails partway through, then a
//! second launch with the same parameters resumes from the last committed
//! chunk instead of re-processing from scratch.
//!
//! Run with:
//! `cargo run --example resume_after_failure`

use std::cell::Cell;
use std::sync::{Arc, Mutex};

use batchkit::core::context::ExecutionContext;
use batchkit::core::item::{
    ItemReader, ItemReaderResult, ItemWriter, ItemWriterResult, PassthroughProcessor,
};
use batchkit::core::job::JobBuilder;
use batchkit::core::launcher::JobLauncher;
use batchkit::core::parameters::JobParametersBuilder;
use batchkit::core::repository::memory::InMemoryRepository;
use batchkit::core::step::StepBuilder;
use batchkit::error::{BatchError, ItemError};

/// Reader over a fixed range, resumable through a position checkpoint.
struct RangeReader {
    upto: u64,
    position: Cell<u64>,
}

impl RangeReader {
    fn new(upto: u64) -> Self {
        Self {
            upto,
            position: Cell::new(0),
        }
    }
}

impl ItemReader<u64> for RangeReader {
    fn open(&self, ctx: &ExecutionContext) -> Result<(), BatchError> {
        if let Some(saved) = ctx.get_u64("range.reader.position") {
            self.position.set(saved);
        }
        Ok(())
    }

    fn read(&self) -> ItemReaderResult<u64> {
        let next = self.position.get() + 1;
        if next > self.upto {
            return Ok(None);
        }
        self.position.set(next);
        Ok(Some(next))
    }

    fn update_context(&self, ctx: &mut ExecutionContext) -> Result<(), BatchError> {
        ctx.put("range.reader.position", self.position.get());
        Ok(())
    }
}

/// Writer that refuses one poisoned item until told otherwise.
struct PickyWriter {
    applied: Arc<Mutex<Vec<u64>>>,
    poisoned: Option<u64>,
}

impl ItemWriter<u64> for PickyWriter {
    fn write(&self, items: &[u64]) -> ItemWriterResult {
        if let Some(poisoned) = self.poisoned
            && items.contains(&poisoned)
        {
            return Err(BatchError::ItemWrite(ItemError::new(
                "poisoned",
                format!("cannot apply item {poisoned}"),
            )));
        }
        self.applied.lock().unwrap().extend_from_slice(items);
        Ok(())
    }
}

fn main() -> Result<(), BatchError> {
    env_logger::init();

    let repository = Arc::new(InMemoryRepository::new());
    let launcher = JobLauncher::new(repository.clone());
    let parameters = JobParametersBuilder::new().long("cycle", 7).build();
    let applied = Arc::new(Mutex::new(Vec::new()));

    // First attempt: item 7 cannot be written, the step fails after
    // committing the first two chunks.
    {
        let reader = RangeReader::new(10);
        let processor = PassthroughProcessor;
        let writer = PickyWriter {
            applied: applied.clone(),
            poisoned: Some(7),
        };
        let step = StepBuilder::new("apply-range")
            .chunk(3)
            .reader(&reader)
            .processor(&processor)
            .writer(&writer)
            .build();
        let job = JobBuilder::new().name("range-job").start(&step).build();

        let execution = launcher.launch(&job, &parameters)?;
        println!(
            "first attempt: {} ({} items applied)",
            execution.status,
            applied.lock().unwrap().len()
        );
    }

    // Second attempt with the same parameters: the engine resumes from the
    // checkpoint, so items 1..=6 are not re-applied.
    {
        let reader = RangeReader::new(10);
        let processor = PassthroughProcessor;
        let writer = PickyWriter {
            applied: applied.clone(),
            poisoned: None,
        };
        let step = StepBuilder::new("apply-range")
            .chunk(3)
            .reader(&reader)
            .processor(&processor)
            .writer(&writer)
            .build();
        let job = JobBuilder::new().name("range-job").start(&step).build();

        let execution = launcher.launch(&job, &parameters)?;
        println!(
            "second attempt: {} ({} items applied in total)",
            execution.status,
            applied.lock().unwrap().len()
        );
    }

    assert_eq!(*applied.lock().unwrap(), (1..=10).collect::<Vec<u64>>());
    println!("every item applied exactly once");

    Ok(())
}
