#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Batchkit

 A restartable, chunk-oriented batch execution engine. Batchkit runs long,
 multi-step data-processing jobs (a billing run, a nightly export) to
 completion, tracks progress durably in an execution repository, and resumes
 a failed job from the last committed chunk instead of from scratch.

 ## Core Concepts

 - **Job:** a named, ordered sequence of steps executed as one logical unit
   of work. Built with [`core::job::JobBuilder`].
 - **Step:** one stage of a job, either chunk-oriented
   (reader/processor/writer) or a single-unit-of-work tasklet. Built with
   [`core::step::StepBuilder`].
 - **Chunk:** a fixed-size batch of items processed and committed as one
   transaction. The committed chunk boundary is the unit of restart.
 - **JobInstance / JobExecution / StepExecution:** the persisted identity of
   a job + parameters combination, and one run attempt of a job / step
   respectively. Stored in an [`core::repository::ExecutionRepository`].
 - **ExecutionContext:** checkpoint state saved at each chunk commit; a
   reader seeks to its saved position on restart.
 - **Skip / Retry policies:** per-step rules mapping item-failure kinds to
   drop-and-continue or re-attempt behavior.

 ## Features

 The item connectors are optional:

 | **Feature** | **Description**                                        |
 |-------------|--------------------------------------------------------|
 | csv         | CSV `ItemReader` and `ItemWriter`, position-checkpointed |
 | json        | JSON Lines `ItemReader` and `ItemWriter`               |
 | logger      | A logging `ItemWriter`, useful for debugging           |
 | full        | Enables all of the above                               |

 ## Restart semantics

 Launching a job with parameters it has already seen resolves to the same
 job instance. While an execution of that instance is running, a second
 launch is refused with `AlreadyRunning`; once an execution has failed or
 been stopped, the next launch creates a new execution that skips steps
 already completed and resumes interrupted steps from their saved
 checkpoint. A fully completed instance cannot be launched again
 (`DuplicateInstance`); run it with different parameters instead.

 ## Getting Started

```rust
# use std::cell::Cell;
# use std::sync::{Arc, Mutex};
# use batchkit::core::item::{
#     ItemProcessor, ItemProcessorResult, ItemReader, ItemReaderResult, ItemWriter,
#     ItemWriterResult,
# };
use batchkit::core::job::JobBuilder;
use batchkit::core::launcher::JobLauncher;
use batchkit::core::parameters::JobParametersBuilder;
use batchkit::core::repository::{BatchStatus, memory::InMemoryRepository};
use batchkit::core::step::StepBuilder;
use batchkit::error::BatchError;

# struct LineReader {
#     lines: Vec<String>,
#     position: Cell<usize>,
# }
# impl ItemReader<String> for LineReader {
#     fn read(&self) -> ItemReaderResult<String> {
#         let i = self.position.get();
#         if i < self.lines.len() {
#             self.position.set(i + 1);
#             Ok(Some(self.lines[i].clone()))
#         } else {
#             Ok(None)
#         }
#     }
# }
# struct UppercaseProcessor;
# impl ItemProcessor<String, String> for UppercaseProcessor {
#     fn process(&self, item: &String) -> ItemProcessorResult<String> {
#         Ok(Some(item.to_uppercase()))
#     }
# }
# struct CollectingWriter {
#     sink: Arc<Mutex<Vec<String>>>,
# }
# impl ItemWriter<String> for CollectingWriter {
#     fn write(&self, items: &[String]) -> ItemWriterResult {
#         self.sink.lock().unwrap().extend_from_slice(items);
#         Ok(())
#     }
# }
fn main() -> Result<(), BatchError> {
    let reader = LineReader {
        lines: vec!["a".into(), "b".into(), "c".into()],
        position: Cell::new(0),
    };
    let processor = UppercaseProcessor;
    let sink = Arc::new(Mutex::new(Vec::new()));
    let writer = CollectingWriter { sink: sink.clone() };

    let step = StepBuilder::new("uppercase")
        .chunk(2) // commit interval
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();

    let job = JobBuilder::new().name("copy-lines").start(&step).build();
    let parameters = JobParametersBuilder::new().string("run", "2024-07-01").build();

    let launcher = JobLauncher::new(Arc::new(InMemoryRepository::new()));
    let execution = launcher.launch(&job, &parameters)?;

    assert_eq!(execution.status, BatchStatus::Completed);
    assert_eq!(sink.lock().unwrap().as_slice(), ["A", "B", "C"]);
    Ok(())
}
```
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of item readers / writers (for example: csv reader and writer)
pub mod item;
