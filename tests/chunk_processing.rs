mod common;

use std::sync::Arc;

use common::{DroppingProcessor, RecordingWriter, VecReader, init_logger};

use batchkit::core::item::PassthroughProcessor;
use batchkit::core::job::JobBuilder;
use batchkit::core::launcher::JobLauncher;
use batchkit::core::parameters::{JobParameters, JobParametersBuilder};
use batchkit::core::repository::memory::InMemoryRepository;
use batchkit::core::repository::{BatchStatus, ExecutionRepository, StepExecution};
use batchkit::core::step::StepBuilder;

fn parameters(cycle: i64) -> JobParameters {
    JobParametersBuilder::new().long("cycle", cycle).build()
}

fn step_execution(
    repository: &InMemoryRepository,
    job_name: &str,
    parameters: &JobParameters,
    step_name: &str,
) -> StepExecution {
    let instance = repository
        .find_job_instance(job_name, parameters)
        .unwrap()
        .unwrap();
    repository
        .find_last_step_execution(&instance, step_name)
        .unwrap()
        .unwrap()
}

#[test]
fn billing_job_commits_in_fixed_size_chunks() {
    init_logger();

    let reader = VecReader::new(vec!["A", "B", "C", "D", "E"]);
    let processor = PassthroughProcessor;
    let writer = RecordingWriter::new();

    let step = StepBuilder::new("bill-accounts")
        .chunk(2)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();
    let job = JobBuilder::new().name("billing").start(&step).build();

    let repository = Arc::new(InMemoryRepository::new());
    let launcher = JobLauncher::new(repository.clone());
    let params = parameters(1);

    let execution = launcher.launch(&job, &params).unwrap();
    assert_eq!(execution.status, BatchStatus::Completed);

    // Two full chunks [A,B] and [C,D], then [E] committed alone.
    let step_exec = step_execution(&repository, "billing", &params, "bill-accounts");
    assert_eq!(step_exec.status, BatchStatus::Completed);
    assert_eq!(step_exec.read_count, 5);
    assert_eq!(step_exec.write_count, 5);
    assert_eq!(step_exec.commit_count, 3);
    assert_eq!(step_exec.skip_count, 0);
    assert_eq!(writer.written(), ["A", "B", "C", "D", "E"]);
}

#[test]
fn filtered_items_are_dropped_silently() {
    init_logger();

    let reader = VecReader::new(vec![1, 2, 3, 4, 5]);
    let processor = DroppingProcessor::new(vec![2, 4]);
    let writer = RecordingWriter::new();

    let step = StepBuilder::new("bill-accounts")
        .chunk(2)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();
    let job = JobBuilder::new().name("billing").start(&step).build();

    let repository = Arc::new(InMemoryRepository::new());
    let launcher = JobLauncher::new(repository.clone());
    let params = parameters(1);

    let execution = launcher.launch(&job, &params).unwrap();
    assert_eq!(execution.status, BatchStatus::Completed);

    // Filtering is not a failure: read count includes the dropped items,
    // write count does not, and no skip is recorded.
    let step_exec = step_execution(&repository, "billing", &params, "bill-accounts");
    assert_eq!(step_exec.read_count, 5);
    assert_eq!(step_exec.write_count, 3);
    assert_eq!(step_exec.filter_count, 2);
    assert_eq!(step_exec.skip_count, 0);
    assert_eq!(writer.written(), [1, 3, 5]);
}

#[test]
fn empty_input_completes_without_a_commit() {
    init_logger();

    let reader: VecReader<i32> = VecReader::new(Vec::new());
    let processor = PassthroughProcessor;
    let writer = RecordingWriter::new();

    let step = StepBuilder::new("bill-accounts")
        .chunk(2)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();
    let job = JobBuilder::new().name("billing").start(&step).build();

    let repository = Arc::new(InMemoryRepository::new());
    let launcher = JobLauncher::new(repository.clone());
    let params = parameters(1);

    let execution = launcher.launch(&job, &params).unwrap();
    assert_eq!(execution.status, BatchStatus::Completed);

    let step_exec = step_execution(&repository, "billing", &params, "bill-accounts");
    assert_eq!(step_exec.status, BatchStatus::Completed);
    assert_eq!(step_exec.read_count, 0);
    assert_eq!(step_exec.write_count, 0);
    assert_eq!(step_exec.commit_count, 0);
    assert!(writer.written().is_empty());
}

#[test]
fn input_smaller_than_chunk_size_commits_once() {
    init_logger();

    let reader = VecReader::new(vec![10, 20, 30]);
    let processor = PassthroughProcessor;
    let writer = RecordingWriter::new();

    let step = StepBuilder::new("bill-accounts")
        .chunk(100)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();
    let job = JobBuilder::new().name("billing").start(&step).build();

    let repository = Arc::new(InMemoryRepository::new());
    let launcher = JobLauncher::new(repository.clone());
    let params = parameters(1);

    launcher.launch(&job, &params).unwrap();

    let step_exec = step_execution(&repository, "billing", &params, "bill-accounts");
    assert_eq!(step_exec.commit_count, 1);
    assert_eq!(step_exec.write_count, 3);
}
