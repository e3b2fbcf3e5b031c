//! A small billing run: invoice lines come in as CSV, each account's bill is
//! computed, and the bills are written as JSON Lines. A second job then
//! reads the bills back and logs them.
//!
//! Run with:
//! `cargo run --example billing_run --features "csv json logger"`

use std::env::temp_dir;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use batchkit::core::item::{ItemProcessor, ItemProcessorResult};
use batchkit::core::job::JobBuilder;
use batchkit::core::launcher::JobLauncher;
use batchkit::core::parameters::JobParametersBuilder;
use batchkit::core::repository::memory::InMemoryRepository;
use batchkit::core::step::StepBuilder;
use batchkit::error::BatchError;
use batchkit::item::csv::CsvItemReaderBuilder;
use batchkit::item::json::{JsonItemReaderBuilder, JsonItemWriterBuilder};
use batchkit::item::logger::LoggerWriter;

const INVOICES: &str = "account,amount_cents,quantity
acme,1250,2
globex,400,10
initech,99,1
umbrella,3000,3
hooli,725,4";

#[derive(Debug, Deserialize)]
struct InvoiceLine {
    account: String,
    amount_cents: i64,
    quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bill {
    account: String,
    total_cents: i64,
}

struct BillingProcessor;

impl ItemProcessor<InvoiceLine, Bill> for BillingProcessor {
    fn process(&self, item: &InvoiceLine) -> ItemProcessorResult<Bill> {
        Ok(Some(Bill {
            account: item.account.clone(),
            total_cents: item.amount_cents * item.quantity,
        }))
    }
}

fn main() -> Result<(), BatchError> {
    env_logger::init();

    let bills_path = temp_dir().join("bills.jsonl");
    let repository = Arc::new(InMemoryRepository::new());
    let launcher = JobLauncher::new(repository.clone());

    // Compute the bills.
    let reader = CsvItemReaderBuilder::new()
        .has_headers(true)
        .from_reader(INVOICES.as_bytes());
    let processor = BillingProcessor;
    let writer = JsonItemWriterBuilder::new().from_path(&bills_path);

    let step = StepBuilder::new("bill-accounts")
        .chunk(2)
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .build();
    let job = JobBuilder::new().name("billing").start(&step).build();
    let parameters = JobParametersBuilder::new().string("cycle", "2024-07").build();

    let execution = launcher.launch(&job, &parameters)?;
    println!("billing finished with status {}", execution.status);

    // Read the bills back and log them.
    let audit_reader = JsonItemReaderBuilder::<Bill>::new().from_path(&bills_path);
    let passthrough = batchkit::core::item::PassthroughProcessor;
    let audit_writer = LoggerWriter::default();
    let audit_step = StepBuilder::new("log-bills")
        .chunk(5)
        .reader(&audit_reader)
        .processor(&passthrough)
        .writer(&audit_writer)
        .build();
    let audit_job = JobBuilder::new().name("billing-audit").start(&audit_step).build();

    let audit = launcher.launch(&audit_job, &parameters)?;
    println!("audit finished with status {}", audit.status);

    Ok(())
}
