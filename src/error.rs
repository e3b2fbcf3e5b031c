use std::fmt;

use thiserror::Error;

/// A classified item-level failure.
///
/// The `kind` is an application-chosen label ("parse", "io", "tax-lookup", ...)
/// that retry and skip policies match on. Readers, processors and writers
/// choose their own kinds; the engine never interprets them beyond policy
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    kind: String,
    message: String,
}

impl ItemError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    /// Bad job definition or job parameters at launch time.
    #[error("invalid launch request: {0}")]
    Validation(String),

    /// Re-launch of a job instance whose last execution already completed.
    #[error("job instance already completed: {0}")]
    DuplicateInstance(String),

    /// A non-terminal execution already exists for this job instance.
    #[error("job instance already running: {0}")]
    AlreadyRunning(String),

    /// A reader failed to produce an item.
    #[error("item read failed: {0}")]
    ItemRead(ItemError),

    /// A processor failed to transform an item.
    #[error("item processing failed: {0}")]
    ItemProcess(ItemError),

    /// A writer failed to apply a chunk or a single item.
    #[error("item write failed: {0}")]
    ItemWrite(ItemError),

    /// A step exhausted its retry/skip budget and transitioned to Failed.
    #[error("step '{0}' failed: {1}")]
    StepFailed(String, String),

    /// Persistence failure. Always fatal: execution metadata can no longer
    /// be trusted, so the in-flight chunk is rolled back and the execution
    /// is marked Failed.
    #[error("repository failure: {0}")]
    Repository(String),
}

impl BatchError {
    /// The classified item failure carried by read/process/write errors,
    /// if any. Skip and retry policies only apply to these.
    pub fn item_error(&self) -> Option<&ItemError> {
        match self {
            BatchError::ItemRead(e) | BatchError::ItemProcess(e) | BatchError::ItemWrite(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}
