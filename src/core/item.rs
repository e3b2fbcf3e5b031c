use crate::core::context::ExecutionContext;
use crate::error::BatchError;

/// Result of a single read attempt. `Ok(None)` signals end of input; it is a
/// sentinel, not an error.
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

/// Result of processing one item. `Ok(None)` means the item was filtered
/// out: dropped silently, not a failure.
pub type ItemProcessorResult<O> = Result<Option<O>, BatchError>;

/// Result of a writer operation.
pub type ItemWriterResult = Result<(), BatchError>;

/// Retrieves input for a step, one item at a time.
///
/// A reader is responsible for making its own position resumable: `open`
/// receives the execution context saved at the last committed chunk boundary
/// and must seek to that position; `update_context` records the current
/// position into the context at each commit. The engine only saves and
/// restores the context, never interprets it.
pub trait ItemReader<I> {
    /// Prepares the reader, seeking to the checkpoint saved in `ctx` if any.
    fn open(&self, _ctx: &ExecutionContext) -> Result<(), BatchError> {
        Ok(())
    }

    /// Reads the next item. `Ok(None)` means the input is exhausted.
    fn read(&self) -> ItemReaderResult<I>;

    /// Records the reader's current position into the execution context.
    /// Called once per committed chunk, after the chunk's write succeeded.
    fn update_context(&self, _ctx: &mut ExecutionContext) -> Result<(), BatchError> {
        Ok(())
    }

    /// Releases any resources held by the reader.
    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Transforms one item into another, or filters it out.
pub trait ItemProcessor<I, O> {
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

/// Writes a chunk of items as one transactional unit.
///
/// `flush` is the commit boundary, invoked once per chunk after its writes
/// succeeded. Everything written since the previous `flush` belongs to one
/// transaction: a failed `write` call must apply nothing, and a chunk that
/// never reaches `flush` (the step failed mid-chunk) must leave no
/// observable side effects. Items already flushed by earlier chunks remain
/// applied.
pub trait ItemWriter<O> {
    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn write(&self, items: &[O]) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}

/// Processor that forwards every item unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughProcessor;

impl<I: Clone> ItemProcessor<I, I> for PassthroughProcessor {
    fn process(&self, item: &I) -> ItemProcessorResult<I> {
        Ok(Some(item.clone()))
    }
}
