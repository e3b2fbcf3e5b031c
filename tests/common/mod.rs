//! Instrumented readers, writers and processors shared by the integration
//! suites.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use batchkit::core::context::ExecutionContext;
use batchkit::core::item::{
    ItemProcessor, ItemProcessorResult, ItemReader, ItemReaderResult, ItemWriter, ItemWriterResult,
};
use batchkit::core::step::StopSignal;
use batchkit::error::{BatchError, ItemError};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Context key used by [`VecReader`] for its position checkpoint.
pub const POSITION_KEY: &str = "vec.reader.position";

/// Resumable in-memory reader with per-index failure injection.
///
/// A failing index consumes the item, like a csv reader consuming an
/// unparseable row. Successful reads are counted through a shareable
/// counter so tests can assert how often a step actually read across
/// launches.
pub struct VecReader<T> {
    items: Vec<T>,
    position: Cell<usize>,
    fail_at: RefCell<HashMap<usize, String>>,
    reads: Arc<AtomicUsize>,
}

impl<T: Clone> VecReader<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            position: Cell::new(0),
            fail_at: RefCell::new(HashMap::new()),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Injects one read failure of the given kind at `index`.
    pub fn failing_at(self, index: usize, kind: &str) -> Self {
        self.fail_at.borrow_mut().insert(index, kind.to_string());
        self
    }

    pub fn with_read_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.reads = counter;
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl<T: Clone> ItemReader<T> for VecReader<T> {
    fn open(&self, ctx: &ExecutionContext) -> Result<(), BatchError> {
        if let Some(saved) = ctx.get_u64(POSITION_KEY) {
            self.position.set(saved as usize);
        }
        Ok(())
    }

    fn read(&self) -> ItemReaderResult<T> {
        let i = self.position.get();
        if i >= self.items.len() {
            return Ok(None);
        }
        // Consumed whether or not it fails.
        self.position.set(i + 1);
        if let Some(kind) = self.fail_at.borrow_mut().remove(&i) {
            return Err(BatchError::ItemRead(ItemError::new(
                kind,
                format!("injected read failure at index {i}"),
            )));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.items[i].clone()))
    }

    fn update_context(&self, ctx: &mut ExecutionContext) -> Result<(), BatchError> {
        ctx.put(POSITION_KEY, self.position.get() as u64);
        Ok(())
    }
}

/// Writer collecting applied items into a shared sink.
///
/// A failed call applies nothing, which is exactly the transactional
/// contract the engine relies on. Failures trigger on any write call whose
/// batch contains the configured item, for a configured number of times.
pub struct RecordingWriter<T> {
    sink: Arc<Mutex<Vec<T>>>,
    failure: RefCell<Option<WriteFailure<T>>>,
}

struct WriteFailure<T> {
    trigger: T,
    kind: String,
    remaining: u32,
}

impl<T: Clone + PartialEq> RecordingWriter<T> {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_sink(sink: Arc<Mutex<Vec<T>>>) -> Self {
        Self {
            sink,
            failure: RefCell::new(None),
        }
    }

    /// Fails the next `times` write calls whose batch contains `trigger`.
    pub fn fail_on(self, trigger: T, kind: &str, times: u32) -> Self {
        *self.failure.borrow_mut() = Some(WriteFailure {
            trigger,
            kind: kind.to_string(),
            remaining: times,
        });
        self
    }

    pub fn sink(&self) -> Arc<Mutex<Vec<T>>> {
        self.sink.clone()
    }

    pub fn written(&self) -> Vec<T> {
        self.sink.lock().unwrap().clone()
    }
}

impl<T: Clone + PartialEq> ItemWriter<T> for RecordingWriter<T> {
    fn write(&self, items: &[T]) -> ItemWriterResult {
        if let Some(failure) = self.failure.borrow_mut().as_mut()
            && failure.remaining > 0
            && items.contains(&failure.trigger)
        {
            failure.remaining -= 1;
            return Err(BatchError::ItemWrite(ItemError::new(
                failure.kind.clone(),
                "injected write failure",
            )));
        }
        self.sink.lock().unwrap().extend_from_slice(items);
        Ok(())
    }
}

/// Writer that raises a stop signal while applying its first chunk, so the
/// step stops at the following chunk boundary.
pub struct StoppingWriter<T> {
    sink: Arc<Mutex<Vec<T>>>,
    stop: StopSignal,
}

impl<T: Clone> StoppingWriter<T> {
    pub fn new(sink: Arc<Mutex<Vec<T>>>, stop: StopSignal) -> Self {
        Self { sink, stop }
    }
}

impl<T: Clone> ItemWriter<T> for StoppingWriter<T> {
    fn write(&self, items: &[T]) -> ItemWriterResult {
        self.sink.lock().unwrap().extend_from_slice(items);
        self.stop.stop();
        Ok(())
    }
}

/// Writer that reports its first write call through a channel, then blocks
/// until released. Lets a test hold a launch mid-step deterministically.
pub struct GatedWriter<T> {
    started: SyncSender<()>,
    release: Receiver<()>,
    notified: Cell<bool>,
    _pd: PhantomData<T>,
}

impl<T> GatedWriter<T> {
    pub fn new(started: SyncSender<()>, release: Receiver<()>) -> Self {
        Self {
            started,
            release,
            notified: Cell::new(false),
            _pd: PhantomData,
        }
    }
}

impl<T> ItemWriter<T> for GatedWriter<T> {
    fn write(&self, _items: &[T]) -> ItemWriterResult {
        if !self.notified.get() {
            self.notified.set(true);
            let _ = self.started.send(());
            let _ = self.release.recv();
        }
        Ok(())
    }
}

/// Processor failing the first `times` attempts on `trigger`, then
/// succeeding. Models a transient fault that a retry policy can absorb.
pub struct FlakyProcessor<T> {
    trigger: T,
    kind: String,
    remaining: Cell<u32>,
}

impl<T: Clone + PartialEq> FlakyProcessor<T> {
    pub fn new(trigger: T, kind: &str, times: u32) -> Self {
        Self {
            trigger,
            kind: kind.to_string(),
            remaining: Cell::new(times),
        }
    }
}

impl<T: Clone + PartialEq> ItemProcessor<T, T> for FlakyProcessor<T> {
    fn process(&self, item: &T) -> ItemProcessorResult<T> {
        if *item == self.trigger && self.remaining.get() > 0 {
            self.remaining.set(self.remaining.get() - 1);
            return Err(BatchError::ItemProcess(ItemError::new(
                self.kind.clone(),
                "injected transient failure",
            )));
        }
        Ok(Some(item.clone()))
    }
}

/// Processor that always fails on the configured items.
pub struct RejectingProcessor<T> {
    triggers: Vec<T>,
    kind: String,
}

impl<T: Clone + PartialEq> RejectingProcessor<T> {
    pub fn new(triggers: Vec<T>, kind: &str) -> Self {
        Self {
            triggers,
            kind: kind.to_string(),
        }
    }
}

impl<T: Clone + PartialEq> ItemProcessor<T, T> for RejectingProcessor<T> {
    fn process(&self, item: &T) -> ItemProcessorResult<T> {
        if self.triggers.contains(item) {
            return Err(BatchError::ItemProcess(ItemError::new(
                self.kind.clone(),
                "injected rejection",
            )));
        }
        Ok(Some(item.clone()))
    }
}

/// Processor filtering out the configured items (`Ok(None)`).
pub struct DroppingProcessor<T> {
    triggers: Vec<T>,
}

impl<T: Clone + PartialEq> DroppingProcessor<T> {
    pub fn new(triggers: Vec<T>) -> Self {
        Self { triggers }
    }
}

impl<T: Clone + PartialEq> ItemProcessor<T, T> for DroppingProcessor<T> {
    fn process(&self, item: &T) -> ItemProcessorResult<T> {
        if self.triggers.contains(item) {
            Ok(None)
        } else {
            Ok(Some(item.clone()))
        }
    }
}
