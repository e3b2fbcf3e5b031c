use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::{BufRead, BufReader, Read},
    marker::PhantomData,
    path::Path,
};

use log::debug;
use serde::de::DeserializeOwned;

use crate::{
    core::{
        context::ExecutionContext,
        item::{ItemReader, ItemReaderResult},
    },
    error::{BatchError, ItemError},
};

/// Context key holding the number of lines this reader has consumed.
const POSITION_KEY: &str = "json.reader.position";

/// Error kind attached to unreadable or unparseable lines, for skip/retry
/// policies.
pub const PARSE_ERROR_KIND: &str = "json-parse";

/// A JSON Lines item reader: one JSON object per input line.
///
/// Blank lines are consumed and ignored. Every consumed line counts toward
/// the position checkpoint saved at each chunk commit, so a resumed step
/// seeks past exactly the lines that were part of committed chunks,
/// including lines that failed to parse and were skipped.
pub struct JsonItemReader<R, T> {
    pd: PhantomData<T>,
    reader: RefCell<BufReader<R>>,
    position: Cell<u64>,
}

impl<R: Read, T: DeserializeOwned> JsonItemReader<R, T> {
    fn new(rdr: R, capacity: usize) -> Self {
        Self {
            pd: PhantomData,
            reader: RefCell::new(BufReader::with_capacity(capacity, rdr)),
            position: Cell::new(0),
        }
    }

    /// Consumes one line. `Ok(None)` at end of input.
    fn next_line(&self) -> Result<Option<String>, BatchError> {
        let mut line = String::new();
        let n = self
            .reader
            .borrow_mut()
            .read_line(&mut line)
            .map_err(|error| {
                BatchError::ItemRead(ItemError::new(PARSE_ERROR_KIND, error.to_string()))
            })?;
        if n == 0 {
            Ok(None)
        } else {
            self.position.set(self.position.get() + 1);
            Ok(Some(line))
        }
    }
}

impl<R: Read, T: DeserializeOwned> ItemReader<T> for JsonItemReader<R, T> {
    /// Seeks past the lines consumed by previously committed chunks.
    fn open(&self, ctx: &ExecutionContext) -> Result<(), BatchError> {
        if let Some(saved) = ctx.get_u64(POSITION_KEY) {
            debug!("Seeking json reader to line {saved}");
            let mut reader = self.reader.borrow_mut();
            let mut line = String::new();
            for _ in 0..saved {
                line.clear();
                let n = reader.read_line(&mut line).map_err(|error| {
                    BatchError::ItemRead(ItemError::new(PARSE_ERROR_KIND, error.to_string()))
                })?;
                if n == 0 {
                    break;
                }
            }
            self.position.set(saved);
        }
        Ok(())
    }

    fn read(&self) -> ItemReaderResult<T> {
        loop {
            let Some(line) = self.next_line()? else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return match serde_json::from_str(trimmed) {
                Ok(record) => Ok(Some(record)),
                Err(error) => Err(BatchError::ItemRead(ItemError::new(
                    PARSE_ERROR_KIND,
                    error.to_string(),
                ))),
            };
        }
    }

    fn update_context(&self, ctx: &mut ExecutionContext) -> Result<(), BatchError> {
        ctx.put(POSITION_KEY, self.position.get());
        Ok(())
    }
}

#[derive(Default)]
pub struct JsonItemReaderBuilder<T> {
    _pd: PhantomData<T>,
    capacity: usize,
}

impl<T: DeserializeOwned> JsonItemReaderBuilder<T> {
    pub fn new() -> JsonItemReaderBuilder<T> {
        Self {
            _pd: PhantomData,
            capacity: 8 * 1024,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> JsonItemReaderBuilder<T> {
        self.capacity = capacity;
        self
    }

    pub fn from_reader<R: Read>(self, rdr: R) -> JsonItemReader<R, T> {
        JsonItemReader::new(rdr, self.capacity)
    }

    /// # Panics
    /// Panics if the file cannot be opened; opening is an initialization
    /// step and fails fast.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> JsonItemReader<File, T> {
        let file = File::open(path).expect("Unable to open json file");
        JsonItemReader::new(file, self.capacity)
    }
}
