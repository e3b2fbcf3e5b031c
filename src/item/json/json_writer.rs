use std::{
    cell::RefCell,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use serde::Serialize;

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    error::{BatchError, ItemError},
};

/// Error kind attached to serialization or I/O failures, for skip/retry
/// policies.
pub const WRITE_ERROR_KIND: &str = "json-write";

/// A JSON Lines item writer: one JSON object per output line.
///
/// Lines are buffered; [`ItemWriter::flush`] is the chunk commit boundary.
/// With [`JsonItemWriterBuilder::append`] the destination file is opened in
/// append mode, so a resumed execution continues after the lines written by
/// committed chunks.
pub struct JsonItemWriter<W: Write> {
    stream: RefCell<BufWriter<W>>,
}

impl<W: Write, R: Serialize> ItemWriter<R> for JsonItemWriter<W> {
    fn write(&self, items: &[R]) -> ItemWriterResult {
        let mut stream = self.stream.borrow_mut();
        for item in items {
            let json = serde_json::to_string(item).map_err(|error| {
                BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
            })?;
            stream
                .write_all(json.as_bytes())
                .and_then(|()| stream.write_all(b"\n"))
                .map_err(|error| {
                    BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
                })?;
        }
        Ok(())
    }

    fn flush(&self) -> ItemWriterResult {
        self.stream.borrow_mut().flush().map_err(|error| {
            BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
        })
    }
}

impl<W: Write> JsonItemWriter<W> {
    pub fn into_inner(self) -> Result<W, BatchError> {
        self.stream.into_inner().into_inner().map_err(|error| {
            BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
        })
    }
}

#[derive(Default)]
pub struct JsonItemWriterBuilder {
    append: bool,
}

impl JsonItemWriterBuilder {
    pub fn new() -> Self {
        Self { append: false }
    }

    /// Open the destination file in append mode instead of truncating it.
    pub fn append(mut self, yes: bool) -> Self {
        self.append = yes;
        self
    }

    pub fn from_writer<W: Write>(self, wtr: W) -> JsonItemWriter<W> {
        JsonItemWriter {
            stream: RefCell::new(BufWriter::new(wtr)),
        }
    }

    /// Creates a `JsonItemWriter` writing to a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be opened; opening is an initialization
    /// step and fails fast.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> JsonItemWriter<File> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(self.append)
            .truncate(!self.append)
            .open(path)
            .expect("Unable to open json file");

        JsonItemWriter {
            stream: RefCell::new(BufWriter::new(file)),
        }
    }
}
