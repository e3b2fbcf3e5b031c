use std::{
    cell::RefCell,
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    result,
};

use csv::{Writer, WriterBuilder};
use serde::Serialize;

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    error::{BatchError, ItemError},
};

/// Error kind attached to serialization or I/O failures, for skip/retry
/// policies.
pub const WRITE_ERROR_KIND: &str = "csv-write";

/// A CSV item writer that serializes Rust structs into CSV rows.
///
/// Rows are buffered by the underlying csv writer; [`ItemWriter::flush`] is
/// the chunk commit boundary and pushes the buffer to the destination. For
/// restartable steps open the destination in append mode
/// ([`CsvItemWriterBuilder::append`]) so a resumed execution continues the
/// file written by committed chunks, and leave headers disabled.
pub struct CsvItemWriter<W: Write> {
    wrapper: RefCell<Writer<W>>,
}

impl<W: Write, R: Serialize> ItemWriter<R> for CsvItemWriter<W> {
    fn write(&self, items: &[R]) -> ItemWriterResult {
        let mut writer = self.wrapper.borrow_mut();
        for item in items {
            writer
                .serialize(item)
                .map_err(|error| {
                    BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
                })?;
        }
        Ok(())
    }

    /// Flush the contents of the internal buffer to the underlying writer.
    ///
    /// Note that this also flushes the underlying writer.
    fn flush(&self) -> ItemWriterResult {
        self.wrapper.borrow_mut().flush().map_err(|error| {
            BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
        })
    }
}

impl<W: Write> CsvItemWriter<W> {
    pub fn into_inner(self) -> result::Result<W, BatchError> {
        self.wrapper.into_inner().into_inner().map_err(|error| {
            BatchError::ItemWrite(ItemError::new(WRITE_ERROR_KIND, error.to_string()))
        })
    }
}

#[derive(Default)]
pub struct CsvItemWriterBuilder {
    delimiter: u8,
    has_headers: bool,
    append: bool,
}

impl CsvItemWriterBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_headers: false,
            append: false,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Write a header row derived from the struct's field names before the
    /// first record.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Open the destination file in append mode instead of truncating it.
    pub fn append(mut self, yes: bool) -> Self {
        self.append = yes;
        self
    }

    pub fn from_writer<W: Write>(self, wtr: W) -> CsvItemWriter<W> {
        let wtr = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .from_writer(wtr);

        CsvItemWriter {
            wrapper: RefCell::new(wtr),
        }
    }

    /// Creates a `CsvItemWriter` writing to a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be opened; opening is an initialization
    /// step and fails fast.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemWriter<File> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(self.append)
            .truncate(!self.append)
            .open(path)
            .expect("Unable to open csv file");

        let wtr = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .from_writer(file);

        CsvItemWriter {
            wrapper: RefCell::new(wtr),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use mockall::mock;
    use serde::Serialize;

    use super::CsvItemWriterBuilder;
    use crate::core::item::ItemWriter;

    #[derive(Serialize)]
    struct Row<'a> {
        city: &'a str,
        country: &'a str,
        population: u64,
    }

    #[test]
    fn writes_rows_with_headers() {
        let writer = CsvItemWriterBuilder::new()
            .has_headers(true)
            .from_writer(Vec::new());

        writer
            .write(&[
                Row {
                    city: "Boston",
                    country: "United States",
                    population: 4628910,
                },
                Row {
                    city: "Concord",
                    country: "United States",
                    population: 42695,
                },
            ])
            .unwrap();
        ItemWriter::<Row>::flush(&writer).unwrap();

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "city,country,population\nBoston,United States,4628910\nConcord,United States,42695\n"
        );
    }

    mock! {
        File {}
        impl Write for File {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
            fn flush(&mut self) -> io::Result<()>;
        }
    }

    #[test]
    fn flush_failure_surfaces_as_item_write_error() {
        let mut file = MockFile::new();
        file.expect_write()
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
        file.expect_flush().returning(|| Ok(()));

        let writer = CsvItemWriterBuilder::new().from_writer(file);
        writer
            .write(&[Row {
                city: "Boston",
                country: "United States",
                population: 4628910,
            }])
            .unwrap();

        let result = ItemWriter::<Row>::flush(&writer);
        assert!(matches!(
            result,
            Err(crate::error::BatchError::ItemWrite(_))
        ));
    }
}
