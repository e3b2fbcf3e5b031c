use csv::{ReaderBuilder, StringRecordsIntoIter, Terminator, Trim};
use serde::de::DeserializeOwned;
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Read,
    path::Path,
};

use log::debug;

use crate::{
    core::{
        context::ExecutionContext,
        item::{ItemReader, ItemReaderResult},
    },
    error::{BatchError, ItemError},
};

/// Context key holding the number of records this reader has consumed.
const POSITION_KEY: &str = "csv.reader.position";

/// Error kind attached to unreadable or unparseable rows, for skip/retry
/// policies.
pub const PARSE_ERROR_KIND: &str = "csv-parse";

/// A CSV item reader that deserializes rows into Rust structs through serde.
///
/// The reader counts every record it consumes and stores that count into the
/// execution context at each chunk commit ([`ItemReader::update_context`]).
/// On [`ItemReader::open`] it seeks past the saved count, which makes a CSV
/// step resumable from the last committed chunk boundary. A row that fails
/// to parse still counts as consumed, so a skipped row is not re-read on
/// restart.
///
/// # Examples
///
/// ```
/// use batchkit::item::csv::csv_reader::CsvItemReaderBuilder;
/// use batchkit::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Record {
///     name: String,
///     value: i32,
/// }
///
/// let data = "\
/// name,value
/// foo,123
/// bar,456
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .has_headers(true)
///     .from_reader(data.as_bytes());
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "foo");
///
/// let record: Record = reader.read().unwrap().unwrap();
/// assert_eq!(record.value, 456);
///
/// assert!(ItemReader::<Record>::read(&reader).unwrap().is_none());
/// ```
pub struct CsvItemReader<R> {
    records: RefCell<StringRecordsIntoIter<R>>,
    position: Cell<u64>,
}

impl<R: Read, T: DeserializeOwned> ItemReader<T> for CsvItemReader<R> {
    /// Seeks past the records consumed by previously committed chunks.
    fn open(&self, ctx: &ExecutionContext) -> Result<(), BatchError> {
        if let Some(saved) = ctx.get_u64(POSITION_KEY) {
            debug!("Seeking csv reader to record {saved}");
            let mut records = self.records.borrow_mut();
            for _ in 0..saved {
                if records.next().is_none() {
                    break;
                }
            }
            self.position.set(saved);
        }
        Ok(())
    }

    /// Reads and deserializes the next row.
    ///
    /// # Returns
    /// - `Ok(Some(record))` on a successfully parsed row
    /// - `Ok(None)` when there are no more records
    /// - `Err(BatchError::ItemRead)` with kind [`PARSE_ERROR_KIND`] when a
    ///   row cannot be read or deserialized
    fn read(&self) -> ItemReaderResult<T> {
        if let Some(result) = self.records.borrow_mut().next() {
            // The record is consumed whether or not it parses.
            self.position.set(self.position.get() + 1);
            match result {
                Ok(string_record) => match string_record.deserialize(None) {
                    Ok(record) => Ok(Some(record)),
                    Err(error) => Err(BatchError::ItemRead(ItemError::new(
                        PARSE_ERROR_KIND,
                        error.to_string(),
                    ))),
                },
                Err(error) => Err(BatchError::ItemRead(ItemError::new(
                    PARSE_ERROR_KIND,
                    error.to_string(),
                ))),
            }
        } else {
            Ok(None)
        }
    }

    fn update_context(&self, ctx: &mut ExecutionContext) -> Result<(), BatchError> {
        ctx.put(POSITION_KEY, self.position.get());
        Ok(())
    }
}

/// A builder for configuring CSV item reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Terminator: CRLF
/// - Headers: disabled
/// - All fields trimmed, strict parsing
#[derive(Default)]
pub struct CsvItemReaderBuilder {
    delimiter: u8,
    terminator: Terminator,
    has_headers: bool,
}

impl CsvItemReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
            has_headers: false,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// When enabled, the first row is treated as headers and is not
    /// returned as data.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    /// Creates a `CsvItemReader` from any source implementing `Read`.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvItemReader<R> {
        let rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(self.has_headers)
            .flexible(false)
            .from_reader(rdr);

        CsvItemReader {
            records: RefCell::new(rdr.into_records()),
            position: Cell::new(0),
        }
    }

    /// Creates a `CsvItemReader` from a file path.
    ///
    /// # Panics
    /// Panics if the file cannot be opened; opening is an initialization
    /// step and fails fast.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvItemReader<File> {
        let rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(self.has_headers)
            .flexible(false)
            .from_path(path)
            .expect("Unable to open csv file");

        CsvItemReader {
            records: RefCell::new(rdr.into_records()),
            position: Cell::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::CsvItemReaderBuilder;
    use crate::core::{context::ExecutionContext, item::ItemReader};

    #[derive(Debug, Deserialize, PartialEq)]
    struct City {
        city: String,
        country: String,
        pop: u32,
    }

    const DATA: &str = "city,country,pop
        Boston,United States,4628910
        Concord,United States,42695
        Quincy,United States,101636";

    #[test]
    fn reads_rows_in_order() {
        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(DATA.as_bytes());

        let first: City = reader.read().unwrap().unwrap();
        assert_eq!(first.city, "Boston");

        let second: City = reader.read().unwrap().unwrap();
        assert_eq!(second.city, "Concord");
    }

    #[test]
    fn open_seeks_to_the_saved_position() {
        let mut ctx = ExecutionContext::new();

        // First pass: consume two records and checkpoint.
        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(DATA.as_bytes());
        let _: City = reader.read().unwrap().unwrap();
        let _: City = reader.read().unwrap().unwrap();
        ItemReader::<City>::update_context(&reader, &mut ctx).unwrap();

        // A fresh reader over the same input resumes at the third record.
        let resumed = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(DATA.as_bytes());
        ItemReader::<City>::open(&resumed, &ctx).unwrap();

        let next: City = resumed.read().unwrap().unwrap();
        assert_eq!(next.city, "Quincy");
        assert!(ItemReader::<City>::read(&resumed).unwrap().is_none());
    }

    #[test]
    fn unparseable_row_is_an_item_read_error_and_still_consumed() {
        let data = "city,country,pop
            Boston,United States,not-a-number
            Concord,United States,42695";

        let reader = CsvItemReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes());

        let bad: Result<Option<City>, _> = reader.read();
        assert!(bad.is_err());

        // The bad row was consumed; the next read returns the following row.
        let good: City = reader.read().unwrap().unwrap();
        assert_eq!(good.city, "Concord");
    }
}
