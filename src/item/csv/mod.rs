/// CSV support for reading and writing tabular data.
///
/// The reader deserializes rows into Rust structs through serde and keeps a
/// record-position checkpoint in the execution context, so a step reading
/// CSV is restartable: on resume it seeks past every record that was part of
/// a committed chunk. The writer serializes structs back to CSV and can open
/// its destination in append mode so a resumed step continues the same file.
///
/// Both components follow the builder pattern.
///
/// # Examples
///
/// ```
/// use batchkit::item::csv::csv_reader::CsvItemReaderBuilder;
/// use batchkit::core::item::ItemReader;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct City {
///     city: String,
///     country: String,
///     pop: u32,
/// }
///
/// let csv_data = "\
/// city,country,pop
/// Boston,United States,4628910
/// Concord,United States,42695
/// ";
///
/// let reader = CsvItemReaderBuilder::new()
///     .has_headers(true)
///     .delimiter(b',')
///     .from_reader(csv_data.as_bytes());
///
/// let mut cities: Vec<City> = Vec::new();
/// while let Some(city) = reader.read().unwrap() {
///     cities.push(city);
/// }
///
/// assert_eq!(cities.len(), 2);
/// assert_eq!(cities[0].city, "Boston");
/// assert_eq!(cities[1].pop, 42695);
/// ```
/// A module providing facilities for reading CSV data records.
pub mod csv_reader;

/// A module providing facilities for writing CSV data records.
pub mod csv_writer;

pub use csv_reader::{CsvItemReader, CsvItemReaderBuilder};
pub use csv_writer::{CsvItemWriter, CsvItemWriterBuilder};
