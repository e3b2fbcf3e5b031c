/// JSON Lines support for reading and writing structured data.
///
/// One JSON object per line. The line-oriented format is what makes JSON
/// steps restartable: the reader keeps a line-position checkpoint in the
/// execution context and seeks past committed lines on resume, and the
/// writer can append to the lines written by committed chunks. Neither is
/// possible with a single JSON array spanning the whole file.
///
/// Both components use `serde_json` and follow the builder pattern.
///
/// # Examples
///
/// ```
/// use batchkit::item::json::JsonItemReaderBuilder;
/// use batchkit::core::item::ItemReader;
/// use serde::Deserialize;
/// use std::io::Cursor;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// let json_data = r#"{"id":1,"name":"Alice"}
/// {"id":2,"name":"Bob"}
/// "#;
///
/// let reader = JsonItemReaderBuilder::<User>::new().from_reader(Cursor::new(json_data));
///
/// let mut users = Vec::new();
/// while let Some(user) = reader.read().unwrap() {
///     users.push(user);
/// }
///
/// assert_eq!(users.len(), 2);
/// assert_eq!(users[0].name, "Alice");
/// assert_eq!(users[1].id, 2);
/// ```
/// A module providing facilities for reading JSON Lines data records.
pub mod json_reader;
/// A module providing facilities for writing JSON Lines data records.
pub mod json_writer;

// Re-export the main types for easier access
pub use json_reader::{JsonItemReader, JsonItemReaderBuilder};
pub use json_writer::{JsonItemWriter, JsonItemWriterBuilder};
