//! Reading and writing rows of delimiter-separated values.
//!
//! This module sequences the engine in [`crate::core`] into the two public
//! components:
//!
//! 1. **DsvReader**: reads an optional header, then one typed row per data
//!    line. Lines skipped by its comment policy are still counted, so error
//!    messages point at the right line of the file.
//!
//! 2. **DsvWriter**: writes an optional header, comment lines and typed rows,
//!    quoting fields per its [`QuoteStyle`](crate::core::quote::QuoteStyle).
//!
//! Both are configured through builders and both fix their number of
//! columns `N` at compile time.
//!
//! # Examples
//!
//! ```
//! use dsv_rs::dsv::{dsv_reader::{DsvReaderBuilder, HeaderPolicy}, dsv_writer::DsvWriterBuilder};
//!
//! let mut writer = DsvWriterBuilder::new().has_headers(true).from_writer(Vec::new());
//! writer.write_header(["city", "pop"]).unwrap();
//! writer.write_row(&("Boston, MA", 4628910u32)).unwrap();
//! let data = writer.into_inner().unwrap();
//! assert_eq!(String::from_utf8(data.clone()).unwrap(), "city,pop\n\"Boston, MA\",4628910\n");
//!
//! let mut reader = DsvReaderBuilder::new().has_headers(true).from_reader(data.as_slice());
//! reader.read_header(HeaderPolicy::default(), ["city", "pop"]).unwrap();
//! let row: (String, u32) = reader.read_row().unwrap().unwrap();
//! assert_eq!(row, ("Boston, MA".to_string(), 4628910));
//! ```

/// A module providing facilities for reading delimited rows.
pub mod dsv_reader;

/// A module providing facilities for writing delimited rows.
pub mod dsv_writer;

/// Names used until a header is read or written: `col1`, `col2`, ...
pub(crate) fn default_column_names<const N: usize>() -> [String; N] {
    std::array::from_fn(|index| format!("col{}", index + 1))
}
