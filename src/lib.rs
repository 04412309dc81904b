#![cfg_attr(docsrs, feature(doc_cfg))]
//#![warn(missing_docs)]

/*!
 # dsv-rs

 Typed reading and writing of delimiter-separated values (CSV, TSV, PSV, ...).

 Rows are read into and written from tuples or arrays whose length is the
 number of columns `N` of the reader or writer, fixed at compile time. Each
 field is converted to or from its Rust type with checked numeric parsing:
 trailing garbage and out-of-range values are errors that name the file,
 line and column they were found in.

 ## Core Concepts

- **Dialect:** the delimiter, line terminator, quote and comment characters.
  `CSV`, `TSV`, `SCSV`, `PSV` and `COLON_SV` are predefined.
- **QuoteStyle:** decides which fields the writer wraps in quotes: `None`,
  `Minimal`, `All` or `NonNumeric`.
- **DsvReader:** reads an optional header, checked against the expected
  column names under a `HeaderPolicy`, then one typed row per data line.
  Comment and blank lines are skipped by default (`CommentPolicy`), and
  out-of-range numbers are errors unless an `OverflowPolicy` says otherwise.
- **DsvWriter:** writes an optional header, comment lines and typed rows.

 ## Getting Started

```rust
use dsv_rs::{
    DsvResult,
    dsv::dsv_reader::{DsvReaderBuilder, HeaderPolicy},
};

fn main() -> DsvResult<()> {
    let data = concat!(
        "#memory modules\n",
        "vendor,size,speed,comment\n",
        "Corsair,16,3200,\"fast, cheap\"\n",
        "Kingston,32,2666,\n",
    );

    let mut reader = DsvReaderBuilder::new()
        .has_headers(true)
        .from_reader(data.as_bytes());
    reader.read_header(HeaderPolicy::IGNORE_EXTRA_COLUMN, ["vendor", "size", "speed"])?;

    let mut total = 0;
    while let Some((vendor, size, speed)) = reader.read_row::<(String, u32, f64)>()? {
        log::info!("{vendor}: {size} GB at {speed} MT/s");
        total += size;
    }
    assert_eq!(total, 48);
    Ok(())
}
```

 ## Examples
+ `demos/simple_read.rs`: read a file, ignoring extra columns
+ `demos/write_report.rs`: write a report with comments and quoted fields

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.

 ## Contribution
 Unless you explicitly state otherwise, any contribution intentionally submitted
 for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
 dual licensed as above, without any additional terms or conditions

 */

/// Dialects, quoting, tokenizing and field conversion
pub mod core;

/// Error types for reading and writing
pub mod error;

#[doc(inline)]
pub use error::*;

/// Typed readers and writers of delimited rows
pub mod dsv;

pub use crate::core::{
    dialect::Dialect, field::OverflowPolicy, line::CommentPolicy, quote::QuoteStyle,
    tokenizer::TrimPolicy,
};
pub use dsv::{
    dsv_reader::{DsvReader, DsvReaderBuilder, HeaderPolicy},
    dsv_writer::{DsvWriter, DsvWriterBuilder},
};
