//! The row engine shared by [`DsvReader`](crate::dsv::dsv_reader::DsvReader)
//! and [`DsvWriter`](crate::dsv::dsv_writer::DsvWriter).
//!
//! Read path: [`line::LineReader`] delivers one line, [`tokenizer::Tokenizer`]
//! splits it into fields and [`field::FromField`] converts each field.
//! Write path: [`field::ToField`] renders each value and
//! [`quote::QuoteStyle`] decides whether it is wrapped in quotes.

/// Delimiter, terminator, quote and comment characters.
pub mod dialect;

/// Conversion between field text and scalar values.
pub mod field;

pub mod line;

/// Quoting styles, escaping and unescaping of fields.
pub mod quote;

pub mod row;

pub mod tokenizer;
