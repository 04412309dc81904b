use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use log::debug;

use crate::{
    core::{
        dialect::Dialect,
        field::ToField,
        quote::{QuoteStyle, escape_into, is_ambiguous_unquoted},
        row::ToRow,
    },
    error::{DsvError, DsvResult},
};

use super::default_column_names;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Opened,
    HeaderWritten,
    WritingRows,
}

/// Writer of delimiter-separated rows with `N` columns.
///
/// Every line is rendered completely before any byte of it is written, so a
/// failing row leaves no partial line behind. Output is buffered; it is
/// flushed by [`DsvWriter::flush`], [`DsvWriter::close`],
/// [`DsvWriter::into_inner`] or, ignoring errors, when the writer is dropped.
///
/// # Examples
///
/// ```
/// use dsv_rs::core::{dialect::Dialect, quote::QuoteStyle};
/// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
///
/// let mut writer = DsvWriterBuilder::new()
///     .dialect(Dialect::SCSV)
///     .quote_style(QuoteStyle::NonNumeric)
///     .from_writer::<_, 2>(Vec::new());
///
/// writer.write_comment(&["generated", "by dsv"]).unwrap();
/// writer.write_header(["vendor", "size"]).unwrap();
/// writer.write_row(&("Corsair", 16)).unwrap();
///
/// let data = String::from_utf8(writer.into_inner().unwrap()).unwrap();
/// assert_eq!(data, "#\"generated\";\"by dsv\"\n\"vendor\";\"size\"\n\"Corsair\";16\n");
/// ```
pub struct DsvWriter<W: Write, const N: usize> {
    out: BufWriter<W>,
    dialect: Dialect,
    quote_style: QuoteStyle,
    file_name: String,
    file_line: u64,
    /// Line being rendered.
    line: String,
    /// Text of the field being rendered.
    field: String,
    column_names: [String; N],
    has_headers: bool,
    state: WriterState,
}

impl<W: Write, const N: usize> DsvWriter<W, N> {
    fn new(out: W, file_name: String, builder: &DsvWriterBuilder) -> Self {
        const { assert!(N > 0, "a writer needs at least one column") };

        DsvWriter {
            out: BufWriter::new(out),
            dialect: builder.dialect,
            quote_style: builder.quote_style,
            file_name,
            file_line: 0,
            line: String::new(),
            field: String::new(),
            column_names: default_column_names(),
            has_headers: builder.has_headers,
            state: WriterState::Opened,
        }
    }

    /// Writes the header line.
    ///
    /// # Errors
    ///
    /// - `DuplicatedColumnInHeader` when a name appears twice
    /// - `Usage` when a header or a row was already written
    pub fn write_header(&mut self, names: [&str; N]) -> DsvResult<()> {
        if self.state != WriterState::Opened {
            return Err(DsvError::Usage(format!(
                "write_header called after the header or a row of \"{}\" was written",
                self.file_name
            )));
        }
        for (index, name) in names.iter().enumerate() {
            if names[..index].contains(name) {
                return Err(DsvError::DuplicatedColumnInHeader {
                    file_name: self.file_name.clone(),
                    column_name: name.to_string(),
                });
            }
        }

        self.column_names = names.map(str::to_string);
        self.write_line(&ToRow::<N>::fields(&names), false)?;
        self.state = WriterState::HeaderWritten;
        Ok(())
    }

    /// Writes one row.
    ///
    /// # Errors
    ///
    /// - `UnquotableField` when the quote style is [`QuoteStyle::None`] and
    ///   a field would read back differently without quotes
    /// - `Io` when the underlying writer fails
    /// - `Usage` when the writer was built with `has_headers(true)` and no
    ///   header was written yet
    pub fn write_row<T: ToRow<N> + ?Sized>(&mut self, row: &T) -> DsvResult<()> {
        if self.has_headers && self.state == WriterState::Opened {
            return Err(DsvError::Usage(format!(
                "write_row called before write_header on \"{}\"",
                self.file_name
            )));
        }
        self.write_line(&row.fields(), false)?;
        self.state = WriterState::WritingRows;
        Ok(())
    }

    /// Writes a comment line: the comment marker followed by the rendered
    /// values. Comments may appear anywhere, before the header included.
    ///
    /// # Errors
    ///
    /// `UnquotableField` when a value contains the line terminator.
    pub fn write_comment<T: ToRow<N> + ?Sized>(&mut self, values: &T) -> DsvResult<()> {
        self.write_line(&values.fields(), true)
    }

    fn write_line(&mut self, fields: &[&dyn ToField], comment: bool) -> DsvResult<()> {
        let delimiter = self.dialect.delimiter();
        let terminator = self.dialect.line_terminator();
        // A lone empty field would make an empty line, which readers skip.
        let lone = fields.len() == 1 && !comment;

        self.line.clear();
        if comment {
            self.line.push(self.dialect.comment());
        }

        for (index, value) in fields.iter().enumerate() {
            if index > 0 {
                self.line.push(delimiter);
            }
            self.field.clear();
            value.render(&mut self.field);

            // Readers strip a byte order mark opening the stream.
            let leading_bom = !comment
                && self.file_line == 0
                && index == 0
                && self.field.starts_with('\u{feff}');
            let force_quotes = (lone && self.field.is_empty()) || leading_bom;

            let unquotable = if comment {
                self.field.contains(terminator)
            } else if self.quote_style == QuoteStyle::None {
                force_quotes || is_ambiguous_unquoted(&self.field, &self.dialect)
            } else {
                false
            };
            if unquotable {
                return Err(DsvError::UnquotableField {
                    file_name: self.file_name.clone(),
                    line: self.file_line + 1,
                    column_name: self.column_names[index].clone(),
                    content: self.field.clone(),
                });
            }

            if force_quotes {
                escape_into(&self.field, &self.dialect, &mut self.line);
            } else {
                self.quote_style.render_into(
                    &self.field,
                    value.is_numeric(),
                    &self.dialect,
                    &mut self.line,
                );
            }
        }
        self.line.push(terminator);

        self.out
            .write_all(self.line.as_bytes())
            .map_err(|source| self.io_error(source))?;
        self.file_line += 1;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> DsvError {
        DsvError::Io {
            file_name: self.file_name.clone(),
            line: self.file_line + 1,
            source,
        }
    }

    /// Flushes buffered lines to the underlying writer, and flushes it.
    pub fn flush(&mut self) -> DsvResult<()> {
        self.out.flush().map_err(|source| self.io_error(source))
    }

    /// Flushes and closes the writer, reporting any error the implicit
    /// flush on drop would swallow.
    pub fn close(mut self) -> DsvResult<()> {
        self.flush()?;
        debug!("closed {} after {} lines", self.file_name, self.file_line);
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> DsvResult<W> {
        let file_name = self.file_name;
        let line = self.file_line;
        self.out.into_inner().map_err(|error| DsvError::Io {
            file_name,
            line,
            source: error.into_error(),
        })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number of lines written so far.
    pub fn file_line(&self) -> u64 {
        self.file_line
    }
}

/// A builder for configuring delimiter-separated writing.
///
/// # Default Configuration
///
/// - Dialect: [`Dialect::CSV`]
/// - Quoting: [`QuoteStyle::Minimal`]
/// - Headers: rows may be written without a header
///
/// # Examples
///
/// ```
/// use dsv_rs::core::{dialect::Dialect, quote::QuoteStyle};
/// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
///
/// let mut writer = DsvWriterBuilder::new()
///     .dialect(Dialect::PSV)
///     .quote_style(QuoteStyle::All)
///     .from_writer::<_, 2>(Vec::new());
/// writer.write_row(&("a", 1)).unwrap();
/// assert_eq!(writer.into_inner().unwrap(), b"\"a\"|\"1\"\n");
/// ```
#[derive(Debug, Clone)]
pub struct DsvWriterBuilder {
    dialect: Dialect,
    quote_style: QuoteStyle,
    has_headers: bool,
    file_name: Option<String>,
}

impl Default for DsvWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DsvWriterBuilder {
    /// Creates a new `DsvWriterBuilder` with the default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    ///
    /// let builder = DsvWriterBuilder::new();
    /// ```
    pub fn new() -> DsvWriterBuilder {
        DsvWriterBuilder {
            dialect: Dialect::CSV,
            quote_style: QuoteStyle::Minimal,
            has_headers: false,
            file_name: None,
        }
    }

    /// Sets the delimiter, line terminator, quote and comment characters.
    ///
    /// # Parameters
    /// - `dialect`: A validated [`Dialect`]
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::core::dialect::Dialect;
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    ///
    /// let mut writer = DsvWriterBuilder::new()
    ///     .dialect(Dialect::TSV)
    ///     .from_writer::<_, 2>(Vec::new());
    /// writer.write_row(&("a,b", "c")).unwrap();
    /// assert_eq!(writer.into_inner().unwrap(), b"a,b\tc\n");
    /// ```
    pub fn dialect(mut self, dialect: Dialect) -> DsvWriterBuilder {
        self.dialect = dialect;
        self
    }

    /// Sets which fields are wrapped in quotes.
    ///
    /// # Parameters
    /// - `quote_style`: The [`QuoteStyle`] applied to every row and comment
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::core::quote::QuoteStyle;
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    ///
    /// let mut writer = DsvWriterBuilder::new()
    ///     .quote_style(QuoteStyle::NonNumeric)
    ///     .from_writer::<_, 2>(Vec::new());
    /// writer.write_row(&("Corsair", 16)).unwrap();
    /// assert_eq!(writer.into_inner().unwrap(), b"\"Corsair\",16\n");
    /// ```
    pub fn quote_style(mut self, quote_style: QuoteStyle) -> DsvWriterBuilder {
        self.quote_style = quote_style;
        self
    }

    /// Requires [`DsvWriter::write_header`] before the first row.
    ///
    /// # Parameters
    /// - `yes`: Whether the output starts with a header line
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    ///
    /// let mut writer = DsvWriterBuilder::new()
    ///     .has_headers(true)
    ///     .from_writer::<_, 1>(Vec::new());
    /// assert!(writer.write_row(&(1,)).is_err());
    /// writer.write_header(["id"]).unwrap();
    /// writer.write_row(&(1,)).unwrap();
    /// ```
    pub fn has_headers(mut self, yes: bool) -> DsvWriterBuilder {
        self.has_headers = yes;
        self
    }

    /// Sets the name used in error messages.
    ///
    /// Defaults to the path for [`from_path`](Self::from_path) and
    /// `<stream>` otherwise.
    ///
    /// # Parameters
    /// - `file_name`: The name to report
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    ///
    /// let writer = DsvWriterBuilder::new()
    ///     .file_name("report.csv")
    ///     .from_writer::<_, 1>(Vec::new());
    /// assert_eq!(writer.file_name(), "report.csv");
    /// ```
    pub fn file_name(mut self, file_name: impl Into<String>) -> DsvWriterBuilder {
        self.file_name = Some(file_name.into());
        self
    }

    /// Creates (or truncates) `path` for writing.
    ///
    /// # Parameters
    /// - `path`: The file to write
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    /// use rand::distr::{Alphanumeric, SampleString};
    ///
    /// let file_name = Alphanumeric.sample_string(&mut rand::rng(), 16);
    /// let path = std::env::temp_dir().join(format!("{file_name}.csv"));
    /// let mut writer = DsvWriterBuilder::new().from_path::<_, 2>(&path).unwrap();
    /// writer.write_row(&("a", 1)).unwrap();
    /// writer.close().unwrap();
    /// # std::fs::remove_file(&path).unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// `CannotOpenFile` when the file can not be created.
    pub fn from_path<P: AsRef<Path>, const N: usize>(self, path: P) -> DsvResult<DsvWriter<File, N>> {
        let path = path.as_ref();
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| path.display().to_string());
        let file = File::create(path).map_err(|source| DsvError::CannotOpenFile {
            file_name: file_name.clone(),
            source,
        })?;
        debug!("opened {file_name} for writing");
        Ok(DsvWriter::new(file, file_name, &self))
    }

    /// Creates a writer over any byte sink.
    ///
    /// # Parameters
    /// - `wtr`: The sink, buffered internally
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_writer::DsvWriterBuilder;
    ///
    /// let mut writer = DsvWriterBuilder::new().from_writer::<_, 2>(Vec::new());
    /// writer.write_row(&["x", "y"]).unwrap();
    /// assert_eq!(writer.into_inner().unwrap(), b"x,y\n");
    /// ```
    pub fn from_writer<W: Write, const N: usize>(self, wtr: W) -> DsvWriter<W, N> {
        let file_name = self.file_name.clone().unwrap_or_else(|| "<stream>".to_string());
        DsvWriter::new(wtr, file_name, &self)
    }
}
