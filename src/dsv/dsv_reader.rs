use std::{
    fs::File,
    io::{BufReader, Read},
    marker::PhantomData,
    path::Path,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        dialect::Dialect,
        field::{CoercionError, OverflowPolicy},
        line::{CommentPolicy, DEFAULT_MAX_LINE_LENGTH, LineReader},
        quote::UnclosedQuote,
        row::{FieldError, FromRow},
        tokenizer::{Fields, Tokenizer, TrimPolicy},
    },
    error::{DsvError, DsvResult},
};

use super::default_column_names;

/// How the header line of a file is matched against the declared columns.
///
/// Columns are always matched by name, so the file may list them in any
/// order unless `require_order` is set.
///
/// # Examples
///
/// ```
/// use dsv_rs::dsv::dsv_reader::HeaderPolicy;
///
/// // Tolerate columns the program does not know about
/// let policy = HeaderPolicy::IGNORE_EXTRA_COLUMN;
/// assert!(policy.ignore_extra_column);
///
/// // Combine flags with struct update syntax
/// let policy = HeaderPolicy {
///     ignore_missing_column: true,
///     ..HeaderPolicy::IGNORE_EXTRA_COLUMN
/// };
/// assert!(policy.ignore_missing_column && policy.ignore_extra_column);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderPolicy {
    /// Skip header columns that were not declared instead of failing with
    /// `ExtraColumnInHeader`. Their fields are ignored in every row.
    pub ignore_extra_column: bool,
    /// Accept headers lacking declared columns instead of failing with
    /// `MissingColumnInHeader`. Missing columns read as the empty string.
    pub ignore_missing_column: bool,
    /// Declared columns must appear in declared order.
    pub require_order: bool,
}

impl HeaderPolicy {
    /// Every declared column exactly once, nothing else, any order.
    pub const IGNORE_NO_COLUMN: HeaderPolicy = HeaderPolicy {
        ignore_extra_column: false,
        ignore_missing_column: false,
        require_order: false,
    };

    pub const IGNORE_EXTRA_COLUMN: HeaderPolicy = HeaderPolicy {
        ignore_extra_column: true,
        ..HeaderPolicy::IGNORE_NO_COLUMN
    };

    pub const IGNORE_MISSING_COLUMN: HeaderPolicy = HeaderPolicy {
        ignore_missing_column: true,
        ..HeaderPolicy::IGNORE_NO_COLUMN
    };

    /// Every declared column exactly once, nothing else, in declared order.
    pub const STRICT: HeaderPolicy = HeaderPolicy {
        require_order: true,
        ..HeaderPolicy::IGNORE_NO_COLUMN
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Nothing but comments consumed yet.
    Opened,
    /// Column mapping fixed, by a header line or by `set_header`.
    HeaderRead,
    Exhausted,
}

/// Reader of delimiter-separated rows with `N` columns.
///
/// The reader owns its stream: one line is buffered at a time and the
/// stream is closed when the reader is dropped. All methods take
/// `&mut self`; a reader is never shared between threads without external
/// synchronization.
///
/// # Examples
///
/// ```
/// use dsv_rs::dsv::dsv_reader::{DsvReaderBuilder, HeaderPolicy};
///
/// let data = "\
/// vendor,size,speed
/// Corsair,16,3200
/// Kingston,32,2666
/// ";
///
/// let mut reader = DsvReaderBuilder::new().from_reader(data.as_bytes());
/// reader.read_header(HeaderPolicy::IGNORE_NO_COLUMN, ["vendor", "size", "speed"]).unwrap();
///
/// let row: Option<(String, i32, f64)> = reader.read_row().unwrap();
/// assert_eq!(row, Some(("Corsair".to_string(), 16, 3200.0)));
///
/// let row: Option<(String, i32, f64)> = reader.read_row().unwrap();
/// assert_eq!(row, Some(("Kingston".to_string(), 32, 2666.0)));
///
/// // Clean end of stream
/// assert!(reader.read_row::<(String, i32, f64)>().unwrap().is_none());
/// ```
pub struct DsvReader<R, const N: usize> {
    lines: LineReader<BufReader<R>>,
    tokenizer: Tokenizer,
    fields: Fields,
    max_line_length: usize,
    overflow: OverflowPolicy,
    column_names: [String; N],
    /// For each column of the file, the declared column it feeds.
    column_order: Vec<Option<usize>>,
    present: [bool; N],
    has_headers: bool,
    state: ReaderState,
}

impl<R: Read, const N: usize> DsvReader<R, N> {
    fn new(lines: LineReader<BufReader<R>>, tokenizer: Tokenizer, builder: &DsvReaderBuilder) -> Self {
        const { assert!(N > 0, "a reader needs at least one column") };

        DsvReader {
            lines,
            tokenizer,
            fields: Fields::new(),
            max_line_length: builder.max_line_length,
            overflow: builder.overflow,
            column_names: default_column_names(),
            column_order: (0..N).map(Some).collect(),
            present: [true; N],
            has_headers: builder.has_headers,
            state: ReaderState::Opened,
        }
    }

    /// Reads the header line and maps its columns onto `names`.
    ///
    /// The mapping holds for the rest of the stream. Comment and blank lines
    /// before the header are skipped.
    ///
    /// # Errors
    ///
    /// - `HeaderMissing` when the stream holds no line at all
    /// - `ExtraColumnInHeader`, `MissingColumnInHeader`,
    ///   `DuplicatedColumnInHeader`, `MisorderedColumnInHeader` per `policy`
    /// - `Usage` when the header or a row was already read, or when `names`
    ///   contains duplicates
    pub fn read_header(&mut self, policy: HeaderPolicy, names: [&str; N]) -> DsvResult<()> {
        self.declare_columns(names, "read_header")?;

        if !self.next_record()? {
            return Err(DsvError::HeaderMissing {
                file_name: self.file_name().to_string(),
            });
        }
        self.map_header(policy)?;
        self.state = ReaderState::HeaderRead;

        debug!(
            "header of {} mapped to {:?}",
            self.file_name(),
            self.column_order
        );
        Ok(())
    }

    /// Declares the column names of a file without a header line.
    ///
    /// Fields are taken in file order. The names only appear in error
    /// messages and in [`DsvReader::has_column`].
    pub fn set_header(&mut self, names: [&str; N]) -> DsvResult<()> {
        self.declare_columns(names, "set_header")?;
        self.state = ReaderState::HeaderRead;
        Ok(())
    }

    fn declare_columns(&mut self, names: [&str; N], operation: &str) -> DsvResult<()> {
        if self.state != ReaderState::Opened {
            return Err(DsvError::Usage(format!(
                "{operation} called after the header or a row of \"{}\" was read",
                self.file_name()
            )));
        }
        for (index, name) in names.iter().enumerate() {
            if names[..index].contains(name) {
                return Err(DsvError::Usage(format!(
                    "column \"{name}\" is declared twice"
                )));
            }
        }
        self.column_names = names.map(str::to_string);
        Ok(())
    }

    fn map_header(&mut self, policy: HeaderPolicy) -> DsvResult<()> {
        let mut order = Vec::with_capacity(self.fields.len());
        let mut present = [false; N];
        let mut last: Option<usize> = None;

        for name in self.fields.iter() {
            match self.column_names.iter().position(|declared| declared == name) {
                Some(index) => {
                    if present[index] {
                        return Err(DsvError::DuplicatedColumnInHeader {
                            file_name: self.lines.file_name().to_string(),
                            column_name: name.to_string(),
                        });
                    }
                    if policy.require_order && last.is_some_and(|previous| index < previous) {
                        return Err(DsvError::MisorderedColumnInHeader {
                            file_name: self.lines.file_name().to_string(),
                            column_name: name.to_string(),
                        });
                    }
                    present[index] = true;
                    last = Some(index);
                    order.push(Some(index));
                }
                None if policy.ignore_extra_column => {
                    warn!(
                        "ignoring column \"{name}\" in header of {}",
                        self.lines.file_name()
                    );
                    order.push(None);
                }
                None => {
                    return Err(DsvError::ExtraColumnInHeader {
                        file_name: self.lines.file_name().to_string(),
                        column_name: name.to_string(),
                    });
                }
            }
        }

        for (index, name) in self.column_names.iter().enumerate() {
            if present[index] {
                continue;
            }
            if !policy.ignore_missing_column {
                return Err(DsvError::MissingColumnInHeader {
                    file_name: self.lines.file_name().to_string(),
                    column_name: name.clone(),
                });
            }
            warn!(
                "column \"{name}\" missing in header of {}, reading it as empty",
                self.lines.file_name()
            );
        }

        self.column_order = order;
        self.present = present;
        Ok(())
    }

    /// Reads the next data row.
    ///
    /// Returns `Ok(None)` at the end of the stream, and on every call after
    /// that. A row is either converted completely or not at all.
    ///
    /// # Errors
    ///
    /// - `TooFewColumns` / `TooManyColumns` when the line does not hold
    ///   exactly as many fields as the header (or `N` without header)
    /// - `InvalidFieldFormat` / `FieldOverflow` when a field does not
    ///   convert to the requested type
    /// - `EscapedStringNotClosed` when the stream ends inside a quoted field
    /// - `Usage` when the reader was built with `has_headers(true)` and
    ///   [`DsvReader::read_header`] was not called
    pub fn read_row<T: FromRow<N>>(&mut self) -> DsvResult<Option<T>> {
        match self.state {
            ReaderState::Opened if self.has_headers => {
                return Err(DsvError::Usage(format!(
                    "read_row called before read_header on \"{}\"",
                    self.file_name()
                )));
            }
            ReaderState::Opened => self.state = ReaderState::HeaderRead,
            ReaderState::HeaderRead => {}
            ReaderState::Exhausted => return Ok(None),
        }

        if !self.next_record()? {
            debug!(
                "end of {} after {} lines",
                self.file_name(),
                self.lines.file_line()
            );
            self.state = ReaderState::Exhausted;
            return Ok(None);
        }

        let expected = self.column_order.len();
        let found = self.fields.len();
        if found < expected {
            return Err(DsvError::TooFewColumns {
                file_name: self.file_name().to_string(),
                line: self.lines.file_line(),
            });
        }
        if found > expected {
            return Err(DsvError::TooManyColumns {
                file_name: self.file_name().to_string(),
                line: self.lines.file_line(),
            });
        }

        let mut slots = [""; N];
        for (field, target) in self.fields.iter().zip(&self.column_order) {
            if let Some(index) = target {
                slots[*index] = field;
            }
        }

        match T::from_fields(&slots, self.overflow) {
            Ok(row) => Ok(Some(row)),
            Err(error) => Err(self.field_error(error, slots[error.index])),
        }
    }

    fn field_error(&self, error: FieldError, content: &str) -> DsvError {
        let file_name = self.file_name().to_string();
        let line = self.lines.file_line();
        let column_name = self.column_names[error.index].clone();
        let content = content.to_string();
        match error.kind {
            CoercionError::InvalidFormat => DsvError::InvalidFieldFormat {
                file_name,
                line,
                column_name,
                content,
                expected: error.expected,
            },
            CoercionError::Overflow => DsvError::FieldOverflow {
                file_name,
                line,
                column_name,
                content,
                expected: error.expected,
            },
        }
    }

    /// Iterates over the remaining rows.
    ///
    /// The iterator stops after the first error.
    pub fn rows<T: FromRow<N>>(&mut self) -> Rows<'_, R, T, N> {
        Rows {
            reader: self,
            failed: false,
            row: PhantomData,
        }
    }

    /// Returns the next line kept by the comment policy, without tokenizing
    /// it.
    pub fn next_line(&mut self) -> DsvResult<Option<&str>> {
        self.lines.next_line()
    }

    /// Reads the next logical line and splits it into `fields`. Returns
    /// `false` at end of stream.
    ///
    /// A quoted field left open at the end of a line is continued with the
    /// following physical lines, each of them scanned once.
    fn next_record(&mut self) -> DsvResult<bool> {
        let Some(line) = self.lines.next_line()? else {
            return Ok(false);
        };
        let mut length = line.len();
        if self.tokenizer.split(line, &mut self.fields).is_ok() {
            return Ok(true);
        }

        let mut open_field = self.fields.open_field();
        let mut open_line = self.lines.file_line();
        loop {
            let Some(continuation) = self.lines.next_physical_line()? else {
                return Err(DsvError::EscapedStringNotClosed {
                    file_name: self.file_name().to_string(),
                    line: open_line,
                });
            };
            length += continuation.len() + 1;
            let resumed = self.tokenizer.resume(continuation, &mut self.fields);
            if length > self.max_line_length {
                return Err(DsvError::LineTooLong {
                    file_name: self.file_name().to_string(),
                    line: self.lines.file_line(),
                    limit: self.max_line_length,
                });
            }
            match resumed {
                Ok(()) => return Ok(true),
                Err(UnclosedQuote) => {
                    // the line closed one field and opened another
                    if self.fields.open_field() != open_field {
                        open_field = self.fields.open_field();
                        open_line = self.lines.file_line();
                    }
                }
            }
        }
    }

    /// Whether `name` is a declared column present in the file.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_names
            .iter()
            .position(|declared| declared == name)
            .is_some_and(|index| self.present[index])
    }

    pub fn column_names(&self) -> &[String; N] {
        &self.column_names
    }

    pub fn dialect(&self) -> &Dialect {
        self.tokenizer.dialect()
    }

    pub fn file_name(&self) -> &str {
        self.lines.file_name()
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.lines.set_file_name(file_name);
    }

    /// Number of the last physical line consumed, 1-based.
    pub fn file_line(&self) -> u64 {
        self.lines.file_line()
    }

    pub fn set_file_line(&mut self, file_line: u64) {
        self.lines.set_file_line(file_line);
    }
}

/// Iterator returned by [`DsvReader::rows`].
pub struct Rows<'r, R, T, const N: usize> {
    reader: &'r mut DsvReader<R, N>,
    failed: bool,
    row: PhantomData<fn() -> T>,
}

impl<R: Read, T: FromRow<N>, const N: usize> Iterator for Rows<'_, R, T, N> {
    type Item = DsvResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.read_row() {
            Ok(row) => row.map(Ok),
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

/// A builder for configuring delimiter-separated reading.
///
/// # Default Configuration
///
/// - Dialect: [`Dialect::CSV`] (comma, double quote, `#` comments, `\n`)
/// - Trimming: none
/// - Headers: not required before reading rows
/// - Maximum line length: 16 MiB
/// - Comments: marked lines and blank lines are skipped
/// - Overflow: out-of-range numbers are errors
///
/// # Examples
///
/// ```
/// use dsv_rs::core::{dialect::Dialect, tokenizer::TrimPolicy};
/// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
///
/// let mut reader = DsvReaderBuilder::new()
///     .dialect(Dialect::TSV)
///     .trim(TrimPolicy::Spaces)
///     .file_name("inline.tsv")
///     .from_reader::<_, 2>("a \t b\n".as_bytes());
///
/// let row: (String, String) = reader.read_row().unwrap().unwrap();
/// assert_eq!(row, ("a".to_string(), "b".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct DsvReaderBuilder {
    dialect: Dialect,
    trim: TrimPolicy,
    has_headers: bool,
    file_name: Option<String>,
    max_line_length: usize,
    comments: CommentPolicy,
    overflow: OverflowPolicy,
}

impl Default for DsvReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DsvReaderBuilder {
    /// Creates a new `DsvReaderBuilder` with the default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let builder = DsvReaderBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            dialect: Dialect::CSV,
            trim: TrimPolicy::None,
            has_headers: false,
            file_name: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            comments: CommentPolicy::default(),
            overflow: OverflowPolicy::default(),
        }
    }

    /// Sets the delimiter, line terminator, quote and comment characters.
    ///
    /// # Parameters
    /// - `dialect`: A validated [`Dialect`], one of the presets or built with
    ///   [`Dialect::new`]
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::core::dialect::Dialect;
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// // Tab separated values
    /// let builder = DsvReaderBuilder::new().dialect(Dialect::TSV);
    ///
    /// // Semicolons, single quotes and `%` comments
    /// let dialect = Dialect::new(';', '\n', '\'', '%').unwrap();
    /// let builder = DsvReaderBuilder::new().dialect(dialect);
    /// ```
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets which characters are trimmed around each field.
    ///
    /// Quoted content is never trimmed.
    ///
    /// # Parameters
    /// - `trim`: The [`TrimPolicy`] applied before unquoting
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::core::tokenizer::TrimPolicy;
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let mut reader = DsvReaderBuilder::new()
    ///     .trim(TrimPolicy::Spaces)
    ///     .from_reader::<_, 2>(" a , \" b \" \n".as_bytes());
    /// let row: [String; 2] = reader.read_row().unwrap().unwrap();
    /// assert_eq!(row, ["a", " b "]);
    /// ```
    pub fn trim(mut self, trim: TrimPolicy) -> Self {
        self.trim = trim;
        self
    }

    /// Requires [`DsvReader::read_header`] before the first `read_row`.
    ///
    /// # Parameters
    /// - `yes`: Whether the stream starts with a header line
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let mut reader = DsvReaderBuilder::new()
    ///     .has_headers(true)
    ///     .from_reader::<_, 1>("id\n1\n".as_bytes());
    /// // The header was not read yet
    /// assert!(reader.read_row::<(u8,)>().is_err());
    /// ```
    pub fn has_headers(mut self, yes: bool) -> Self {
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
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let reader = DsvReaderBuilder::new()
    ///     .file_name("upload.csv")
    ///     .from_reader::<_, 1>("x\n".as_bytes());
    /// assert_eq!(reader.file_name(), "upload.csv");
    /// ```
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Caps the length in bytes of a physical line, terminator excluded.
    ///
    /// A quoted field spanning several lines is capped as a whole.
    ///
    /// # Parameters
    /// - `max_line_length`: The longest accepted line
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::DsvError;
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let mut reader = DsvReaderBuilder::new()
    ///     .max_line_length(4)
    ///     .from_reader::<_, 1>("abcd\r\nabcde\n".as_bytes());
    /// assert!(reader.read_row::<(String,)>().unwrap().is_some());
    /// assert!(matches!(
    ///     reader.read_row::<(String,)>(),
    ///     Err(DsvError::LineTooLong { line: 2, limit: 4, .. })
    /// ));
    /// ```
    pub fn max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Sets which lines are skipped as comments.
    ///
    /// Skipped lines still count in line numbers. Lines that are not
    /// skipped are data, so a blank line kept by the policy reads as a row
    /// holding one empty field.
    ///
    /// # Parameters
    /// - `comments`: The [`CommentPolicy`] of the stream
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::core::line::CommentPolicy;
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// // `#` starts ordinary data in this file
    /// let mut reader = DsvReaderBuilder::new()
    ///     .comment_policy(CommentPolicy::BlankLines)
    ///     .from_reader::<_, 2>("#1,first\n\n#2,second\n".as_bytes());
    /// let rows: Vec<(String, String)> = reader.rows().collect::<Result<_, _>>().unwrap();
    /// assert_eq!(rows[1], ("#2".to_string(), "second".to_string()));
    /// ```
    pub fn comment_policy(mut self, comments: CommentPolicy) -> Self {
        self.comments = comments;
        self
    }

    /// Sets what happens to numbers outside the range of their type.
    ///
    /// # Parameters
    /// - `overflow`: The [`OverflowPolicy`] applied to every numeric field
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::core::field::OverflowPolicy;
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let mut reader = DsvReaderBuilder::new()
    ///     .overflow_policy(OverflowPolicy::Saturate)
    ///     .from_reader::<_, 2>("300,-1\n".as_bytes());
    /// let row: (u8, u32) = reader.read_row().unwrap().unwrap();
    /// assert_eq!(row, (255, 0));
    /// ```
    pub fn overflow_policy(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Creates a reader over any byte source.
    ///
    /// # Parameters
    /// - `rdr`: The source, buffered internally
    ///
    /// # Examples
    ///
    /// ```
    /// use dsv_rs::dsv::dsv_reader::DsvReaderBuilder;
    ///
    /// let mut reader = DsvReaderBuilder::new().from_reader::<_, 2>("a,1\n".as_bytes());
    /// let row: (char, i8) = reader.read_row().unwrap().unwrap();
    /// assert_eq!(row, ('a', 1));
    /// ```
    pub fn from_reader<R: Read, const N: usize>(self, rdr: R) -> DsvReader<R, N> {
        let file_name = self.file_name.clone().unwrap_or_else(|| "<stream>".to_string());
        self.build(BufReader::new(rdr), file_name)
    }

    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// `CannotOpenFile` when the file can not be opened; this happens here,
    /// not at the first read.
    pub fn from_path<P: AsRef<Path>, const N: usize>(self, path: P) -> DsvResult<DsvReader<File, N>> {
        let path = path.as_ref();
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| path.display().to_string());
        let file = File::open(path).map_err(|source| DsvError::CannotOpenFile {
            file_name: file_name.clone(),
            source,
        })?;
        debug!("opened {file_name} for reading");
        Ok(self.build(BufReader::new(file), file_name))
    }

    fn build<R: Read, const N: usize>(self, source: BufReader<R>, file_name: String) -> DsvReader<R, N> {
        let lines = LineReader::new(source, file_name, self.dialect)
            .with_max_line_length(self.max_line_length)
            .with_comment_policy(self.comments);
        let tokenizer = Tokenizer::new(self.dialect, self.trim.clone());
        DsvReader::new(lines, tokenizer, &self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ram = (String, i32, f64);

    fn reader<const N: usize>(data: &'static str) -> DsvReader<&'static [u8], N> {
        DsvReaderBuilder::new()
            .file_name("ram.csv")
            .from_reader(data.as_bytes())
    }

    #[test]
    fn reads_header_and_rows() {
        let mut rdr = reader("vendor,size,speed\nCorsair,16,3200\nKingston,32,2666\n");
        rdr.read_header(HeaderPolicy::IGNORE_NO_COLUMN, ["vendor", "size", "speed"])
            .unwrap();
        assert_eq!(
            rdr.read_row::<Ram>().unwrap(),
            Some(("Corsair".to_string(), 16, 3200.0))
        );
        assert_eq!(
            rdr.read_row::<Ram>().unwrap(),
            Some(("Kingston".to_string(), 32, 2666.0))
        );
        assert_eq!(rdr.read_row::<Ram>().unwrap(), None);
        assert_eq!(rdr.read_row::<Ram>().unwrap(), None);
    }

    #[test]
    fn columns_are_matched_by_name() {
        let mut rdr = reader("speed,vendor,size\n3200,Corsair,16\n");
        rdr.read_header(HeaderPolicy::IGNORE_NO_COLUMN, ["vendor", "size", "speed"])
            .unwrap();
        assert_eq!(
            rdr.read_row::<Ram>().unwrap(),
            Some(("Corsair".to_string(), 16, 3200.0))
        );
    }

    #[test]
    fn strict_order_rejects_reordered_header() {
        let mut rdr = reader::<3>("speed,vendor,size\n");
        let err = rdr
            .read_header(HeaderPolicy::STRICT, ["vendor", "size", "speed"])
            .unwrap_err();
        assert!(matches!(
            err,
            DsvError::MisorderedColumnInHeader { ref column_name, .. } if column_name == "vendor"
        ));
    }

    #[test]
    fn extra_columns() {
        let mut rdr = reader::<3>("vendor,size,speed,extra\n");
        let err = rdr
            .read_header(HeaderPolicy::IGNORE_NO_COLUMN, ["vendor", "size", "speed"])
            .unwrap_err();
        assert!(matches!(
            err,
            DsvError::ExtraColumnInHeader { ref column_name, .. } if column_name == "extra"
        ));

        let mut rdr = reader("vendor,size,speed,extra\nCorsair,16,3200,ignored\n");
        rdr.read_header(HeaderPolicy::IGNORE_EXTRA_COLUMN, ["vendor", "size", "speed"])
            .unwrap();
        assert_eq!(
            rdr.read_row::<Ram>().unwrap(),
            Some(("Corsair".to_string(), 16, 3200.0))
        );
    }

    #[test]
    fn missing_and_duplicated_columns() {
        let mut rdr = reader::<3>("vendor,size\n");
        let err = rdr
            .read_header(HeaderPolicy::IGNORE_NO_COLUMN, ["vendor", "size", "speed"])
            .unwrap_err();
        assert!(matches!(
            err,
            DsvError::MissingColumnInHeader { ref column_name, .. } if column_name == "speed"
        ));

        let mut rdr = reader::<2>("vendor,size,vendor\n");
        let err = rdr
            .read_header(HeaderPolicy::IGNORE_NO_COLUMN, ["vendor", "size"])
            .unwrap_err();
        assert!(matches!(err, DsvError::DuplicatedColumnInHeader { .. }));
    }

    #[test]
    fn tolerated_missing_column_reads_empty() {
        let mut rdr = reader("vendor,size\nCorsair,16\n");
        rdr.read_header(HeaderPolicy::IGNORE_MISSING_COLUMN, ["vendor", "size", "speed"])
            .unwrap();
        assert!(rdr.has_column("size"));
        assert!(!rdr.has_column("speed"));
        assert!(!rdr.has_column("unknown"));
        let row: (String, i32, Option<f64>) = rdr.read_row().unwrap().unwrap();
        assert_eq!(row, ("Corsair".to_string(), 16, None));
    }

    #[test]
    fn empty_stream_has_no_header() {
        let mut rdr = reader::<1>("# only a comment\n\n");
        let err = rdr.read_header(HeaderPolicy::default(), ["a"]).unwrap_err();
        assert!(matches!(err, DsvError::HeaderMissing { ref file_name } if file_name == "ram.csv"));
    }

    #[test]
    fn usage_errors() {
        let mut rdr: DsvReader<_, 1> = DsvReaderBuilder::new()
            .has_headers(true)
            .from_reader("a\n1\n".as_bytes());
        assert!(matches!(rdr.read_row::<(i32,)>(), Err(DsvError::Usage(_))));

        let mut rdr = reader::<2>("a,b\n");
        assert!(matches!(
            rdr.read_header(HeaderPolicy::default(), ["a", "a"]),
            Err(DsvError::Usage(_))
        ));

        let mut rdr = reader::<1>("a\n1\n");
        rdr.read_header(HeaderPolicy::default(), ["a"]).unwrap();
        assert!(matches!(
            rdr.read_header(HeaderPolicy::default(), ["a"]),
            Err(DsvError::Usage(_))
        ));
    }

    #[test]
    fn arity_mismatch_reports_the_line() {
        let mut rdr = reader("# comment\na,b\n1,2\n3\n4,5,6\n");
        rdr.read_header(HeaderPolicy::default(), ["a", "b"]).unwrap();
        assert!(rdr.read_row::<(i32, i32)>().unwrap().is_some());
        let err = rdr.read_row::<(i32, i32)>().unwrap_err();
        assert!(matches!(err, DsvError::TooFewColumns { line: 4, .. }));
        let err = rdr.read_row::<(i32, i32)>().unwrap_err();
        assert!(matches!(err, DsvError::TooManyColumns { line: 5, .. }));
    }

    #[test]
    fn coercion_errors_carry_column_and_content() {
        let mut rdr = reader("size\n42x\n99999999999999999999\n");
        rdr.read_header(HeaderPolicy::default(), ["size"]).unwrap();

        match rdr.read_row::<(i32,)>().unwrap_err() {
            DsvError::InvalidFieldFormat {
                line,
                column_name,
                content,
                expected,
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(column_name, "size");
                assert_eq!(content, "42x");
                assert_eq!(expected, "i32");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            rdr.read_row::<(i32,)>().unwrap_err(),
            DsvError::FieldOverflow { line: 3, .. }
        ));
    }

    #[test]
    fn quoted_field_may_span_lines() {
        let mut rdr = reader("id,note\n1,\"first\n# kept\n\nlast\"\n2,plain\n");
        rdr.read_header(HeaderPolicy::default(), ["id", "note"]).unwrap();
        let row: (u32, String) = rdr.read_row().unwrap().unwrap();
        assert_eq!(row, (1, "first\n# kept\n\nlast".to_string()));
        assert_eq!(rdr.file_line(), 5);
        let row: (u32, String) = rdr.read_row().unwrap().unwrap();
        assert_eq!(row, (2, "plain".to_string()));
    }

    #[test]
    fn unclosed_quote_reports_the_line_it_opened_on() {
        let mut rdr = reader::<2>("1,\"never closed\nstill open\n");
        let err = rdr.read_row::<(u32, String)>().unwrap_err();
        assert!(matches!(err, DsvError::EscapedStringNotClosed { line: 1, .. }));

        // the second line closes the first field and opens another one
        let mut rdr = reader::<3>("\"a\nb\",\"c\nd\ne\n");
        let err = rdr.read_row::<[String; 3]>().unwrap_err();
        assert!(matches!(err, DsvError::EscapedStringNotClosed { line: 2, .. }));
    }

    #[test]
    fn spanning_record_is_capped_as_a_whole() {
        let mut rdr: DsvReader<_, 1> = DsvReaderBuilder::new()
            .max_line_length(8)
            .from_reader("\"abc\ndef\nghi\"\n".as_bytes());
        assert!(matches!(
            rdr.read_row::<(String,)>(),
            Err(DsvError::LineTooLong { line: 3, limit: 8, .. })
        ));
    }

    #[test]
    fn overflow_policy_is_applied_to_rows() {
        let mut rdr: DsvReader<_, 3> = DsvReaderBuilder::new()
            .overflow_policy(OverflowPolicy::Saturate)
            .from_reader("size,speed,delta\n70000,1e999,-129\n".as_bytes());
        rdr.read_header(HeaderPolicy::STRICT, ["size", "speed", "delta"])
            .unwrap();
        let row: (u16, f64, i8) = rdr.read_row().unwrap().unwrap();
        assert_eq!(row, (u16::MAX, f64::MAX, i8::MIN));

        let mut rdr: DsvReader<_, 1> = DsvReaderBuilder::new()
            .overflow_policy(OverflowPolicy::Ignore)
            .from_reader("256\nabc\n".as_bytes());
        assert_eq!(rdr.read_row::<(u8,)>().unwrap(), Some((0,)));
        // format errors are never ignored
        assert!(matches!(
            rdr.read_row::<(u8,)>(),
            Err(DsvError::InvalidFieldFormat { line: 2, .. })
        ));
    }

    #[test]
    fn comment_policy_decides_what_is_data() {
        let data = "#1,a\n\n2,b\n";

        let mut rdr: DsvReader<_, 2> = DsvReaderBuilder::new()
            .comment_policy(CommentPolicy::BlankLines)
            .from_reader(data.as_bytes());
        let rows: Vec<(String, char)> = rdr.rows().collect::<DsvResult<_>>().unwrap();
        assert_eq!(rows, [("#1".to_string(), 'a'), ("2".to_string(), 'b')]);

        let mut rdr: DsvReader<_, 2> = DsvReaderBuilder::new()
            .comment_policy(CommentPolicy::None)
            .from_reader(data.as_bytes());
        assert!(rdr.read_row::<(String, char)>().unwrap().is_some());
        assert!(matches!(
            rdr.read_row::<(String, char)>(),
            Err(DsvError::TooFewColumns { line: 2, .. })
        ));

        let mut rdr: DsvReader<_, 1> = DsvReaderBuilder::new()
            .comment_policy(CommentPolicy::Marker)
            .from_reader("#skipped\n\nx\n".as_bytes());
        let rows: Vec<(Option<char>,)> = rdr.rows().collect::<DsvResult<_>>().unwrap();
        assert_eq!(rows, [(None,), (Some('x'),)]);
    }

    #[test]
    fn headerless_reading_with_declared_names() {
        let mut rdr = reader("1,x\n2,y\n");
        rdr.set_header(["id", "label"]).unwrap();
        let rows = rdr.rows::<(u8, char)>().collect::<DsvResult<Vec<_>>>().unwrap();
        assert_eq!(rows, [(1, 'x'), (2, 'y')]);
        assert_eq!(rdr.column_names(), &["id".to_string(), "label".to_string()]);
    }

    #[test]
    fn default_column_names_show_in_errors() {
        let mut rdr = reader::<2>("1,x\n");
        let err = rdr.read_row::<(u8, u8)>().unwrap_err();
        assert!(matches!(
            err,
            DsvError::InvalidFieldFormat { ref column_name, .. } if column_name == "col2"
        ));
        // header can not be read once rows were read
        assert!(matches!(
            rdr.read_header(HeaderPolicy::default(), ["a", "b"]),
            Err(DsvError::Usage(_))
        ));
    }

    #[test]
    fn rows_iterator_stops_after_error() {
        let mut rdr = reader::<1>("1\nx\n3\n");
        let results: Vec<_> = rdr.rows::<[u8; 1]>().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn raw_line_access() {
        let mut rdr = reader::<1>("# c\nraw,line\n");
        assert_eq!(rdr.next_line().unwrap(), Some("raw,line"));
        assert_eq!(rdr.file_line(), 2);
        rdr.set_file_line(100);
        rdr.set_file_name("renamed");
        assert_eq!(rdr.file_name(), "renamed");
        assert_eq!(rdr.next_line().unwrap(), None);
    }

    #[test]
    fn missing_file_fails_at_construction() {
        let result = DsvReaderBuilder::new().from_path::<_, 3>("/nonexistent/dir/ram.csv");
        match result {
            Err(DsvError::CannotOpenFile { file_name, source }) => {
                assert_eq!(file_name, "/nonexistent/dir/ram.csv");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("opening a missing file succeeded"),
        }
    }

    #[test]
    fn header_policy_from_config() {
        let policy: HeaderPolicy = serde_json::from_str(r#"{"ignore_extra_column":true}"#).unwrap();
        assert_eq!(policy, HeaderPolicy::IGNORE_EXTRA_COLUMN);
    }
}
