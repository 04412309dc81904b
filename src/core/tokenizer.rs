use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{
    dialect::Dialect,
    quote::{UnclosedQuote, scan_quoted},
};

/// Characters removed from both ends of every raw field before unquoting.
///
/// Whitespace inside a quoted region is never trimmed. The dialect's
/// delimiter is never trimmed, even when listed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPolicy {
    /// Keep fields as they are.
    #[default]
    None,
    /// Trim spaces and tabs.
    Spaces,
    /// Trim the given characters.
    Chars(Vec<char>),
}

impl TrimPolicy {
    fn trims(&self, c: char, dialect: &Dialect) -> bool {
        if c == dialect.delimiter() {
            return false;
        }
        match self {
            TrimPolicy::None => false,
            TrimPolicy::Spaces => c == ' ' || c == '\t',
            TrimPolicy::Chars(chars) => chars.contains(&c),
        }
    }
}

/// Why a line could not be split into the expected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeError {
    /// The line ended inside a quoted field.
    UnclosedQuote,
    TooFewColumns { found: usize },
    TooManyColumns { found: usize },
}

impl From<UnclosedQuote> for TokenizeError {
    fn from(_: UnclosedQuote) -> Self {
        TokenizeError::UnclosedQuote
    }
}

/// Unescaped fields of one line.
///
/// All fields share one text buffer that is reused from line to line, so
/// splitting a line does not allocate once the buffer has grown to the
/// widest line seen.
#[derive(Debug, Default, Clone)]
pub struct Fields {
    text: String,
    spans: Vec<Range<usize>>,
    /// Start in `text` of a quoted field the line ended in.
    open: Option<usize>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.spans.get(index).map(|span| &self.text[span.clone()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans.iter().map(|span| &self.text[span.clone()])
    }

    /// Whether the last split ended inside a quoted field.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Position of the open quoted field, changing whenever another field
    /// opens.
    pub(crate) fn open_field(&self) -> Option<usize> {
        self.open
    }

    fn clear(&mut self) {
        self.text.clear();
        self.spans.clear();
        self.open = None;
    }
}

/// Splits one logical line into fields according to a dialect.
///
/// Scanning goes left to right. Outside quotes the delimiter ends a field.
/// A field whose first character (after trimming) is the quote character is
/// quoted: inside it the delimiter is literal, a doubled quote stands for
/// one quote and a single quote closes the region. A quote anywhere else is
/// an ordinary character. A trailing delimiter yields a final empty field.
///
/// ```
/// use dsv_rs::core::{dialect::Dialect, tokenizer::{Fields, TrimPolicy, Tokenizer}};
///
/// let tokenizer = Tokenizer::new(Dialect::CSV, TrimPolicy::None);
/// let mut fields = Fields::new();
/// tokenizer.split("Corsair,\"16,32\",", &mut fields).unwrap();
/// assert_eq!(fields.iter().collect::<Vec<_>>(), ["Corsair", "16,32", ""]);
/// ```
#[derive(Debug, Clone)]
pub struct Tokenizer {
    dialect: Dialect,
    trim: TrimPolicy,
}

impl Tokenizer {
    pub fn new(dialect: Dialect, trim: TrimPolicy) -> Self {
        Tokenizer { dialect, trim }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Splits `line` into `fields`, replacing their previous content.
    ///
    /// Fails with [`UnclosedQuote`] when the line ends inside a quoted
    /// field. The fields read so far are kept and [`Tokenizer::resume`]
    /// continues the open field with the next physical line.
    pub fn split(&self, line: &str, fields: &mut Fields) -> Result<(), UnclosedQuote> {
        fields.clear();
        self.scan(line, fields)
    }

    /// Continues a record whose last field was left open by
    /// [`Tokenizer::split`] or a previous `resume`.
    ///
    /// The line terminator is appended to the open field, then only
    /// `continuation` is scanned. Does nothing when no field is open.
    pub fn resume(&self, continuation: &str, fields: &mut Fields) -> Result<(), UnclosedQuote> {
        let Some(start) = fields.open.take() else {
            return Ok(());
        };
        fields.text.push(self.dialect.line_terminator());
        match scan_quoted(continuation, self.dialect.quote(), &mut fields.text) {
            Some(consumed) => {
                let protected = fields.text.len();
                match self.finish_field(&continuation[consumed..], start, protected, fields) {
                    Some(remaining) => self.scan(remaining, fields),
                    None => Ok(()),
                }
            }
            None => {
                fields.open = Some(start);
                Err(UnclosedQuote)
            }
        }
    }

    fn scan(&self, line: &str, fields: &mut Fields) -> Result<(), UnclosedQuote> {
        let quote = self.dialect.quote();
        let mut rest = line;
        loop {
            let start = fields.text.len();
            let raw = rest.trim_start_matches(|c: char| self.trim.trims(c, &self.dialect));

            // `protected` marks the end of the quoted part, which trimming
            // must not touch.
            let (after, protected) = match raw.strip_prefix(quote) {
                Some(inner) => match scan_quoted(inner, quote, &mut fields.text) {
                    Some(consumed) => (&inner[consumed..], fields.text.len()),
                    None => {
                        fields.open = Some(start);
                        return Err(UnclosedQuote);
                    }
                },
                None => (raw, start),
            };

            match self.finish_field(after, start, protected, fields) {
                Some(remaining) => rest = remaining,
                None => return Ok(()),
            }
        }
    }

    /// Appends the text up to the next delimiter to the field starting at
    /// `start`, trims it and closes it. Returns what follows the delimiter.
    fn finish_field<'a>(
        &self,
        after: &'a str,
        start: usize,
        protected: usize,
        fields: &mut Fields,
    ) -> Option<&'a str> {
        let delimiter = self.dialect.delimiter();
        let (tail, next) = match after.find(delimiter) {
            Some(pos) => (&after[..pos], Some(&after[pos + delimiter.len_utf8()..])),
            None => (after, None),
        };
        fields.text.push_str(tail);
        let kept = fields.text[protected..]
            .trim_end_matches(|c: char| self.trim.trims(c, &self.dialect))
            .len();
        fields.text.truncate(protected + kept);
        fields.spans.push(start..fields.text.len());
        next
    }

    /// Splits `line` and checks that it holds exactly `column_count` fields.
    pub fn split_exact(
        &self,
        line: &str,
        column_count: usize,
        fields: &mut Fields,
    ) -> Result<(), TokenizeError> {
        self.split(line, fields)?;
        let found = fields.len();
        if found < column_count {
            Err(TokenizeError::TooFewColumns { found })
        } else if found > column_count {
            Err(TokenizeError::TooManyColumns { found })
        } else {
            Ok(())
        }
    }
}
