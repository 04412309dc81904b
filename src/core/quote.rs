use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::dialect::Dialect;

/// Strategy deciding whether a field is wrapped in quotes when written.
///
/// The style only decides *whether* a field is wrapped. Once wrapped, any
/// embedded quote character is always doubled (`"` becomes `""`), whatever
/// the style. Reading does not depend on the style: a field whose first
/// character is the quote character is always unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStyle {
    /// Never quote. Fields that would read back differently are rejected by
    /// the writer.
    None,
    /// Quote only fields containing the delimiter, the quote character or
    /// the line terminator, or starting with the comment marker.
    #[default]
    Minimal,
    /// Quote every field.
    All,
    /// Quote every field that is not a number, plus numbers that would need
    /// quoting under `Minimal`.
    NonNumeric,
}

impl QuoteStyle {
    /// Whether `field` gets wrapped in quotes under this style.
    ///
    /// `numeric` tells whether the text was rendered from a numeric value.
    pub fn needs_quotes(&self, field: &str, numeric: bool, dialect: &Dialect) -> bool {
        match self {
            QuoteStyle::None => false,
            QuoteStyle::Minimal => is_special(field, dialect),
            QuoteStyle::All => true,
            QuoteStyle::NonNumeric => !numeric || is_special(field, dialect),
        }
    }

    /// Renders `field` as it appears in the output line.
    ///
    /// ```
    /// use dsv_rs::core::{dialect::Dialect, quote::QuoteStyle};
    ///
    /// let csv = Dialect::CSV;
    /// assert_eq!(QuoteStyle::Minimal.render("plain", false, &csv), "plain");
    /// assert_eq!(QuoteStyle::Minimal.render("a,\"b\"", false, &csv), "\"a,\"\"b\"\"\"");
    /// assert_eq!(QuoteStyle::NonNumeric.render("42", true, &csv), "42");
    /// assert_eq!(QuoteStyle::All.render("42", true, &csv), "\"42\"");
    /// ```
    pub fn render<'a>(&self, field: &'a str, numeric: bool, dialect: &Dialect) -> Cow<'a, str> {
        if self.needs_quotes(field, numeric, dialect) {
            let mut out = String::with_capacity(field.len() + 2);
            escape_into(field, dialect, &mut out);
            Cow::Owned(out)
        } else {
            Cow::Borrowed(field)
        }
    }

    /// Appends the rendered form of `field` to `out`.
    pub fn render_into(&self, field: &str, numeric: bool, dialect: &Dialect, out: &mut String) {
        if self.needs_quotes(field, numeric, dialect) {
            escape_into(field, dialect, out);
        } else {
            out.push_str(field);
        }
    }
}

/// Wraps `field` in the dialect's quote character, doubling embedded quotes.
pub fn escape_into(field: &str, dialect: &Dialect, out: &mut String) {
    let quote = dialect.quote();
    out.reserve(field.len() + 2);
    out.push(quote);
    for c in field.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
}

/// Whether `field` contains a character that `Minimal` quoting protects.
pub fn is_special(field: &str, dialect: &Dialect) -> bool {
    starts_with_marker(field, dialect.comment())
        || field.chars().any(|c| {
            c == dialect.delimiter()
                || c == dialect.quote()
                || c == dialect.line_terminator()
                || (c == '\r' && dialect.line_terminator() == '\n')
        })
}

/// Whether an unquoted `field` would read back as something else.
///
/// Unlike [`is_special`], a quote character in the middle of a field is
/// harmless: only a quote at the start of a field opens a quoted region.
pub fn is_ambiguous_unquoted(field: &str, dialect: &Dialect) -> bool {
    starts_with_marker(field, dialect.comment())
        || starts_with_marker(field, dialect.quote())
        || field.chars().any(|c| {
            c == dialect.delimiter()
                || c == dialect.line_terminator()
                || (c == '\r' && dialect.line_terminator() == '\n')
        })
}

fn starts_with_marker(field: &str, marker: char) -> bool {
    field.trim_start().starts_with(marker)
}

/// Marker returned when input ends inside a quoted region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclosedQuote;

/// Unwraps one raw field.
///
/// A field starting with the quote character loses its surrounding quotes
/// and doubled quotes collapse into one. Text following the closing quote is
/// kept literally. Any other field is returned unchanged.
///
/// ```
/// use dsv_rs::core::{dialect::Dialect, quote::unescape};
///
/// assert_eq!(unescape("\"a \"\"b\"\"\"", &Dialect::CSV).unwrap(), "a \"b\"");
/// assert_eq!(unescape("x\"y", &Dialect::CSV).unwrap(), "x\"y");
/// assert!(unescape("\"open", &Dialect::CSV).is_err());
/// ```
pub fn unescape<'a>(raw: &'a str, dialect: &Dialect) -> Result<Cow<'a, str>, UnclosedQuote> {
    let quote = dialect.quote();
    match raw.strip_prefix(quote) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let consumed = scan_quoted(inner, quote, &mut out).ok_or(UnclosedQuote)?;
            out.push_str(&inner[consumed..]);
            Ok(Cow::Owned(out))
        }
        None => Ok(Cow::Borrowed(raw)),
    }
}

/// Copies the body of a quoted region (opening quote already consumed) to
/// `out`, collapsing doubled quotes.
///
/// Returns the byte offset just past the closing quote, or `None` when
/// `text` ends first.
pub(crate) fn scan_quoted(text: &str, quote: char, out: &mut String) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != quote {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, next)) if next == quote => {
                out.push(quote);
                chars.next();
            }
            _ => return Some(i + c.len_utf8()),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_leaves_plain_fields_alone() {
        let csv = Dialect::CSV;
        assert!(!QuoteStyle::Minimal.needs_quotes("Corsair", false, &csv));
        assert!(!QuoteStyle::Minimal.needs_quotes("", false, &csv));
        assert!(!QuoteStyle::Minimal.needs_quotes("a#b", false, &csv));
    }

    #[test]
    fn minimal_quotes_special_fields() {
        let csv = Dialect::CSV;
        assert_eq!(QuoteStyle::Minimal.render("a,b", false, &csv), "\"a,b\"");
        assert_eq!(QuoteStyle::Minimal.render("say \"hi\"", false, &csv), "\"say \"\"hi\"\"\"");
        assert_eq!(QuoteStyle::Minimal.render("two\nlines", false, &csv), "\"two\nlines\"");
        assert_eq!(QuoteStyle::Minimal.render("#tag", false, &csv), "\"#tag\"");
        assert_eq!(QuoteStyle::Minimal.render("  #tag", false, &csv), "\"  #tag\"");
        assert_eq!(QuoteStyle::Minimal.render("cr\r", false, &csv), "\"cr\r\"");
    }

    #[test]
    fn minimal_uses_the_dialect_characters() {
        let tsv = Dialect::TSV;
        assert_eq!(QuoteStyle::Minimal.render("a,b", false, &tsv), "a,b");
        assert_eq!(QuoteStyle::Minimal.render("a\tb", false, &tsv), "\"a\tb\"");

        let dialect = Dialect::new(';', '\n', '\'', '%').unwrap();
        assert_eq!(QuoteStyle::Minimal.render("it's", false, &dialect), "'it''s'");
        assert_eq!(QuoteStyle::Minimal.render("say \"hi\"", false, &dialect), "say \"hi\"");
    }

    #[test]
    fn all_and_none() {
        let csv = Dialect::CSV;
        assert_eq!(QuoteStyle::All.render("", false, &csv), "\"\"");
        assert_eq!(QuoteStyle::All.render("a\"b", false, &csv), "\"a\"\"b\"");
        assert_eq!(QuoteStyle::None.render("a,b", false, &csv), "a,b");
    }

    #[test]
    fn non_numeric_quotes_text_only() {
        let csv = Dialect::CSV;
        assert_eq!(QuoteStyle::NonNumeric.render("3200", true, &csv), "3200");
        assert_eq!(QuoteStyle::NonNumeric.render("3200", false, &csv), "\"3200\"");

        // A numeric rendering that collides with the delimiter still gets quoted.
        let dotted = Dialect::CSV.with_delimiter('.').unwrap();
        assert_eq!(QuoteStyle::NonNumeric.render("1.5", true, &dotted), "\"1.5\"");
    }

    #[test]
    fn render_into_appends() {
        let mut out = String::from("x,");
        QuoteStyle::Minimal.render_into("a,b", false, &Dialect::CSV, &mut out);
        assert_eq!(out, "x,\"a,b\"");
    }

    #[test]
    fn ambiguity_of_unquoted_fields() {
        let csv = Dialect::CSV;
        assert!(!is_ambiguous_unquoted("ab\"c", &csv));
        assert!(is_ambiguous_unquoted("\"abc", &csv));
        assert!(is_ambiguous_unquoted("a,b", &csv));
        assert!(is_ambiguous_unquoted("# note", &csv));
        assert!(!is_ambiguous_unquoted("plain", &csv));
    }

    #[test]
    fn unescape_handles_trailing_text_and_unicode() {
        let csv = Dialect::CSV;
        assert_eq!(unescape("\"ab\"cd", &csv).unwrap(), "abcd");
        assert_eq!(unescape("\"é,ü\"", &csv).unwrap(), "é,ü");
        assert_eq!(unescape("\"\"", &csv).unwrap(), "");
        assert_eq!(unescape("plain", &csv).unwrap(), "plain");
        assert_eq!(unescape("\"a\"\"", &csv), Err(UnclosedQuote));
    }

    #[test]
    fn escape_then_unescape_restores_the_field() {
        let csv = Dialect::CSV;
        for field in ["", "\"", "\"\"", "a,\"b\",c", "line\nbreak", "日本"] {
            let mut out = String::new();
            escape_into(field, &csv, &mut out);
            assert_eq!(unescape(&out, &csv).unwrap(), field);
        }
    }
}
