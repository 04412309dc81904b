use serde::{Deserialize, Serialize};

use crate::error::{DsvError, DsvResult};

/// The set of characters describing the layout of a delimited text file.
///
/// A dialect is immutable once built. [`Dialect::new`] rejects
/// configurations that would make tokenizing ambiguous:
///
/// - delimiter, quote, comment and line terminator must be pairwise distinct
/// - the line terminator must be an ASCII character
/// - when the terminator is `\n`, no other character may be `\r`, since a
///   trailing `\r` is stripped from every line to support `\r\n` files
///
/// # Examples
///
/// ```
/// use dsv_rs::core::dialect::Dialect;
///
/// let dialect = Dialect::new('|', '\n', '\'', ';').unwrap();
/// assert_eq!(dialect.delimiter(), '|');
///
/// // Delimiter and quote can not be the same character
/// assert!(Dialect::new(',', '\n', ',', '#').is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DialectFields")]
pub struct Dialect {
    delimiter: char,
    line_terminator: char,
    quote: char,
    comment: char,
}

impl Dialect {
    /// Comma separated values.
    pub const CSV: Dialect = Dialect::predefined(',');
    /// Tab separated values.
    pub const TSV: Dialect = Dialect::predefined('\t');
    /// Semicolon separated values.
    pub const SCSV: Dialect = Dialect::predefined(';');
    /// Pipe separated values.
    pub const PSV: Dialect = Dialect::predefined('|');
    /// Colon separated values.
    pub const COLON_SV: Dialect = Dialect::predefined(':');

    const fn predefined(delimiter: char) -> Dialect {
        Dialect {
            delimiter,
            line_terminator: '\n',
            quote: '"',
            comment: '#',
        }
    }

    /// Builds a validated dialect.
    pub fn new(delimiter: char, line_terminator: char, quote: char, comment: char) -> DsvResult<Self> {
        let dialect = Dialect {
            delimiter,
            line_terminator,
            quote,
            comment,
        };
        dialect.validate()?;
        Ok(dialect)
    }

    /// Returns a copy of this dialect with another delimiter.
    pub fn with_delimiter(self, delimiter: char) -> DsvResult<Self> {
        Dialect::new(delimiter, self.line_terminator, self.quote, self.comment)
    }

    /// Returns a copy of this dialect with another quote character.
    pub fn with_quote(self, quote: char) -> DsvResult<Self> {
        Dialect::new(self.delimiter, self.line_terminator, quote, self.comment)
    }

    /// Returns a copy of this dialect with another comment marker.
    pub fn with_comment(self, comment: char) -> DsvResult<Self> {
        Dialect::new(self.delimiter, self.line_terminator, self.quote, comment)
    }

    fn validate(&self) -> DsvResult<()> {
        if !self.line_terminator.is_ascii() {
            return Err(DsvError::InvalidDialect(format!(
                "line terminator {:?} is not an ASCII character",
                self.line_terminator
            )));
        }

        let roles = [
            ("delimiter", self.delimiter),
            ("line terminator", self.line_terminator),
            ("quote", self.quote),
            ("comment", self.comment),
        ];
        for (i, (name, c)) in roles.iter().enumerate() {
            for (other_name, other) in &roles[i + 1..] {
                if c == other {
                    return Err(DsvError::InvalidDialect(format!(
                        "{name} and {other_name} are both {c:?}"
                    )));
                }
            }
            if self.line_terminator == '\n' && *c == '\r' {
                return Err(DsvError::InvalidDialect(format!(
                    "{name} can not be '\\r' with a '\\n' line terminator"
                )));
            }
        }
        Ok(())
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn line_terminator(&self) -> char {
        self.line_terminator
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    pub fn comment(&self) -> char {
        self.comment
    }

    /// Line terminator as the byte the line reader splits on.
    pub(crate) fn terminator_byte(&self) -> u8 {
        // validated to be ASCII
        self.line_terminator as u8
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::CSV
    }
}

/// Unvalidated shape of a [`Dialect`] used for deserialization.
#[derive(Deserialize)]
struct DialectFields {
    delimiter: char,
    line_terminator: char,
    quote: char,
    comment: char,
}

impl TryFrom<DialectFields> for Dialect {
    type Error = DsvError;

    fn try_from(fields: DialectFields) -> Result<Self, Self::Error> {
        Dialect::new(
            fields.delimiter,
            fields.line_terminator,
            fields.quote,
            fields.comment,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Dialect;
    use crate::error::DsvError;

    #[test]
    fn predefined_dialects_are_valid() {
        for dialect in [
            Dialect::CSV,
            Dialect::TSV,
            Dialect::SCSV,
            Dialect::PSV,
            Dialect::COLON_SV,
        ] {
            let rebuilt = Dialect::new(
                dialect.delimiter(),
                dialect.line_terminator(),
                dialect.quote(),
                dialect.comment(),
            );
            assert_eq!(rebuilt.unwrap(), dialect);
        }
        assert_eq!(Dialect::default(), Dialect::CSV);
        assert_eq!(Dialect::COLON_SV.delimiter(), ':');
    }

    #[test]
    fn clashing_characters_are_rejected() {
        assert!(matches!(
            Dialect::new(',', '\n', '"', ','),
            Err(DsvError::InvalidDialect(_))
        ));
        assert!(Dialect::new('\n', '\n', '"', '#').is_err());
        assert!(Dialect::new(',', '\n', '\r', '#').is_err());
        assert!(Dialect::new(',', 'é', '"', '#').is_err());
        assert!(Dialect::CSV.with_quote('#').is_err());
    }

    #[test]
    fn unicode_delimiter_is_allowed() {
        let dialect = Dialect::CSV.with_delimiter('¦').unwrap();
        assert_eq!(dialect.delimiter(), '¦');
        assert_eq!(dialect.terminator_byte(), b'\n');
    }

    #[test]
    fn deserialization_is_validated() {
        let dialect: Dialect = serde_json::from_str(
            r#"{"delimiter":";","line_terminator":"\n","quote":"'","comment":"%"}"#,
        )
        .unwrap();
        assert_eq!(dialect.delimiter(), ';');
        assert_eq!(dialect.quote(), '\'');

        let invalid = serde_json::from_str::<Dialect>(
            r#"{"delimiter":";","line_terminator":"\n","quote":";","comment":"%"}"#,
        );
        assert!(invalid.is_err());

        let json = serde_json::to_string(&Dialect::TSV).unwrap();
        assert_eq!(serde_json::from_str::<Dialect>(&json).unwrap(), Dialect::TSV);
    }
}
