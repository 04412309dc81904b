use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type DsvResult<T> = Result<T, DsvError>;

#[derive(Error, Debug)]
/// Errors raised while reading or writing delimiter-separated values.
///
/// Every variant keeps its context as structured fields so callers can match
/// on them as well as display them. Line numbers are 1-based and count every
/// physical line, including comments and blank lines.
pub enum DsvError {
    #[error("Can not open file \"{file_name}\" because \"{source}\".")]
    CannotOpenFile {
        file_name: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on line {line} of file \"{file_name}\": {source}")]
    Io {
        file_name: String,
        line: u64,
        #[source]
        source: io::Error,
    },

    #[error("Line {line} in file \"{file_name}\" is not valid UTF-8.")]
    InvalidUtf8 { file_name: String, line: u64 },

    #[error("Line {line} in file \"{file_name}\" exceeds the maximum length of {limit} bytes.")]
    LineTooLong {
        file_name: String,
        line: u64,
        limit: usize,
    },

    #[error("Header missing in file \"{file_name}\".")]
    HeaderMissing { file_name: String },

    #[error("Extra column \"{column_name}\" in header of file \"{file_name}\".")]
    ExtraColumnInHeader {
        file_name: String,
        column_name: String,
    },

    #[error("Missing column \"{column_name}\" in header of file \"{file_name}\".")]
    MissingColumnInHeader {
        file_name: String,
        column_name: String,
    },

    #[error("Duplicated column \"{column_name}\" in header of file \"{file_name}\".")]
    DuplicatedColumnInHeader {
        file_name: String,
        column_name: String,
    },

    #[error("Column \"{column_name}\" is out of order in header of file \"{file_name}\".")]
    MisorderedColumnInHeader {
        file_name: String,
        column_name: String,
    },

    #[error("Too few columns in line {line} in file \"{file_name}\".")]
    TooFewColumns { file_name: String, line: u64 },

    #[error("Too many columns in line {line} in file \"{file_name}\".")]
    TooManyColumns { file_name: String, line: u64 },

    #[error("Escaped string was not closed in line {line} in file \"{file_name}\".")]
    EscapedStringNotClosed { file_name: String, line: u64 },

    #[error(
        "The content \"{content}\" of column \"{column_name}\" in line {line} in file \"{file_name}\" is not a valid {expected}."
    )]
    InvalidFieldFormat {
        file_name: String,
        line: u64,
        column_name: String,
        content: String,
        expected: &'static str,
    },

    #[error(
        "The integer \"{content}\" of column \"{column_name}\" in line {line} in file \"{file_name}\" is out of range for {expected}."
    )]
    FieldOverflow {
        file_name: String,
        line: u64,
        column_name: String,
        content: String,
        expected: &'static str,
    },

    #[error(
        "The content \"{content}\" of column \"{column_name}\" can not be written to line {line} of file \"{file_name}\" without quoting."
    )]
    UnquotableField {
        file_name: String,
        line: u64,
        column_name: String,
        content: String,
    },

    #[error("Invalid dialect: {0}")]
    InvalidDialect(String),

    #[error("Usage error: {0}")]
    Usage(String),
}

impl DsvError {
    /// Name of the file the error refers to, when there is one.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            DsvError::CannotOpenFile { file_name, .. }
            | DsvError::Io { file_name, .. }
            | DsvError::InvalidUtf8 { file_name, .. }
            | DsvError::LineTooLong { file_name, .. }
            | DsvError::HeaderMissing { file_name }
            | DsvError::ExtraColumnInHeader { file_name, .. }
            | DsvError::MissingColumnInHeader { file_name, .. }
            | DsvError::DuplicatedColumnInHeader { file_name, .. }
            | DsvError::MisorderedColumnInHeader { file_name, .. }
            | DsvError::TooFewColumns { file_name, .. }
            | DsvError::TooManyColumns { file_name, .. }
            | DsvError::EscapedStringNotClosed { file_name, .. }
            | DsvError::InvalidFieldFormat { file_name, .. }
            | DsvError::FieldOverflow { file_name, .. }
            | DsvError::UnquotableField { file_name, .. } => Some(file_name),
            DsvError::InvalidDialect(_) | DsvError::Usage(_) => None,
        }
    }

    /// 1-based line the error was detected on, when it is tied to a line.
    pub fn line(&self) -> Option<u64> {
        match self {
            DsvError::Io { line, .. }
            | DsvError::InvalidUtf8 { line, .. }
            | DsvError::LineTooLong { line, .. }
            | DsvError::TooFewColumns { line, .. }
            | DsvError::TooManyColumns { line, .. }
            | DsvError::EscapedStringNotClosed { line, .. }
            | DsvError::InvalidFieldFormat { line, .. }
            | DsvError::FieldOverflow { line, .. }
            | DsvError::UnquotableField { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DsvError;

    #[test]
    fn messages_carry_context() {
        let err = DsvError::TooFewColumns {
            file_name: "ram.csv".to_string(),
            line: 4,
        };
        assert_eq!(err.to_string(), "Too few columns in line 4 in file \"ram.csv\".");
        assert_eq!(err.file_name(), Some("ram.csv"));
        assert_eq!(err.line(), Some(4));

        let err = DsvError::InvalidFieldFormat {
            file_name: "ram.csv".to_string(),
            line: 2,
            column_name: "size".to_string(),
            content: "42x".to_string(),
            expected: "i32",
        };
        assert_eq!(
            err.to_string(),
            "The content \"42x\" of column \"size\" in line 2 in file \"ram.csv\" is not a valid i32."
        );
    }

    #[test]
    fn usage_errors_have_no_location() {
        let err = DsvError::Usage("read_row called before read_header".to_string());
        assert_eq!(err.file_name(), None);
        assert_eq!(err.line(), None);
    }
}
