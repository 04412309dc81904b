use std::io::{BufRead, Read};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{DsvError, DsvResult};

use super::dialect::Dialect;

/// Default upper bound for the length of one physical line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1 << 24;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which lines [`LineReader::next_line`] skips.
///
/// A blank line has no characters at all. A comment line is one whose first
/// non-whitespace character is the dialect's comment marker. Lines that are
/// not skipped are data: a blank line then reads as one empty field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentPolicy {
    /// Skip nothing.
    None,
    /// Skip blank lines only; the comment marker has no meaning.
    BlankLines,
    /// Skip comment lines only.
    Marker,
    /// Skip comment lines and blank lines.
    #[default]
    MarkerAndBlankLines,
}

impl CommentPolicy {
    fn skips_blank_lines(self) -> bool {
        matches!(self, CommentPolicy::BlankLines | CommentPolicy::MarkerAndBlankLines)
    }

    fn skips_marked_lines(self) -> bool {
        matches!(self, CommentPolicy::Marker | CommentPolicy::MarkerAndBlankLines)
    }
}

/// Buffered, line-at-a-time reader over a byte stream.
///
/// Lines are split on the dialect's line terminator; when the terminator is
/// `\n`, a trailing `\r` is dropped as well so `\r\n` files read the same as
/// `\n` files. Only the current line is held in memory.
///
/// The line counter advances on every physical line consumed, comments and
/// blank lines included, so the numbers reported in errors match the file.
pub struct LineReader<R> {
    source: R,
    file_name: String,
    dialect: Dialect,
    comments: CommentPolicy,
    max_line_length: usize,
    file_line: u64,
    bytes: Vec<u8>,
    line: String,
    at_start: bool,
    eof: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(source: R, file_name: impl Into<String>, dialect: Dialect) -> Self {
        LineReader {
            source,
            file_name: file_name.into(),
            dialect,
            comments: CommentPolicy::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            file_line: 0,
            bytes: Vec::new(),
            line: String::new(),
            at_start: true,
            eof: false,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn with_comment_policy(mut self, comments: CommentPolicy) -> Self {
        self.comments = comments;
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    /// Number of the last physical line consumed, 1-based. `0` before the
    /// first read.
    pub fn file_line(&self) -> u64 {
        self.file_line
    }

    /// Overrides the line counter, e.g. when the stream does not start at
    /// the beginning of a file.
    pub fn set_file_line(&mut self, file_line: u64) {
        self.file_line = file_line;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Returns the next line not skipped by the [`CommentPolicy`].
    pub fn next_line(&mut self) -> DsvResult<Option<&str>> {
        loop {
            if !self.read_physical()? {
                return Ok(None);
            }
            if self.line.is_empty() {
                if self.comments.skips_blank_lines() {
                    trace!("skipping blank line {} of {}", self.file_line, self.file_name);
                    continue;
                }
                return Ok(Some(&self.line));
            }
            if self.comments.skips_marked_lines()
                && self.line.trim_start().starts_with(self.dialect.comment())
            {
                trace!("skipping comment line {} of {}", self.file_line, self.file_name);
                continue;
            }
            return Ok(Some(&self.line));
        }
    }

    /// Reads the next physical line as is, without skipping comments or
    /// blank lines. Used to continue a quoted field across lines.
    pub fn next_physical_line(&mut self) -> DsvResult<Option<&str>> {
        if self.read_physical()? {
            Ok(Some(&self.line))
        } else {
            Ok(None)
        }
    }

    fn read_physical(&mut self) -> DsvResult<bool> {
        if self.eof {
            return Ok(false);
        }

        self.bytes.clear();
        let terminator = self.dialect.terminator_byte();
        // room for the terminator, and for the '\r' of a "\r\n" ending
        let limit = self.max_line_length as u64 + if terminator == b'\n' { 2 } else { 1 };
        let read = (&mut self.source)
            .take(limit)
            .read_until(terminator, &mut self.bytes)
            .map_err(|source| DsvError::Io {
                file_name: self.file_name.clone(),
                line: self.file_line + 1,
                source,
            })?;
        if read == 0 {
            self.eof = true;
            self.line.clear();
            return Ok(false);
        }
        self.file_line += 1;

        let mut content: &[u8] = &self.bytes;
        content = content.strip_suffix(&[terminator]).unwrap_or(content);
        if terminator == b'\n' {
            content = content.strip_suffix(b"\r").unwrap_or(content);
        }
        if content.len() > self.max_line_length {
            return Err(DsvError::LineTooLong {
                file_name: self.file_name.clone(),
                line: self.file_line,
                limit: self.max_line_length,
            });
        }
        if self.at_start {
            self.at_start = false;
            content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        }

        let text = std::str::from_utf8(content).map_err(|_| DsvError::InvalidUtf8 {
            file_name: self.file_name.clone(),
            line: self.file_line,
        })?;
        self.line.clear();
        self.line.push_str(text);
        Ok(true)
    }
}
