//! Non-owning views into the source text

use std::fmt;

/// A slice of the original source buffer.
///
/// Views are plain values. Every operation either returns a new view into the
/// same buffer or shrinks the view in place, nothing is ever copied.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct SourceView<'a>(&'a str);

impl<'a> SourceView<'a> {
    pub fn new(text: &'a str) -> Self {
        SourceView(text)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<u8> {
        self.0.as_bytes().first().copied()
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.0.as_bytes().contains(&byte)
    }

    /// Drop leading whitespace
    pub fn strip_left(self) -> Self {
        SourceView(self.0.trim_start_matches(|c: char| c.is_ascii_whitespace()))
    }

    /// Drop trailing whitespace
    pub fn strip_right(self) -> Self {
        SourceView(self.0.trim_end_matches(|c: char| c.is_ascii_whitespace()))
    }

    pub fn strip(self) -> Self {
        self.strip_left().strip_right()
    }

    /// Split at the first `delimiter`.
    ///
    /// Returns everything up to and including the delimiter and leaves the rest
    /// in `self`. If the delimiter does not occur, the whole view is returned
    /// and `self` becomes empty (positioned at the end of the old view).
    pub fn chop(&mut self, delimiter: u8) -> SourceView<'a> {
        self.chop_by(|b| b == delimiter)
    }

    /// Like [`chop`](Self::chop), splitting at the first byte matching
    /// `is_delimiter`.
    pub fn chop_by(&mut self, is_delimiter: impl Fn(u8) -> bool) -> SourceView<'a> {
        let split = match self.0.bytes().position(is_delimiter) {
            Some(i) => i + 1,
            None => self.0.len(),
        };

        let (left, rest) = self.0.split_at(split);
        self.0 = rest;
        SourceView(left)
    }

    /// Byte offset of this view from the start of `base`.
    ///
    /// `self` has to be cut out of `base` (or be positioned at its end).
    pub fn offset_from(&self, base: SourceView<'a>) -> usize {
        let start = base.0.as_ptr() as usize;
        let here = self.0.as_ptr() as usize;
        debug_assert!(here >= start && here <= start + base.0.len());
        here - start
    }
}

impl<'a> PartialEq<&str> for SourceView<'a> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'a> fmt::Display for SourceView<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
