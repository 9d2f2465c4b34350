use crate::view::SourceView;
use std::fmt;

/// Identifies the source buffer a token came from
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq)]
pub struct SourceId(pub u32);

/// Where a token starts. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Location {
    pub source: SourceId,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum TokenKind {
    Eof,

    Int,
    Float,
    Str,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusF,
    MinusF,
    StarF,
    SlashF,

    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,

    Dup,
    Over,
    Swap,
    Drop,
    Rot,

    Dot,

    /// A word that is not reserved
    Ident,
}

impl TokenKind {
    /// Look up a reserved word
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "+" => TokenKind::Plus,
            "-" => TokenKind::Minus,
            "*" => TokenKind::Star,
            "/" => TokenKind::Slash,
            "%" => TokenKind::Percent,
            "+." => TokenKind::PlusF,
            "-." => TokenKind::MinusF,
            "*." => TokenKind::StarF,
            "/." => TokenKind::SlashF,
            "=" => TokenKind::Eq,
            "!=" => TokenKind::Neq,
            "<" => TokenKind::Lt,
            "<=" => TokenKind::Le,
            ">" => TokenKind::Gt,
            ">=" => TokenKind::Ge,
            "dup" => TokenKind::Dup,
            "over" => TokenKind::Over,
            "swap" => TokenKind::Swap,
            "drop" => TokenKind::Drop,
            "rot" => TokenKind::Rot,
            "." => TokenKind::Dot,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "eof",
            TokenKind::Int => "int",
            TokenKind::Float => "float",
            TokenKind::Str => "str",
            TokenKind::Dup
            | TokenKind::Over
            | TokenKind::Swap
            | TokenKind::Drop
            | TokenKind::Rot => "word",
            TokenKind::Dot => "print",
            TokenKind::Ident => "ident",
            _ => "op",
        }
    }
}

/// A located piece of source text
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Token<'a> {
    pub loc: Location,
    pub text: SourceView<'a>,
    pub kind: TokenKind,
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Eof {
            write!(f, "{}: eof", self.loc)
        } else {
            write!(f, "{}: {} {}", self.loc, self.kind.name(), self.text)
        }
    }
}
