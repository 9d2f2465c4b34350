use crate::{
    arena::Arena,
    token::{Location, SourceId, Token, TokenKind},
    view::SourceView,
};
use tracing::debug;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TokenizeError {
    #[error("{loc}: string literal is not terminated")]
    UnterminatedString { loc: Location },
    #[error("{loc}: number '{word}' has more than one decimal point")]
    MultipleDecimalPoints { loc: Location, word: String },
    #[error("{loc}: malformed number '{word}'")]
    MalformedNumber { loc: Location, word: String },
}

type LResult<T> = Result<T, TokenizeError>;

/// Split `text` into tokens and store them in `tokens`, finishing with an
/// `Eof` token.
pub fn tokenize<'a>(
    text: &'a str,
    source: SourceId,
    tokens: &mut Arena<Token<'a>>,
) -> LResult<()> {
    let before = tokens.len();
    Lexer::new(text, source, tokens).run()?;
    debug!(count = tokens.len() - before, "tokenized source");
    Ok(())
}

struct Lexer<'a, 'r> {
    source: SourceId,
    text: SourceView<'a>,
    line_no: usize,
    /// Column right after the previous token
    end: Location,
    tokens: &'r mut Arena<Token<'a>>,
}

impl<'a, 'r> Lexer<'a, 'r> {
    fn new(text: &'a str, source: SourceId, tokens: &'r mut Arena<Token<'a>>) -> Self {
        Lexer {
            source,
            text: SourceView::new(text),
            line_no: 0,
            end: Location {
                source,
                line: 1,
                col: 1,
            },
            tokens,
        }
    }

    fn run(mut self) -> LResult<()> {
        loop {
            let line = self.text.chop(b'\n');
            self.line_no += 1;

            // A blank line (or running out of text) ends the program
            if line.strip().is_empty() {
                let eof = SourceView::new(&line.as_str()[..0]);
                self.emit(self.end, eof, TokenKind::Eof);
                return Ok(());
            }

            self.read_line(line)?;
        }
    }

    fn read_line(&mut self, line: SourceView<'a>) -> LResult<()> {
        let mut rest = line;

        loop {
            rest = rest.strip_left();
            if rest.is_empty() {
                return Ok(());
            }

            let loc = self.location(rest, line);
            if rest.first() == Some(b'"') {
                self.read_str_literal(&mut rest, loc)?;
            } else {
                let word = rest.chop_by(|b| b.is_ascii_whitespace()).strip_right();
                self.read_word(word, loc)?;
            }
        }
    }

    /// Read a string literal that starts and ends with '"' on the same line
    fn read_str_literal(&mut self, rest: &mut SourceView<'a>, loc: Location) -> LResult<()> {
        let _ = rest.chop(b'"');
        let body = rest.chop(b'"');

        let inner = match body.as_str().strip_suffix('"') {
            Some(inner) => SourceView::new(inner),
            None => return Err(TokenizeError::UnterminatedString { loc }),
        };

        self.emit(loc, inner, TokenKind::Str);
        self.end.col = loc.col + inner.len() + 2;
        Ok(())
    }

    /// Classify a whitespace separated word
    fn read_word(&mut self, word: SourceView<'a>, loc: Location) -> LResult<()> {
        let kind = if starts_number(word.as_str()) {
            number_kind(word, loc)?
        } else {
            TokenKind::keyword(word.as_str()).unwrap_or(TokenKind::Ident)
        };

        self.emit(loc, word, kind);
        self.end.col = loc.col + word.len();
        Ok(())
    }

    fn emit(&mut self, loc: Location, text: SourceView<'a>, kind: TokenKind) {
        let token = Token { loc, text, kind };
        debug!("{}", token);

        self.tokens.alloc(token);
        self.end = loc;
    }

    fn location(&self, at: SourceView<'a>, line: SourceView<'a>) -> Location {
        Location {
            source: self.source,
            line: self.line_no,
            col: at.offset_from(line) + 1,
        }
    }
}

/// A digit, or a minus sign directly followed by a digit
fn starts_number(word: &str) -> bool {
    let bytes = word.as_bytes();
    match bytes.first() {
        Some(b'-') => bytes.get(1).is_some_and(u8::is_ascii_digit),
        Some(b) => b.is_ascii_digit(),
        None => false,
    }
}

/// Accepts `-?[0-9]+(\.[0-9]+)?`
fn number_kind(word: SourceView<'_>, loc: Location) -> LResult<TokenKind> {
    let malformed = || TokenizeError::MalformedNumber {
        loc,
        word: word.to_string(),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let mut fraction = word;
    let whole = fraction.chop(b'.');

    if !whole.contains(b'.') {
        let digits = whole.as_str().trim_start_matches('-');
        return if all_digits(digits) {
            Ok(TokenKind::Int)
        } else {
            Err(malformed())
        };
    }

    if fraction.contains(b'.') {
        return Err(TokenizeError::MultipleDecimalPoints {
            loc,
            word: word.to_string(),
        });
    }

    let digits = whole.as_str().trim_start_matches('-').trim_end_matches('.');
    if all_digits(digits) && all_digits(fraction.as_str()) {
        Ok(TokenKind::Float)
    } else {
        Err(malformed())
    }
}

/// Pull-based reader over tokens stored in an arena
pub struct TokenStream<'r, 'a> {
    tokens: &'r Arena<Token<'a>>,
    chunk: usize,
    index: usize,
}

impl<'r, 'a> TokenStream<'r, 'a> {
    pub fn new(tokens: &'r Arena<Token<'a>>) -> Self {
        TokenStream {
            tokens,
            chunk: 0,
            index: 0,
        }
    }

    /// Get the next token, moving on to the following chunk when the current
    /// one is used up.
    pub fn next_token(&mut self) -> Option<&'r Token<'a>> {
        loop {
            let chunk = self.tokens.chunk(self.chunk)?;
            if let Some(token) = chunk.get(self.index) {
                self.index += 1;
                return Some(token);
            }

            self.chunk += 1;
            self.index = 0;
        }
    }
}

impl<'r, 'a> Iterator for TokenStream<'r, 'a> {
    type Item = &'r Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
