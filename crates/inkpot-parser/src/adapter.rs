//! Bridges the inkpot lexer to the generated LALRPOP parser and turns parser
//! failures into positioned diagnostics.

use std::fmt;

use inkpot_lexer::{LexError, Lexer, Position, Spanned, Token};

/// Error type threaded through the generated parser: lexical errors and
/// errors raised by fallible grammar actions.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl GrammarError {
    pub fn new(message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            message: message.into(),
            start,
            end,
        }
    }
}

impl From<LexError> for GrammarError {
    fn from(err: LexError) -> Self {
        Self::new(err.to_string(), err.offset, err.offset)
    }
}

/// Feeds lexer tokens to the parser in the triple form it expects.
pub struct LexerAdapter<'input> {
    lexer: Lexer<'input>,
}

impl<'input> LexerAdapter<'input> {
    pub fn new(lexer: Lexer<'input>) -> Self {
        Self { lexer }
    }
}

impl Iterator for LexerAdapter<'_> {
    type Item = Result<Spanned, GrammarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lexer.next().map(|item| item.map_err(GrammarError::from))
    }
}

/// A syntax error with its location in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Byte offset where the error was detected.
    pub offset: usize,
    pub position: Position,
}

impl ParseError {
    pub(crate) fn from_lalrpop(
        source: &str,
        err: lalrpop_util::ParseError<usize, Token, GrammarError>,
    ) -> Self {
        use lalrpop_util::ParseError as Lalrpop;

        let (message, offset) = match err {
            Lalrpop::InvalidToken { location } => ("invalid token".to_string(), location),
            Lalrpop::UnrecognizedEof { location, .. } => {
                ("unexpected end of input".to_string(), location)
            }
            Lalrpop::UnrecognizedToken {
                token: (start, token, _),
                expected,
            } => (unexpected_token_message(&token, &expected), start),
            Lalrpop::ExtraToken {
                token: (start, token, _),
            } => (format!("unexpected {}", token), start),
            Lalrpop::User { error } => (error.message, error.start),
        };

        Self {
            message,
            offset,
            position: Position::of(source, offset),
        }
    }
}

fn unexpected_token_message(token: &Token, expected: &[String]) -> String {
    match token {
        Token::Indent => "unexpected indent".to_string(),
        _ if expected.iter().any(|e| e == "\"indent\"") => {
            "expected an indented block".to_string()
        }
        Token::Newline => "invalid syntax: unexpected end of line".to_string(),
        other => format!("invalid syntax: unexpected {}", other),
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}
