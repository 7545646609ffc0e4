//! Lexer for inkpot notebook cells.
//!
//! Produces a flat token stream for the Python subset that cells are written
//! in. Indentation is turned into explicit `Indent`/`Dedent` tokens and every
//! logical line ends in a `Newline`, so the grammar never has to look at
//! whitespace. Newlines inside brackets and after a trailing backslash are
//! joined into the surrounding line.

mod scan;
mod token;

use std::collections::VecDeque;
use std::fmt;

use chumsky::Parser;
use chumsky::span::SimpleSpan;

use scan::Raw;
pub use token::{Spanned, Token};

/// The kinds of lexical error.
#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    UnterminatedString,
    InvalidCharacter(char),
    InvalidNumber,
    IntegerOverflow,
    InvalidEscape,
    InconsistentDedent,
    TooDeeplyIndented,
    TooManyNestedBrackets,
}

/// A lexical error at a byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub offset: usize,
}

impl LexError {
    pub fn new(kind: LexErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LexErrorKind::UnterminatedString => f.write_str("unterminated string literal"),
            LexErrorKind::InvalidCharacter(c) => write!(f, "invalid character '{}'", c),
            LexErrorKind::InvalidNumber => f.write_str("invalid number literal"),
            LexErrorKind::IntegerOverflow => f.write_str("integer literal is too large"),
            LexErrorKind::InvalidEscape => f.write_str("invalid escape sequence"),
            LexErrorKind::InconsistentDedent => {
                f.write_str("unindent does not match any outer indentation level")
            }
            LexErrorKind::TooDeeplyIndented => f.write_str("too many levels of indentation"),
            LexErrorKind::TooManyNestedBrackets => f.write_str("too many nested parentheses"),
        }
    }
}

impl std::error::Error for LexError {}

/// A human-facing source position: 1-based line and 1-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Compute the position of a byte offset within `text`.
    ///
    /// Offsets past the end clamp to the end of the text; columns count
    /// characters, not bytes.
    pub fn of(text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Deepest bracket nesting a line may open.
pub const MAX_BRACKET_DEPTH: usize = 200;

/// Most indented blocks that may be open at once.
pub const MAX_INDENT_DEPTH: usize = 100;

/// Lexer over a source string.
///
/// Characters are scanned up front with chumsky; this iterator then applies
/// the layout rules: indentation, bracket joining and logical line ends.
pub struct Lexer<'input> {
    input: &'input str,
    raw: std::vec::IntoIter<(Raw, SimpleSpan)>,
    /// Indentation widths of the open blocks; always starts with 0.
    indents: Vec<usize>,
    /// Bracket nesting depth; newlines are insignificant while positive.
    depth: usize,
    /// Offset of the physical line whose indentation is measured next.
    line_start: usize,
    at_line_start: bool,
    line_has_tokens: bool,
    pending: VecDeque<Spanned>,
    finished: bool,
}

/// Create a lexer for `input`.
pub fn lex_str(input: &str) -> Lexer<'_> {
    Lexer::new(input)
}

/// Lex all of `input` eagerly.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LexError> {
    lex_str(input).collect()
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        let raw = match scan::scanner().parse(input).into_result() {
            Ok(raw) => raw,
            Err(errors) => {
                let offset = errors.first().map_or(0, |err| err.span().start);
                let c = input.get(offset..).and_then(|rest| rest.chars().next()).unwrap_or('\0');
                let error = LexError::new(LexErrorKind::InvalidCharacter(c), offset);
                vec![(Raw::Error(error), SimpleSpan::from(offset..offset))]
            }
        };
        Self {
            input,
            raw: raw.into_iter(),
            indents: vec![0],
            depth: 0,
            line_start: 0,
            at_line_start: true,
            line_has_tokens: false,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, LexError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            if self.finished {
                return Ok(None);
            }
            let Some((raw, span)) = self.raw.next() else {
                self.finish();
                continue;
            };

            match raw {
                Raw::Newline => {
                    if self.depth == 0 {
                        self.at_line_start = true;
                        self.line_start = span.end;
                        if self.line_has_tokens {
                            self.line_has_tokens = false;
                            return Ok(Some((span.start, Token::Newline, span.end)));
                        }
                    }
                }
                Raw::Error(err) => return Err(err),
                Raw::Token(token) => {
                    if self.at_line_start && self.depth == 0 {
                        self.at_line_start = false;
                        self.indent_to(span.start)?;
                    }
                    self.track_brackets(&token, span.start)?;
                    self.line_has_tokens = true;
                    self.pending.push_back((span.start, token, span.end));
                }
            }
        }
    }

    /// Queue `Indent`/`Dedent` tokens for a line whose first token is at
    /// `offset`. Blank and comment-only lines never get here.
    fn indent_to(&mut self, offset: usize) -> Result<(), LexError> {
        let width = indentation_width(&self.input[self.line_start..offset]);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            if self.indents.len() > MAX_INDENT_DEPTH {
                return Err(LexError::new(LexErrorKind::TooDeeplyIndented, offset));
            }
            self.indents.push(width);
            self.pending.push_back((offset, Token::Indent, offset));
        } else if width < current {
            while self.indents.last().is_some_and(|&open| open > width) {
                self.indents.pop();
                self.pending.push_back((offset, Token::Dedent, offset));
            }
            if self.indents.last() != Some(&width) {
                return Err(LexError::new(LexErrorKind::InconsistentDedent, offset));
            }
        }
        Ok(())
    }

    fn track_brackets(&mut self, token: &Token, offset: usize) -> Result<(), LexError> {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => {
                if self.depth >= MAX_BRACKET_DEPTH {
                    return Err(LexError::new(LexErrorKind::TooManyNestedBrackets, offset));
                }
                self.depth += 1;
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) {
        let end = self.input.len();
        if self.line_has_tokens {
            self.line_has_tokens = false;
            self.pending.push_back((end, Token::Newline, end));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.pending.push_back((end, Token::Dedent, end));
        }
        self.finished = true;
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.finished = true;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}

/// Width of the leading whitespace of `line`: tabs advance to the next
/// multiple of eight and a form feed resets the count.
fn indentation_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / 8 + 1) * 8,
            '\x0c' => width = 0,
            _ => break,
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .expect("lexing failed")
            .into_iter()
            .map(|(_, token, _)| token)
            .collect()
    }

    fn name(s: &str) -> Token {
        Token::Name(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert!(tokens("").is_empty());
        assert!(tokens("\n\n   \n# only a comment\n").is_empty());
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            tokens("x = input(\"name: \")"),
            vec![
                name("x"),
                Token::Assign,
                name("input"),
                Token::LParen,
                Token::Str("name: ".to_string()),
                Token::RParen,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let input = "if x:\n    y = 1\n    z = 2\nw\n";
        assert_eq!(
            tokens(input),
            vec![
                Token::If,
                name("x"),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                name("y"),
                Token::Assign,
                Token::Int(1),
                Token::Newline,
                name("z"),
                Token::Assign,
                Token::Int(2),
                Token::Newline,
                Token::Dedent,
                name("w"),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_dedents_closed_at_end_of_input() {
        let toks = tokens("def f():\n    if a:\n        return 1");
        let dedents = toks.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(toks.last(), Some(&Token::Dedent));
    }

    #[test]
    fn test_inconsistent_dedent() {
        let err = tokenize("if x:\n    y\n  z\n").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InconsistentDedent);
    }

    #[test]
    fn test_newlines_inside_brackets_are_joined() {
        let toks = tokens("f(1,\n  2)\n");
        assert_eq!(toks.iter().filter(|t| **t == Token::Newline).count(), 1);
        assert!(!toks.contains(&Token::Indent));
    }

    #[test]
    fn test_backslash_continuation() {
        let toks = tokens("x = 1 + \\\n    2\n");
        assert_eq!(
            toks,
            vec![name("x"), Token::Assign, Token::Int(1), Token::Plus, Token::Int(2), Token::Newline]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_inside_block() {
        let toks = tokens("while x:\n\n    # note\n    y\n");
        assert_eq!(toks.iter().filter(|t| **t == Token::Indent).count(), 1);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("42")[0], Token::Int(42));
        assert_eq!(tokens("1_000")[0], Token::Int(1000));
        assert_eq!(tokens("3.5")[0], Token::Float(3.5));
        assert_eq!(tokens(".5")[0], Token::Float(0.5));
        assert_eq!(tokens("1e3")[0], Token::Float(1000.0));
        assert_eq!(tokens("2.")[0], Token::Float(2.0));
    }

    #[test]
    fn test_integer_overflow() {
        let err = tokenize("99999999999999999999").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::IntegerOverflow);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(tokens(r#"'a\nb'"#)[0], Token::Str("a\nb".to_string()));
        assert_eq!(tokens(r#""it's""#)[0], Token::Str("it's".to_string()));
        assert_eq!(tokens(r#"'\x41\u00e9'"#)[0], Token::Str("Aé".to_string()));
        assert_eq!(tokens(r#"'\d'"#)[0], Token::Str("\\d".to_string()));
    }

    #[test]
    fn test_triple_quoted_string() {
        assert_eq!(
            tokens("'''one\ntwo'''")[0],
            Token::Str("one\ntwo".to_string())
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc\n").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("a **= b // c != d <= e"),
            vec![
                name("a"),
                Token::DoubleStarAssign,
                name("b"),
                Token::DoubleSlash,
                name("c"),
                Token::NotEq,
                name("d"),
                Token::LessEq,
                name("e"),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens("x = await input()")[2],
            Token::Await
        );
        assert_eq!(tokens("None")[0], Token::NoneLit);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("x = $").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidCharacter('$'));
    }

    #[test]
    fn test_bracket_depth_limit() {
        let open = "(".repeat(MAX_BRACKET_DEPTH);
        assert!(tokenize(&open).is_ok());
        let err = tokenize(&format!("x = {}(", open)).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::TooManyNestedBrackets);
        assert_eq!(err.offset, 4 + MAX_BRACKET_DEPTH);
        assert_eq!(err.to_string(), "too many nested parentheses");
    }

    fn staircase(levels: usize) -> String {
        (0..=levels)
            .map(|level| format!("{}if x:\n", " ".repeat(level)))
            .collect::<String>()
            + &" ".repeat(levels + 1)
            + "pass\n"
    }

    #[test]
    fn test_indentation_depth_limit() {
        let toks = tokens(&staircase(MAX_INDENT_DEPTH - 1));
        assert_eq!(toks.iter().filter(|t| **t == Token::Indent).count(), MAX_INDENT_DEPTH);
        let err = tokenize(&staircase(MAX_INDENT_DEPTH)).unwrap_err();
        assert_eq!(err.kind, LexErrorKind::TooDeeplyIndented);
    }

    #[test]
    fn test_tabs_and_crlf() {
        let toks = tokens("if x:\r\n\ty\r\n        z\r\n");
        assert_eq!(toks.iter().filter(|t| **t == Token::Indent).count(), 1);
        assert_eq!(toks.iter().filter(|t| **t == Token::Newline).count(), 3);
    }

    #[test]
    fn test_tokens_before_an_error_are_yielded() {
        let mut lexer = lex_str("a = 1\nb = 'open");
        assert_eq!(lexer.next(), Some(Ok((0, name("a"), 1))));
        let rest: Vec<_> = lexer.collect();
        assert!(matches!(
            rest.last(),
            Some(Err(LexError { kind: LexErrorKind::UnterminatedString, offset: 10 }))
        ));
        assert!(rest[..rest.len() - 1].iter().all(Result::is_ok));
    }

    #[test]
    fn test_spans() {
        let spanned = tokenize("ab = 1").unwrap();
        assert_eq!(spanned[0], (0, name("ab"), 2));
        assert_eq!(spanned[2], (5, Token::Int(1), 6));
    }

    #[test]
    fn test_position() {
        let text = "a = 1\nbb = 2\n";
        assert_eq!(Position::of(text, 0), Position { line: 1, column: 1 });
        assert_eq!(Position::of(text, 8), Position { line: 2, column: 3 });
        assert_eq!(Position::of(text, 1000), Position { line: 3, column: 1 });
    }
}
