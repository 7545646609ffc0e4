//! Character-level scanning with chumsky.
//!
//! The scanner turns source text into a flat list of raw tokens with spans.
//! It knows nothing about indentation or brackets; that is left to the
//! layout pass in the crate root. It never fails as a whole: malformed
//! literals and stray characters come out as `Raw::Error` at the place they
//! occur, so earlier tokens still reach the parser first.

use chumsky::prelude::*;

use crate::{LexError, LexErrorKind, Token};

type Extra<'src> = extra::Err<Rich<'src, char>>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Raw {
    Token(Token),
    /// A physical line break.
    Newline,
    Error(LexError),
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn line_break<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just("\r\n").ignored().or(one_of("\r\n").ignored())
}

/// Spaces, comments and backslash continuations between tokens.
fn padding<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    let comment = just('#').then(none_of("\r\n").repeated()).ignored();
    let continuation = just('\\').then(line_break()).ignored();
    choice((one_of(" \t\x0c").ignored(), comment, continuation)).repeated()
}

fn quoted<'src>(quote: char) -> impl Parser<'src, &'src str, Raw, Extra<'src>> + Clone {
    let escape = just('\\').then(any()).ignored();
    let plain = any()
        .filter(move |c: &char| *c != quote && !matches!(*c, '\\' | '\n' | '\r'))
        .ignored();
    just(quote)
        .ignore_then(escape.or(plain).repeated().to_slice())
        .then(just(quote).or_not())
        .map_with(|(body, close), e| string_token(body, close.is_some(), e.span(), 1))
}

fn triple_quoted<'src>(delimiter: &'static str) -> impl Parser<'src, &'src str, Raw, Extra<'src>> + Clone {
    let escape = just('\\').then(any()).ignored();
    let plain = any().and_is(just(delimiter).not()).ignored();
    just(delimiter)
        .ignore_then(escape.or(plain).repeated().to_slice())
        .then(just(delimiter).or_not())
        .map_with(|(body, close), e| string_token(body, close.is_some(), e.span(), 3))
}

fn number<'src>() -> impl Parser<'src, &'src str, Raw, Extra<'src>> + Clone {
    let digit = any().filter(char::is_ascii_digit);
    let digits = any()
        .filter(|c: &char| c.is_ascii_digit() || *c == '_')
        .repeated();
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(digit.clone())
        .then(digits.clone());
    // `1.real` and `1..` keep the dot for the attribute or the next token.
    let fraction = just('.')
        .and_is(
            just('.')
                .then(any().filter(|c: &char| is_ident_start(*c) || *c == '.'))
                .not(),
        )
        .then(digits.clone());
    let trailing = any()
        .filter(|c: &char| is_ident_continue(*c))
        .repeated()
        .at_least(1);

    choice((
        digit
            .clone()
            .then(digits.clone())
            .then(fraction.or_not())
            .then(exponent.clone().or_not())
            .ignored(),
        just('.')
            .then(digit)
            .then(digits)
            .then(exponent.or_not())
            .ignored(),
    ))
    .to_slice()
    .then(trailing.or_not())
    .map_with(|(text, trailing), e| {
        let span: SimpleSpan = e.span();
        number_token(text, trailing.is_some(), span.start)
    })
}

fn name<'src>() -> impl Parser<'src, &'src str, Raw, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| is_ident_start(*c))
        .then(any().filter(|c: &char| is_ident_continue(*c)).repeated())
        .to_slice()
        .map(|ident: &str| {
            Raw::Token(Token::keyword(ident).unwrap_or_else(|| Token::Name(ident.to_string())))
        })
}

fn operator<'src>() -> impl Parser<'src, &'src str, Raw, Extra<'src>> + Clone {
    let compound = choice((
        just("**=").to(Token::DoubleStarAssign),
        just("//=").to(Token::DoubleSlashAssign),
        just("**").to(Token::DoubleStar),
        just("//").to(Token::DoubleSlash),
        just("+=").to(Token::PlusAssign),
        just("-=").to(Token::MinusAssign),
        just("*=").to(Token::StarAssign),
        just("/=").to(Token::SlashAssign),
        just("%=").to(Token::PercentAssign),
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("<=").to(Token::LessEq),
        just(">=").to(Token::GreaterEq),
    ));

    let single = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('=').to(Token::Assign),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just(',').to(Token::Comma),
        just(':').to(Token::Colon),
        just('.').to(Token::Dot),
        just(';').to(Token::Semicolon),
    ));

    let bracket = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
    ));

    choice((compound, bracket, single)).map(Raw::Token)
}

/// The raw token stream of a whole cell.
pub(crate) fn scanner<'src>() -> impl Parser<'src, &'src str, Vec<(Raw, SimpleSpan)>, Extra<'src>> {
    let invalid = any().map_with(|c, e| {
        let span: SimpleSpan = e.span();
        Raw::Error(LexError::new(LexErrorKind::InvalidCharacter(c), span.start))
    });

    let token = choice((
        line_break().to(Raw::Newline),
        triple_quoted("'''"),
        triple_quoted("\"\"\""),
        quoted('\''),
        quoted('"'),
        number(),
        name(),
        operator(),
        invalid,
    ));

    padding()
        .ignore_then(
            token
                .map_with(|raw, e| (raw, e.span()))
                .then_ignore(padding())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(end())
}

fn string_token(body: &str, closed: bool, span: SimpleSpan, prefix: usize) -> Raw {
    if !closed {
        return Raw::Error(LexError::new(LexErrorKind::UnterminatedString, span.start));
    }
    match decode_string(body, span.start + prefix) {
        Ok(value) => Raw::Token(Token::Str(value)),
        Err(err) => Raw::Error(err),
    }
}

/// Decode the escapes in a string body that starts at byte `offset`.
fn decode_string(body: &str, offset: usize) -> Result<String, LexError> {
    let mut value = String::with_capacity(body.len());
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            value.push('\\');
            break;
        };
        match escaped {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0' => value.push('\0'),
            '\\' => value.push('\\'),
            '\'' => value.push('\''),
            '"' => value.push('"'),
            '\n' => {}
            'x' | 'u' => {
                let digits = if escaped == 'x' { 2 } else { 4 };
                let invalid = || LexError::new(LexErrorKind::InvalidEscape, offset + i);
                let hex = chars.as_str().get(..digits).ok_or_else(invalid)?;
                if !hex.chars().all(|d| d.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                let code = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
                value.push(char::from_u32(code).ok_or_else(invalid)?);
                chars.nth(digits - 1);
            }
            other => {
                value.push('\\');
                value.push(other);
            }
        }
    }
    Ok(value)
}

fn number_token(text: &str, trailing: bool, start: usize) -> Raw {
    if trailing {
        return Raw::Error(LexError::new(LexErrorKind::InvalidNumber, start));
    }
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let token = if text.contains(['.', 'e', 'E']) {
        cleaned
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| LexError::new(LexErrorKind::InvalidNumber, start))
    } else {
        cleaned
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| LexError::new(LexErrorKind::IntegerOverflow, start))
    };
    match token {
        Ok(token) => Raw::Token(token),
        Err(err) => Raw::Error(err),
    }
}
