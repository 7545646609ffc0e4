//! Dump the token stream of an inkpot cell, one token per line.
//!
//! Usage: `inkpot-lexer [FILE]`. Reads stdin when no file is given.

use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::{env, fs};

use inkpot_lexer::{Position, Token, lex_str};

fn read_source(path: Option<&str>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn main() -> ExitCode {
    let path = env::args().nth(1);
    let source = match read_source(path.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {}", path.as_deref().unwrap_or("<stdin>"), err);
            return ExitCode::FAILURE;
        }
    };

    let mut out = io::stdout().lock();
    let mut depth = 0usize;
    for item in lex_str(&source) {
        let (start, token, end) = match item {
            Ok(spanned) => spanned,
            Err(err) => {
                eprintln!("{}: {}", Position::of(&source, err.offset), err);
                return ExitCode::FAILURE;
            }
        };
        if token == Token::Dedent {
            depth = depth.saturating_sub(1);
        }
        let pad = "  ".repeat(depth);
        if writeln!(out, "{:>4}..{:<4} {}{:?}", start, end, pad, token).is_err() {
            return ExitCode::FAILURE;
        }
        if token == Token::Indent {
            depth += 1;
        }
    }
    ExitCode::SUCCESS
}
