mod actions;
pub mod adapter;
pub mod ast;
pub mod literal;
pub mod locations;
pub mod parents;
pub mod visit;

// Include generated parser code from lalrpop
#[allow(clippy::all)]
mod inkpot {
    include!(concat!(env!("OUT_DIR"), "/inkpot.rs"));
}

pub use adapter::{LexerAdapter, ParseError};
pub use ast::*;
pub use locations::{fix_missing_locations, missing_locations};
pub use parents::{NodeKind, ParentMap};

use inkpot_lexer::lex_str;

/// Parse a cell's source text into a numbered syntax tree
pub fn parse(input: &str) -> Result<Module, ParseError> {
    inkpot::ProgramParser::new()
        .parse(LexerAdapter::new(lex_str(input)))
        .map(Module::new)
        .map_err(|e| ParseError::from_lalrpop(input, e))
}
