//! Token definitions shared by the lexer and the grammar.

use std::fmt;

/// A token paired with its byte span in the source: `(start, token, end)`.
pub type Spanned = (usize, Token, usize);

/// A lexical token of an inkpot cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier
    Name(String),
    /// Integer literal (64-bit)
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal with escapes already decoded
    Str(String),

    /// End of a logical line
    Newline,
    /// Indentation increased
    Indent,
    /// Indentation decreased
    Dedent,

    // Keywords
    And,
    As,
    Async,
    Await,
    Break,
    Continue,
    Def,
    Elif,
    Else,
    False,
    For,
    From,
    If,
    Import,
    In,
    Is,
    NoneLit,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    True,
    While,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,
    DoubleStarAssign,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,
}

impl Token {
    /// Look up the keyword token for an identifier, if it is reserved.
    pub fn keyword(ident: &str) -> Option<Token> {
        let token = match ident {
            "and" => Token::And,
            "as" => Token::As,
            "async" => Token::Async,
            "await" => Token::Await,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "def" => Token::Def,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "False" => Token::False,
            "for" => Token::For,
            "from" => Token::From,
            "if" => Token::If,
            "import" => Token::Import,
            "in" => Token::In,
            "is" => Token::Is,
            "None" => Token::NoneLit,
            "not" => Token::Not,
            "or" => Token::Or,
            "pass" => Token::Pass,
            "raise" => Token::Raise,
            "return" => Token::Return,
            "True" => Token::True,
            "while" => Token::While,
            _ => return None,
        };
        Some(token)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Token::Name(_) => "identifier",
            Token::Int(_) => "integer",
            Token::Float(_) => "float",
            Token::Str(_) => "string",
            Token::Newline => "newline",
            Token::Indent => "indent",
            Token::Dedent => "dedent",
            Token::And => "and",
            Token::As => "as",
            Token::Async => "async",
            Token::Await => "await",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Def => "def",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::False => "False",
            Token::For => "for",
            Token::From => "from",
            Token::If => "if",
            Token::Import => "import",
            Token::In => "in",
            Token::Is => "is",
            Token::NoneLit => "None",
            Token::Not => "not",
            Token::Or => "or",
            Token::Pass => "pass",
            Token::Raise => "raise",
            Token::Return => "return",
            Token::True => "True",
            Token::While => "while",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::DoubleStar => "**",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::Assign => "=",
            Token::PlusAssign => "+=",
            Token::MinusAssign => "-=",
            Token::StarAssign => "*=",
            Token::SlashAssign => "/=",
            Token::DoubleSlashAssign => "//=",
            Token::PercentAssign => "%=",
            Token::DoubleStarAssign => "**=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Semicolon => ";",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "'{}'", name),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::Str(_) => f.write_str("string literal"),
            other => f.write_str(other.as_str()),
        }
    }
}
