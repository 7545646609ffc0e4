//! Exceptions raised by running code.
//!
//! These propagate through evaluation with `?` and end a cell as
//! `"<Kind>: <message>"`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Exception,
    ValueError,
    TypeError,
    RuntimeError,
    KeyError,
    IndexError,
    ZeroDivisionError,
    NameError,
    AttributeError,
    OverflowError,
    RecursionError,
    MemoryError,
    EOFError,
    ImportError,
    ModuleNotFoundError,
    SyntaxError,
}

impl ExceptionKind {
    /// Kinds code can name and raise directly.
    pub const BUILTIN: &'static [ExceptionKind] = &[
        ExceptionKind::Exception,
        ExceptionKind::ValueError,
        ExceptionKind::TypeError,
        ExceptionKind::RuntimeError,
        ExceptionKind::KeyError,
        ExceptionKind::IndexError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::NameError,
        ExceptionKind::AttributeError,
        ExceptionKind::OverflowError,
        ExceptionKind::RecursionError,
        ExceptionKind::MemoryError,
        ExceptionKind::EOFError,
        ExceptionKind::ImportError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::MemoryError => "MemoryError",
            ExceptionKind::EOFError => "EOFError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::ModuleNotFoundError => "ModuleNotFoundError",
            ExceptionKind::SyntaxError => "SyntaxError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::BUILTIN.iter().copied().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

pub type EvalResult<T> = Result<T, Exception>;

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ValueError, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::IndexError, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ZeroDivisionError, message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::OverflowError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::AttributeError, message)
    }

    pub fn recursion_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::RecursionError, message)
    }

    /// An allocation that was refused before it was attempted.
    pub fn memory_error() -> Self {
        Self::new(ExceptionKind::MemoryError, "")
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.name())
        } else {
            write!(f, "{}: {}", self.kind.name(), self.message)
        }
    }
}
