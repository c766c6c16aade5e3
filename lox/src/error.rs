use std::ops::Range;

use thiserror::Error;

use crate::token::Token;
use crate::value::Value;

/// Stage of the pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTier {
    /// Lexical, syntax and resolution errors.
    Compile,
    Runtime,
}

impl ErrorTier {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorTier::Compile => 65,
            ErrorTier::Runtime => 70,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoxError {
    #[error("Could not read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("[line {line}] Error: {message}")]
    Scan {
        message: String,
        line: usize,
        span: Range<usize>,
    },

    /// `location` is empty, ` at end` or ` at 'lexeme'`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
        span: Range<usize>,
    },

    #[error("[line {line}] Error: {message}")]
    Resolution {
        message: String,
        line: usize,
        span: Range<usize>,
    },

    #[error("{message}\n[line {line}]")]
    Runtime {
        message: String,
        line: usize,
        span: Range<usize>,
    },

    /// Unwinds to the nearest enclosing function call.
    #[error("")]
    Return(Value),
}

impl LoxError {
    /// Runtime error reported at `token`.
    pub fn runtime(message: impl Into<String>, token: &Token) -> Self {
        LoxError::Runtime {
            message: message.into(),
            line: token.line,
            span: token.span.clone(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Scan { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolution { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            LoxError::Io(_) | LoxError::Return(_) => None,
        }
    }

    /// Byte range of the source the error points at.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            LoxError::Scan { span, .. }
            | LoxError::Parse { span, .. }
            | LoxError::Resolution { span, .. }
            | LoxError::Runtime { span, .. } => Some(span.clone()),
            LoxError::Io(_) | LoxError::Return(_) => None,
        }
    }

    /// The diagnostic message without the line decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Scan { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolution { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            LoxError::Io(e) => e.to_string(),
            LoxError::Return(_) => String::new(),
        }
    }

    pub fn tier(&self) -> Option<ErrorTier> {
        match self {
            LoxError::Scan { .. } | LoxError::Parse { .. } | LoxError::Resolution { .. } => {
                Some(ErrorTier::Compile)
            }
            LoxError::Runtime { .. } => Some(ErrorTier::Runtime),
            LoxError::Io(_) | LoxError::Return(_) => None,
        }
    }
}
