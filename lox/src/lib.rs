mod ast;
mod environment;
mod error;
mod interpreter;
mod natives;
mod parser;
mod resolver;
mod runner;
mod scanner;
mod token;
mod value;

use std::io::Write;

use log::info;

pub use ast::{Expr, ExprId, FunctionDecl, Stmt};
pub use error::{ErrorTier, LoxError};
pub use interpreter::{Interpreter, RunMode};
pub use parser::Parser;
pub use resolver::{Resolutions, Resolver};
pub use runner::Runner;
pub use scanner::{KEYWORDS, Scanner, is_identifier_char, is_identifier_start, tokenize};
pub use token::{Literal, Token, TokenType, canonical_number};
pub use value::Value;

/// A session running source buffers through scan, parse, resolve and
/// execution. Globals persist across runs.
pub struct Lox {
    interpreter: Interpreter,
    mode: RunMode,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    /// Batch session: the first runtime error stops the run.
    pub fn new() -> Self {
        Self::with_mode(RunMode::Batch)
    }

    /// Session for the REPL: a failing statement does not stop the ones
    /// after it.
    pub fn interactive() -> Self {
        Self::with_mode(RunMode::Interactive)
    }

    pub fn with_mode(mode: RunMode) -> Self {
        Self {
            interpreter: Interpreter::new(),
            mode,
        }
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.interpreter.variable_names()
    }

    /// Runs `source`, writing program output to `stdout`.
    ///
    /// Compile errors prevent execution and are all returned together.
    pub fn run<O: Write>(&mut self, source: &str, mut stdout: O) -> Vec<LoxError> {
        let statements = match self.interpreter.compile(source) {
            Ok(statements) => statements,
            Err(errors) => {
                info!("Compilation failed with {} errors", errors.len());
                return errors;
            }
        };

        self.interpreter
            .interpret(&statements, self.mode, &mut stdout)
    }

    /// Evaluates `source` as a single expression.
    pub fn evaluate<O: Write>(&mut self, source: &str, mut stdout: O) -> Result<Value, Vec<LoxError>> {
        let expr = self.interpreter.compile_expression(source)?;
        self.interpreter
            .evaluate(&expr, &mut stdout)
            .map_err(|e| vec![e])
    }
}
