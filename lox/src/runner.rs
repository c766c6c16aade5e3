//! Runner trait used by the CLI to drive a session

use std::io::Write;

use crate::LoxError;

/// Trait for running Lox source code.
pub trait Runner {
    /// Run source code and write program output to the provided writer.
    ///
    /// Returns `Ok(())` on success, or every error reported for the buffer.
    fn run<W: Write>(&mut self, source: &str, stdout: W) -> Result<(), Vec<LoxError>>;

    /// Names of all variables currently defined, for REPL completion.
    fn variable_names(&self) -> Vec<String>;
}

impl Runner for crate::Lox {
    fn run<W: Write>(&mut self, source: &str, stdout: W) -> Result<(), Vec<LoxError>> {
        let errors = crate::Lox::run(self, source, stdout);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn variable_names(&self) -> Vec<String> {
        crate::Lox::variable_names(self)
    }
}
