//! Shared helpers for unit tests.

use codec::{BacktraceFrame, Variable};

use crate::error::CommandError;
use crate::interpreter::{Interpreter, LocalScopes};

/// An interpreter that has nothing to say.
pub(crate) struct NullInterpreter;

impl Interpreter for NullInterpreter {
    fn evaluate(&mut self, _expression: &str, _level: Option<u32>) -> Result<String, CommandError> {
        Ok(String::new())
    }

    fn evaluate_multi(
        &mut self,
        _expression: &str,
        _level: Option<u32>,
    ) -> Result<Vec<Variable>, CommandError> {
        Ok(Vec::new())
    }

    fn locals(
        &mut self,
        _level: u32,
        _scopes: LocalScopes,
    ) -> Result<Vec<Variable>, CommandError> {
        Ok(Vec::new())
    }

    fn globals(&mut self) -> Result<Vec<Variable>, CommandError> {
        Ok(Vec::new())
    }

    fn registry(&mut self) -> Result<Vec<Variable>, CommandError> {
        Ok(Vec::new())
    }

    fn fields(&mut self, _var: &Variable) -> Result<Vec<Variable>, CommandError> {
        Ok(Vec::new())
    }

    fn stack(&mut self) -> Result<Vec<Variable>, CommandError> {
        Ok(Vec::new())
    }

    fn backtrace(&mut self) -> Result<Vec<BacktraceFrame>, CommandError> {
        Ok(Vec::new())
    }
}
