//! Seam to the embedded interpreter.
//!
//! The engine never touches interpreter internals. Everything it needs for
//! inspection goes through this trait, called on the debuggee thread while
//! the script is suspended inside the hook (so implementations may assume
//! the interpreter is quiescent).

use codec::{BacktraceFrame, Variable};

use crate::error::CommandError;

/// Which variable scopes a locals request should include.
#[derive(Debug, Clone, Copy)]
pub struct LocalScopes {
    pub locals: bool,
    pub upvalues: bool,
    pub environment: bool,
}

pub trait Interpreter: Send {
    /// Evaluate `expression` in the given stack frame (`None` means the
    /// innermost frame) and render the result as a display string.
    fn evaluate(&mut self, expression: &str, level: Option<u32>)
        -> Result<String, CommandError>;

    /// Like [`Interpreter::evaluate`] but preserving every returned value
    /// as its own variable (multi-value expressions).
    fn evaluate_multi(
        &mut self,
        expression: &str,
        level: Option<u32>,
    ) -> Result<Vec<Variable>, CommandError>;

    /// Local variables of one stack frame.
    fn locals(&mut self, level: u32, scopes: LocalScopes)
        -> Result<Vec<Variable>, CommandError>;

    fn globals(&mut self) -> Result<Vec<Variable>, CommandError>;

    /// The interpreter's registry table, where one exists.
    fn registry(&mut self) -> Result<Vec<Variable>, CommandError>;

    /// Child fields of a structured value previously reported.
    fn fields(&mut self, var: &Variable) -> Result<Vec<Variable>, CommandError>;

    /// The raw value stack, bottom first.
    fn stack(&mut self) -> Result<Vec<Variable>, CommandError>;

    /// Call stack, innermost frame first.
    fn backtrace(&mut self) -> Result<Vec<BacktraceFrame>, CommandError>;
}
