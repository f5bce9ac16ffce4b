//! Execution contexts and step marks.
//!
//! An interpreter may run nested execution contexts (coroutines, spawned
//! chunks). The engine tracks them as a stack: hook events always concern
//! the top context, and each context carries its own call depth. A step
//! request pins a [`StepMark`] to the context and depth it was issued in,
//! so stepping never fires inside a context created after the request.

use crate::error::invariant_violation;

/// Opaque identity of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// Where a step request was issued: which context, at what call depth.
///
/// The mark is satisfied when that same context is on top again and its
/// depth has come back to (or above) the recorded one. `StepInto` does not
/// consult the depth at all; `StepOver` and `StepReturn` do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMark {
    pub context: ContextId,
    pub depth: i64,
}

#[derive(Debug)]
struct Frame {
    id: ContextId,
    depth: i64,
}

/// Stack of live execution contexts. Never empty: the root context is
/// pushed at construction and cannot be popped.
#[derive(Debug)]
pub struct ContextStack {
    frames: Vec<Frame>,
}

impl ContextStack {
    pub fn new(root: ContextId) -> Self {
        Self {
            frames: vec![Frame { id: root, depth: 0 }],
        }
    }

    pub fn top(&self) -> ContextId {
        // frames is never empty
        self.frames.last().map(|f| f.id).unwrap_or(ContextId(0))
    }

    pub fn push(&mut self, id: ContextId) {
        self.frames.push(Frame { id, depth: 0 });
    }

    /// Pop `id` from the top of the stack. Popping the root or a context
    /// that is not on top is an invariant violation and is ignored.
    pub fn pop(&mut self, id: ContextId) {
        if self.frames.len() <= 1 {
            invariant_violation("popping the root execution context");
            return;
        }
        if self.top() != id {
            invariant_violation("popping an execution context that is not on top");
            return;
        }
        self.frames.pop();
    }

    pub fn enter_call(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.depth += 1;
        }
    }

    pub fn leave_call(&mut self) {
        match self.frames.last_mut() {
            Some(frame) if frame.depth > 0 => frame.depth -= 1,
            // returns can outnumber calls when the hook was installed
            // mid-execution; clamp at zero
            _ => {}
        }
    }

    /// Snapshot the top context for a step request.
    pub fn mark(&self) -> StepMark {
        let frame = self.frames.last();
        StepMark {
            context: frame.map(|f| f.id).unwrap_or(ContextId(0)),
            depth: frame.map(|f| f.depth).unwrap_or(0),
        }
    }

    /// Whether a pending step should fire here.
    pub fn mark_satisfied(&self, mark: StepMark) -> bool {
        match self.frames.last() {
            Some(frame) => frame.id == mark.context && frame.depth <= mark.depth,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_follows_calls_and_returns() {
        let mut stack = ContextStack::new(ContextId(0));
        let mark = stack.mark();
        assert_eq!(mark.depth, 0);

        stack.enter_call();
        stack.enter_call();
        assert!(!stack.mark_satisfied(mark));

        stack.leave_call();
        stack.leave_call();
        assert!(stack.mark_satisfied(mark));
    }

    #[test]
    fn returns_without_calls_clamp_at_zero() {
        let mut stack = ContextStack::new(ContextId(0));
        stack.leave_call();
        assert_eq!(stack.mark().depth, 0);
    }

    #[test]
    fn mark_is_scoped_to_its_context() {
        let mut stack = ContextStack::new(ContextId(0));
        let mark = stack.mark();

        stack.push(ContextId(1));
        // same depth, different context
        assert!(!stack.mark_satisfied(mark));

        stack.pop(ContextId(1));
        assert!(stack.mark_satisfied(mark));
    }

    #[test]
    fn mismatched_pop_is_ignored() {
        let mut stack = ContextStack::new(ContextId(0));
        stack.push(ContextId(1));
        stack.pop(ContextId(2));
        assert_eq!(stack.top(), ContextId(1));
    }

    #[test]
    fn root_cannot_be_popped() {
        let mut stack = ContextStack::new(ContextId(0));
        stack.pop(ContextId(0));
        assert_eq!(stack.top(), ContextId(0));
    }

    #[test]
    fn deeper_frame_does_not_satisfy_mark() {
        let mut stack = ContextStack::new(ContextId(0));
        stack.enter_call();
        let mark = stack.mark();

        stack.enter_call();
        assert!(!stack.mark_satisfied(mark));

        stack.leave_call();
        assert!(stack.mark_satisfied(mark));

        // shallower than the mark still satisfies it
        stack.leave_call();
        assert!(stack.mark_satisfied(mark));
    }
}
