//! Execution-control state machine.
//!
//! The state lives on the engine and is driven from two sides: hook events
//! on the debuggee thread and commands from the controller. Every requested
//! change goes through [`decide`], a pure function over the legal-transition
//! table, so the rules are testable without any threads or IO.

/// How the debuggee is currently being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Engine constructed, script not yet running under the hook.
    Initial,
    /// Running freely, only breakpoints can stop it.
    Normal,
    /// Suspended, waiting for controller commands.
    Break,
    /// Running until the next line at or above the marked call depth.
    StepOver,
    /// Running until the very next line event.
    StepInto,
    /// Running until the marked frame returns.
    StepReturn,
    /// Shutting down; the hook aborts the script. Absorbing.
    Quit,
}

impl ExecutionState {
    pub fn is_stepping(self) -> bool {
        matches!(self, Self::StepOver | Self::StepInto | Self::StepReturn)
    }
}

/// Outcome of a requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Perform the transition.
    Enter,
    /// Legal but redundant or currently gated; drop the request silently.
    Ignore,
    /// Never legal from this state; an engine invariant was violated.
    Reject,
}

/// Apply the legal-transition table.
///
/// `acks_outstanding` gates leaving `Break`: while the controller has not
/// acknowledged the suspension notification, a resume request would race
/// the controller's view of where the debuggee is stopped, so it is held
/// back (the controller retries or the queue delivers it again after the
/// ack drains).
pub fn decide(
    current: ExecutionState,
    requested: ExecutionState,
    acks_outstanding: bool,
) -> Decision {
    use ExecutionState::*;

    if requested == current {
        return Decision::Ignore;
    }
    if current == Quit {
        return Decision::Ignore;
    }
    if requested == Quit {
        return Decision::Enter;
    }
    if requested == Initial {
        return Decision::Reject;
    }

    match current {
        Initial => {
            if requested == Normal {
                Decision::Enter
            } else {
                Decision::Reject
            }
        }
        // Break or any step request is honoured while running
        Normal => Decision::Enter,
        Break => {
            if acks_outstanding {
                Decision::Ignore
            } else {
                Decision::Enter
            }
        }
        StepOver | StepInto | StepReturn => {
            if requested == Break {
                Decision::Enter
            } else {
                // a second step or a resume while a step is pending
                Decision::Ignore
            }
        }
        Quit => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Decision::*;
    use ExecutionState::*;

    const ALL: [ExecutionState; 7] =
        [Initial, Normal, Break, StepOver, StepInto, StepReturn, Quit];

    #[test]
    fn self_transitions_are_ignored() {
        for state in ALL {
            assert_eq!(decide(state, state, false), Ignore);
            assert_eq!(decide(state, state, true), Ignore);
        }
    }

    #[test]
    fn quit_is_absorbing() {
        for requested in ALL {
            assert_eq!(decide(Quit, requested, false), Ignore);
        }
    }

    #[test]
    fn quit_is_always_reachable() {
        for current in [Initial, Normal, Break, StepOver, StepInto, StepReturn] {
            assert_eq!(decide(current, Quit, false), Enter);
            assert_eq!(decide(current, Quit, true), Enter);
        }
    }

    #[test]
    fn initial_only_starts_running() {
        assert_eq!(decide(Initial, Normal, false), Enter);
        for requested in [Break, StepOver, StepInto, StepReturn] {
            assert_eq!(decide(Initial, requested, false), Reject);
        }
    }

    #[test]
    fn nothing_reenters_initial() {
        for current in [Normal, Break, StepOver, StepInto, StepReturn] {
            assert_eq!(decide(current, Initial, false), Reject);
        }
    }

    #[test]
    fn running_accepts_break_and_steps() {
        for requested in [Break, StepOver, StepInto, StepReturn] {
            assert_eq!(decide(Normal, requested, false), Enter);
        }
    }

    #[test]
    fn resume_from_break_is_gated_on_acks() {
        for requested in [Normal, StepOver, StepInto, StepReturn] {
            assert_eq!(decide(Break, requested, true), Ignore);
            assert_eq!(decide(Break, requested, false), Enter);
        }
    }

    #[test]
    fn pending_step_only_yields_to_break() {
        for current in [StepOver, StepInto, StepReturn] {
            assert_eq!(decide(current, Break, false), Enter);
            assert_eq!(decide(current, Normal, false), Ignore);
            for other in [StepOver, StepInto, StepReturn] {
                if other != current {
                    assert_eq!(decide(current, other, false), Ignore);
                }
            }
        }
    }
}
