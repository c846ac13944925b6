//! Declarative state-machine harness: a fixed table of named states with
//! allowed-transition sets, an invariant hook checked after every move, and
//! initial/final flags. Mirrors the `sm_init`/`sm_state`/`sm_move` contract
//! of the original core's `struct sm`.

/// Static description of one state.
pub struct StateConf {
    pub name: &'static str,
    pub initial: bool,
    pub final_: bool,
    /// Bitmask over state indices this state may transition to.
    pub allowed: u64,
}

pub const fn bit(state: usize) -> u64 {
    1u64 << state
}

/// A state machine instance over a `'static` table of [`StateConf`].
///
/// `I` is an invariant predicate: `Fn(current, previous) -> bool`, called
/// after every successful move (and once at construction, with
/// `previous == current`). A violated invariant is a programmer error in
/// the caller's wiring of the state table, not a runtime condition to
/// recover from, so it panics -- matching the original core's
/// `assert`-and-abort policy.
pub struct StateMachine<I> {
    states: &'static [StateConf],
    current: usize,
    invariant: I,
    name: &'static str,
}

impl<I> StateMachine<I>
where
    I: Fn(usize, usize) -> bool,
{
    pub fn new(name: &'static str, states: &'static [StateConf], initial: usize, invariant: I) -> Self {
        assert!(states[initial].initial, "state {} is not marked initial", initial);
        assert!(
            invariant(initial, initial),
            "state machine {}: invariant violated on init in state {}",
            name,
            states[initial].name
        );
        Self {
            states,
            current: initial,
            invariant,
            name,
        }
    }

    pub fn state(&self) -> usize {
        self.current
    }

    pub fn state_name(&self) -> &'static str {
        self.states[self.current].name
    }

    pub fn is_final(&self) -> bool {
        self.states[self.current].final_
    }

    /// Attempt to move to `to`. Panics if the transition is not allowed, or
    /// if the invariant does not hold afterwards -- both are fatal
    /// programmer errors, not recoverable conditions.
    pub fn step(&mut self, to: usize) {
        let prev = self.current;
        let allowed = self.states[prev].allowed;
        assert!(
            allowed & bit(to) != 0,
            "state machine {}: illegal transition {} -> {}",
            self.name,
            self.states[prev].name,
            self.states[to].name
        );
        self.current = to;
        assert!(
            (self.invariant)(self.current, prev),
            "state machine {}: invariant violated after {} -> {}",
            self.name,
            self.states[prev].name,
            self.states[to].name
        );
    }
}
