//! The planner thread: drains the ordered and unordered queues into worker
//! inboxes, and gates ordered work around barriers.
//!
//! The generic [`StateMachine`] harness only checks legal-transition shape;
//! the domain invariant below needs sibling fields of `PoolState` (the
//! queues, `in_flight`) that aren't reachable from a closure captured at
//! state-machine construction time, so it is checked explicitly here with
//! `assert!` after every `sm.step`, the same way the harness would.

use super::{PoolState, Shared, WorkKind};
use crate::statemachine::{bit, StateConf, StateMachine};

pub const NOTHING: usize = 0;
pub const DRAINING: usize = 1;
pub const BARRIER: usize = 2;
pub const DRAINING_UNORD: usize = 3;
pub const EXITED: usize = 4;

static STATES: [StateConf; 5] = [
    StateConf {
        name: "nothing",
        initial: true,
        final_: false,
        allowed: bit(DRAINING) | bit(EXITED),
    },
    StateConf {
        name: "draining",
        initial: false,
        final_: false,
        allowed: bit(DRAINING) | bit(NOTHING) | bit(BARRIER),
    },
    StateConf {
        name: "barrier",
        initial: false,
        final_: false,
        allowed: bit(DRAINING_UNORD) | bit(DRAINING) | bit(BARRIER),
    },
    StateConf {
        name: "unord-draining",
        initial: false,
        final_: false,
        allowed: bit(BARRIER),
    },
    StateConf {
        name: "exited",
        initial: false,
        final_: true,
        allowed: 0,
    },
];

pub fn new_state_machine() -> StateMachine<fn(usize, usize) -> bool> {
    StateMachine::new("planner", &STATES, NOTHING, |_, _| true)
}

fn ergo(cond: bool, implies: bool) -> bool {
    !cond || implies
}

fn invariant_holds(state: &PoolState, current: usize, prev: usize) -> bool {
    match current {
        NOTHING => state.ordered.is_empty() && state.unordered.is_empty(),
        DRAINING => {
            ergo(prev == BARRIER, state.in_flight == 0 && state.unordered.is_empty())
                && ergo(prev == NOTHING, !state.unordered.is_empty() || !state.ordered.is_empty())
        }
        EXITED => state.exiting && state.ordered.is_empty() && state.unordered.is_empty(),
        BARRIER => {
            ergo(
                prev == DRAINING,
                matches!(state.ordered.head().map(|w| w.kind), Some(WorkKind::Barrier)),
            ) && ergo(prev == DRAINING_UNORD, state.unordered.is_empty())
        }
        DRAINING_UNORD => !state.unordered.is_empty(),
        _ => unreachable!("no fifth planner state"),
    }
}

fn step(state: &mut PoolState, to: usize) {
    let prev = state.sm.state();
    state.sm.step(to);
    assert!(
        invariant_holds(state, to, prev),
        "planner invariant violated after {} -> {}",
        STATES[prev].name,
        STATES[to].name
    );
}

fn qos_pop(state: &mut PoolState) -> super::WorkItem {
    let take_ordered = if state.ordered.is_empty() {
        false
    } else if state.unordered.is_empty() {
        true
    } else {
        let tick = state.qos;
        state.qos = state.qos.wrapping_add(1);
        tick % 2 == 1
    };
    if take_ordered {
        state.ordered.pop().expect("checked non-empty above")
    } else {
        state.unordered.pop().expect("checked non-empty above")
    }
}

pub fn run(shared: &Shared) {
    #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
    let mut state = shared.mutex.lock().unwrap();
    loop {
        match state.sm.state() {
            NOTHING => {
                while state.ordered.is_empty() && state.unordered.is_empty() && !state.exiting {
                    #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
                    {
                        state = shared.planner_cond.wait(state).unwrap();
                    }
                }
                let to = if state.exiting { EXITED } else { DRAINING };
                step(&mut state, to);
            }
            DRAINING => {
                while !(state.ordered.is_empty() && state.unordered.is_empty()) {
                    step(&mut state, DRAINING);
                    if matches!(state.ordered.head().map(|w| w.kind), Some(WorkKind::Barrier)) {
                        step(&mut state, BARRIER);
                        break;
                    }
                    let item = qos_pop(&mut state);
                    let tid = item.thread_id as usize;
                    if matches!(item.kind, WorkKind::Ordered(_)) {
                        state.in_flight += 1;
                    }
                    state.threads[tid].inq.insert_tail(item);
                    shared.worker_conds[tid].notify_one();
                }
                if state.sm.state() == DRAINING {
                    step(&mut state, NOTHING);
                }
            }
            BARRIER => {
                if !state.unordered.is_empty() {
                    step(&mut state, DRAINING_UNORD);
                    continue;
                }
                if state.in_flight == 0 {
                    let barrier = state.ordered.pop().expect("head was checked to be a barrier");
                    assert!(matches!(barrier.kind, WorkKind::Barrier));
                    step(&mut state, DRAINING);
                    continue;
                }
                #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
                {
                    state = shared.planner_cond.wait(state).unwrap();
                }
                step(&mut state, BARRIER);
            }
            DRAINING_UNORD => {
                while let Some(item) = state.unordered.pop() {
                    let tid = item.thread_id as usize;
                    state.threads[tid].inq.insert_tail(item);
                    shared.worker_conds[tid].notify_one();
                }
                step(&mut state, BARRIER);
            }
            EXITED => return,
            _ => unreachable!("no fifth planner state"),
        }
    }
}
