//! Worker threads: each owns one inbox queue, fed by the planner, and runs
//! whatever work lands there until told to exit.

use super::{Completed, Shared, WorkKind};

pub fn run(shared: &Shared, idx: usize) {
    #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
    let mut state = shared.mutex.lock().unwrap();
    loop {
        while state.threads[idx].inq.is_empty() {
            if state.exiting {
                return;
            }
            #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
            {
                state = shared.worker_conds[idx].wait(state).unwrap();
            }
        }

        let item = state.threads[idx].inq.pop().expect("checked non-empty above");
        drop(state);

        let kind = item.kind;
        if let Some(work) = item.work {
            work();
        }

        {
            #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
            let mut outq = shared.outq.lock().unwrap();
            outq.insert_tail(Completed {
                kind,
                after_work: item.after_work,
            });
            shared.outq_cond.notify_one();
        }

        #[expect(clippy::unwrap_used, reason = "a poisoned pool mutex is already fatal")]
        {
            state = shared.mutex.lock().unwrap();
        }
        if matches!(kind, WorkKind::Ordered(_)) {
            assert!(state.in_flight > 0, "in_flight underflow");
            state.in_flight -= 1;
            if state.in_flight == 0 {
                shared.planner_cond.notify_one();
            }
        }
    }
}
