//! Exercises the planner's barrier semantics directly through the public
//! `Pool` API: ordered work submitted under one tag, a barrier, then ordered
//! work under a different tag, plus unordered work submitted ahead of the
//! barrier that must drain before it releases.

use quorumsql::Pool;
use std::sync::mpsc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn barrier_separates_two_ordered_batches_and_drains_unordered_first() {
    let mut pool = Pool::new(4).unwrap();
    let (ord_tx, ord_rx) = mpsc::channel();
    let (unord_tx, unord_rx) = mpsc::channel();

    for i in 0..100 {
        let tx = ord_tx.clone();
        pool.submit_ordered(1, i, move || tx.send(("ord1", i)).unwrap(), None::<fn()>)
            .unwrap();
    }
    for i in 0..20 {
        let tx = unord_tx.clone();
        pool.submit_unordered(i, move || tx.send(i).unwrap(), None::<fn()>)
            .unwrap();
    }
    pool.submit_barrier(0).unwrap();
    for i in 0..100 {
        let tx = ord_tx.clone();
        pool.submit_ordered(2, i, move || tx.send(("ord2", i)).unwrap(), None::<fn()>)
            .unwrap();
    }
    drop(ord_tx);
    drop(unord_tx);

    let mut unordered_seen = Vec::new();
    for _ in 0..20 {
        unordered_seen.push(unord_rx.recv_timeout(TIMEOUT).unwrap());
    }
    unordered_seen.sort_unstable();
    assert_eq!(unordered_seen, (0..20).collect::<Vec<_>>());

    let mut ord1_count = 0;
    let mut ord2_started = false;
    for _ in 0..200 {
        let (batch, _) = ord_rx.recv_timeout(TIMEOUT).unwrap();
        if batch == "ord1" {
            assert!(!ord2_started, "ord2 item arrived before all ord1 items completed");
            ord1_count += 1;
        } else {
            ord2_started = true;
        }
    }
    assert_eq!(ord1_count, 100);

    pool.shutdown().unwrap();
}

#[test]
fn mismatched_ordered_tags_without_a_barrier_are_rejected() {
    let pool = Pool::new(2).unwrap();
    pool.submit_ordered(1, 0, || (), None::<fn()>).unwrap();
    assert!(pool.submit_ordered(2, 0, || (), None::<fn()>).is_err());
}

#[test]
fn barrier_resets_the_ordered_tag_so_a_new_tag_is_accepted() {
    let mut pool = Pool::new(2).unwrap();
    pool.submit_ordered(1, 0, || (), None::<fn()>).unwrap();
    pool.submit_barrier(0).unwrap();
    assert!(pool.submit_ordered(2, 0, || (), None::<fn()>).is_ok());
    pool.shutdown().unwrap();
}
