//! End-to-end stress: concurrent random-pair swaps must conserve the
//! multiset of stored values, because every committed transaction is a pure
//! swap and failed transactions publish nothing.

use mvkv::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Duration;

const NUM_KEYS: usize = 8;
const WORKERS: usize = 4;
const TXNS_PER_WORKER: usize = 100;

fn swap_once(session: &mut Session<i64>, a: usize, b: usize) -> Result<Timestamp> {
    let mut tx = session.begin();
    let va = tx.read(a)?;
    let vb = tx.read(b)?;
    tx.write(a, vb)?;
    tx.write(b, va)?;
    tx.commit()
}

#[test]
fn concurrent_swaps_conserve_values() {
    let initial: Vec<i64> = (0..NUM_KEYS).map(|k| 100 + k as i64).collect();
    let expected_sum: i64 = initial.iter().sum();
    let mut expected_values = initial.clone();
    expected_values.sort_unstable();

    let store = StoreBuilder::new()
        .monitor_interval(Duration::from_millis(10))
        .build(initial);

    let mut handles = Vec::new();
    for w in 0..WORKERS {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            let mut session = store.register();
            let mut rng = StdRng::seed_from_u64(0xABCD + w as u64);
            let mut minted = Vec::new();

            for _ in 0..TXNS_PER_WORKER {
                let a = rng.gen_range(0..NUM_KEYS);
                let mut b = rng.gen_range(0..NUM_KEYS);
                while b == a {
                    b = rng.gen_range(0..NUM_KEYS);
                }

                // Retry retryable outcomes until the swap lands; anything
                // else would be a store bug.
                loop {
                    match swap_once(&mut session, a, b) {
                        Ok(ts) => {
                            minted.push(ts);
                            break;
                        }
                        Err(err) if err.is_retryable() => continue,
                        Err(err) => panic!("unexpected transaction failure: {err}"),
                    }
                }
            }
            minted
        }));
    }

    let mut all_timestamps: Vec<Timestamp> = Vec::new();
    for handle in handles {
        all_timestamps.extend(handle.join().unwrap());
    }

    // Every worker committed every swap exactly once.
    assert_eq!(all_timestamps.len(), WORKERS * TXNS_PER_WORKER);
    all_timestamps.sort_unstable();
    let before = all_timestamps.len();
    all_timestamps.dedup();
    assert_eq!(before, all_timestamps.len(), "commit timestamps must be unique");

    // Swaps permute values; they never create or destroy them.
    let mut final_values: Vec<i64> = (0..NUM_KEYS).map(|k| store.latest(k).unwrap()).collect();
    assert_eq!(final_values.iter().sum::<i64>(), expected_sum);
    final_values.sort_unstable();
    assert_eq!(final_values, expected_values);

    let stats = store.stats();
    assert_eq!(stats.committed, (WORKERS * TXNS_PER_WORKER) as u64);
    assert_eq!(
        stats.deadlock_victims, 0,
        "sorted lock order keeps the swap workload cycle-free"
    );
}

#[test]
fn contended_single_pair_swaps_still_conserve() {
    // Worst case: every transaction touches the same two keys.
    let store = Store::new(vec![1_i64, 2]);

    let mut handles = Vec::new();
    for w in 0..WORKERS {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            let mut session = store.register();
            let mut committed = 0_u64;
            for _ in 0..50 {
                loop {
                    match swap_once(&mut session, 0, 1) {
                        Ok(_) => {
                            committed += 1;
                            break;
                        }
                        Err(err) if err.is_retryable() => continue,
                        Err(err) => panic!("worker {w}: {err}"),
                    }
                }
            }
            committed
        }));
    }

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, (WORKERS * 50) as u64);

    let mut finals = [store.latest(0).unwrap(), store.latest(1).unwrap()];
    finals.sort_unstable();
    assert_eq!(finals, [1, 2]);

    // An even number of total swaps restores the initial placement.
    assert_eq!(store.latest(0).unwrap(), 1);
    assert_eq!(store.latest(1).unwrap(), 2);
}

#[test]
fn version_history_stays_readable_under_load() {
    let store = Store::new(vec![0_i64; 2]);

    // Pin a snapshot, then bury the keys under many versions.
    let mut reader = store.register();
    let pinned = reader.begin();

    let mut writer = store.register();
    for round in 1..=200 {
        let mut tx = writer.begin();
        tx.write(0, round).unwrap();
        tx.write(1, -round).unwrap();
        tx.commit().unwrap();
    }

    assert_eq!(pinned.read(0).unwrap(), 0);
    assert_eq!(pinned.read(1).unwrap(), 0);
    drop(pinned);

    assert_eq!(store.latest(0).unwrap(), 200);
    assert_eq!(store.latest(1).unwrap(), -200);
}
