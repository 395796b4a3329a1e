//! mvkv demo driver — a concurrent swap workload against the store.
//!
//! Seeds N keys with values `100..100+N`, runs W worker threads each
//! performing T transactions that swap the values of a random key pair, then
//! prints per-worker outcome counts, the store dump and a value-conservation
//! check: since every committed transaction is a pure swap, the sum of all
//! values must never change.

use std::process;
use std::thread;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, Command};
use mvkv_core::{Error, Result};
use mvkv_engine::{Session, Store, StoreBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn build_cli() -> Command {
    Command::new("mvkv")
        .about("Concurrent swap workload against the mvkv transactional store")
        .arg(
            Arg::new("keys")
                .long("keys")
                .value_parser(value_parser!(usize))
                .default_value("8")
                .help("Number of keys to seed"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_parser(value_parser!(usize))
                .default_value("4")
                .help("Number of worker threads"),
        )
        .arg(
            Arg::new("txns")
                .long("txns")
                .value_parser(value_parser!(usize))
                .default_value("100")
                .help("Transactions per worker"),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .value_parser(value_parser!(u64))
                .default_value("10")
                .help("Deadlock monitor scan interval in milliseconds"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("42")
                .help("RNG seed for the workload"),
        )
        .arg(
            Arg::new("retry")
                .long("retry")
                .action(ArgAction::SetTrue)
                .help("Retry conflicted and victimized transactions until they commit"),
        )
}

#[derive(Default)]
struct WorkerReport {
    commits: u64,
    conflicts: u64,
    lock_aborts: u64,
}

/// One swap attempt: read both keys at the snapshot, write them crossed.
fn try_swap(session: &mut Session<i64>, a: usize, b: usize) -> Result<()> {
    let mut tx = session.begin();
    let va = tx.read(a)?;
    let vb = tx.read(b)?;
    tx.write(a, vb)?;
    tx.write(b, va)?;
    tx.commit()?;
    Ok(())
}

fn worker_loop(
    mut session: Session<i64>,
    num_keys: usize,
    txns: usize,
    seed: u64,
    retry: bool,
) -> Result<WorkerReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = WorkerReport::default();

    for _ in 0..txns {
        let a = rng.gen_range(0..num_keys);
        let mut b = rng.gen_range(0..num_keys);
        while b == a {
            b = rng.gen_range(0..num_keys);
        }

        loop {
            match try_swap(&mut session, a, b) {
                Ok(()) => {
                    report.commits += 1;
                    break;
                }
                Err(err @ Error::ValidationConflict { .. }) => {
                    report.conflicts += 1;
                    tracing::debug!(worker = session.worker(), %err, "swap lost the race");
                }
                Err(err @ Error::LockAborted { .. }) => {
                    report.lock_aborts += 1;
                    tracing::warn!(worker = session.worker(), %err, "swap victimized");
                }
                Err(err) => return Err(err),
            }
            if !retry {
                break;
            }
        }
    }

    Ok(report)
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    let num_keys = *matches.get_one::<usize>("keys").unwrap_or(&8);
    let workers = *matches.get_one::<usize>("workers").unwrap_or(&4);
    let txns = *matches.get_one::<usize>("txns").unwrap_or(&100);
    let interval = Duration::from_millis(*matches.get_one::<u64>("interval-ms").unwrap_or(&10));
    let seed = *matches.get_one::<u64>("seed").unwrap_or(&42);
    let retry = matches.get_flag("retry");

    let initial: Vec<i64> = (0..num_keys).map(|k| 100 + k as i64).collect();
    let expected_sum: i64 = initial.iter().sum();

    let store = StoreBuilder::new().monitor_interval(interval).build(initial);

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let session = store.register();
            thread::spawn(move || worker_loop(session, num_keys, txns, seed ^ w as u64, retry))
        })
        .collect();

    for (w, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(report) => {
                let report = report?;
                println!(
                    "worker {w}: {} committed, {} conflicts, {} lock aborts",
                    report.commits, report.conflicts, report.lock_aborts
                );
            }
            Err(_) => {
                eprintln!("worker {w} panicked");
                process::exit(1);
            }
        }
    }

    let stats = store.stats();
    println!(
        "store: {} committed, {} conflicts, {} lock aborts, {} deadlock victims",
        stats.committed, stats.conflicts, stats.lock_aborts, stats.deadlock_victims
    );
    println!("{}", store.dump());

    let final_sum: i64 = (0..num_keys).map(|k| store.latest(k)).sum::<Result<i64>>()?;
    if final_sum == expected_sum {
        println!("value conservation: OK (sum = {final_sum})");
        Ok(())
    } else {
        eprintln!("value conservation: FAILED (expected {expected_sum}, got {final_sum})");
        process::exit(1);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = build_cli().get_matches();
    if let Err(err) = run(&matches) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
