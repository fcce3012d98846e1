//! Standalone timing driver for the blackboard's copy-on-write operations.
//!
//! Exercises the "tens to low hundreds of nanoseconds per clone, 20-60 ns
//! per read" profile without pulling `criterion` into the runtime
//! dependency graph.

use brain_kernel::Blackboard;
use serde_json::json;
use std::time::Instant;

const CLONE_ITERS: u32 = 50_000;
const READ_ITERS: u32 = 50_000;
const SET_ITERS: u32 = 50_000;

fn main() {
    bench_clone();
    bench_read();
    bench_set();
}

fn bench_clone() {
    let root = Blackboard::new("bench");
    root.set("seed", json!("value"));

    let mut current = root;
    let start = Instant::now();
    for _ in 0..CLONE_ITERS {
        current = current.clone();
    }
    let elapsed = start.elapsed();
    report("clone()", CLONE_ITERS, elapsed);
}

fn bench_read() {
    let root = Blackboard::new("bench");
    for i in 0..8 {
        root.set(format!("k{i}"), json!(i));
    }
    let leaf = root.clone();

    let start = Instant::now();
    for i in 0..READ_ITERS {
        std::hint::black_box(leaf.get(&format!("k{}", i % 8)));
    }
    let elapsed = start.elapsed();
    report("get()", READ_ITERS, elapsed);
}

fn bench_set() {
    let root = Blackboard::new("bench");

    let start = Instant::now();
    for i in 0..SET_ITERS {
        root.set(format!("k{i}"), json!(i));
    }
    let elapsed = start.elapsed();
    report("set()", SET_ITERS, elapsed);
}

fn report(label: &str, iters: u32, elapsed: std::time::Duration) {
    let per_op_ns = elapsed.as_nanos() as f64 / iters as f64;
    println!("{label:<10} {iters:>7} iters in {elapsed:?} ({per_op_ns:.1} ns/op)");
}
