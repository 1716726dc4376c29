//! Memory pool benchmarks
//!
//! Measures pool bookkeeping cost on the mock runtime:
//! - fresh allocation vs. first-fit reuse
//! - first-fit scan length with many free blocks
//! - cleanup of large pools
//!
//! Run with: `cargo bench --bench pool_bench`

use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use keplerforge::memory::MemoryPool;
use keplerforge::MockRuntime;

struct Benchmark {
    name: String,
    iterations: usize,
    warmup_iterations: usize,
}

impl Benchmark {
    fn new(name: &str, iterations: usize) -> Self {
        Benchmark {
            name: name.to_string(),
            iterations,
            warmup_iterations: iterations.min(10),
        }
    }

    fn run<F, R>(&self, mut f: F) -> BenchmarkResult
    where
        F: FnMut() -> R,
    {
        for _ in 0..self.warmup_iterations {
            black_box(f());
        }

        let mut durations = Vec::with_capacity(self.iterations);
        for _ in 0..self.iterations {
            let start = Instant::now();
            black_box(f());
            durations.push(start.elapsed());
        }

        BenchmarkResult {
            name: self.name.clone(),
            durations,
        }
    }
}

struct BenchmarkResult {
    name: String,
    durations: Vec<Duration>,
}

impl BenchmarkResult {
    fn report(&self) {
        if self.durations.is_empty() {
            return;
        }
        let mut sorted = self.durations.clone();
        sorted.sort();
        let total: Duration = sorted.iter().sum();
        let avg = total / sorted.len() as u32;
        let p50 = sorted[sorted.len() / 2];
        let p99 = sorted[(sorted.len() * 99) / 100];

        println!("\n=== {} ===", self.name);
        println!("Iterations: {}", sorted.len());
        println!("Average: {:?}", avg);
        println!("Min:     {:?}", sorted[0]);
        println!("P50:     {:?}", p50);
        println!("P99:     {:?}", p99);
    }
}

fn fresh_runtime() -> Arc<MockRuntime> {
    Arc::new(MockRuntime::new().with_free_memory(u64::MAX / 2))
}

fn benchmark_fresh_vs_reuse() {
    println!("\n[Fresh Allocation vs Reuse]");
    println!("===========================");

    let runtime = fresh_runtime();
    Benchmark::new("Fresh 64 KB allocation + cleanup", 200)
        .run(|| {
            let mut pool = MemoryPool::new(Arc::clone(&runtime));
            let h = pool.allocate(64 * 1024).ok();
            let _ = pool.cleanup();
            h
        })
        .report();

    let mut pool = MemoryPool::new(fresh_runtime());
    let warm = pool.allocate(64 * 1024).ok();
    if let Some(h) = warm {
        pool.free(h);
    }
    Benchmark::new("Reuse of a free 64 KB block", 1000)
        .run(|| {
            let h = pool.allocate(32 * 1024).ok();
            if let Some(h) = h {
                pool.free(h);
            }
            h
        })
        .report();
}

fn benchmark_first_fit_scan() {
    println!("\n[First-Fit Scan Length]");
    println!("=======================");

    for block_count in [16usize, 256, 4096] {
        let mut pool = MemoryPool::new(fresh_runtime());
        let handles: Vec<_> = (0..block_count)
            .filter_map(|_| pool.allocate(256).ok())
            .collect();
        // Only the last block is large enough, so every request scans the whole list
        let tail = pool.allocate(1 << 20).ok();
        for h in handles.iter().chain(tail.iter()) {
            pool.free(*h);
        }

        Benchmark::new(&format!("Scan past {} small free blocks", block_count), 500)
            .run(|| {
                let h = pool.allocate(1 << 20).ok();
                if let Some(h) = h {
                    pool.free(h);
                }
                h
            })
            .report();
    }
}

fn benchmark_cleanup() {
    println!("\n[Cleanup]");
    println!("=========");

    let runtime = fresh_runtime();
    for block_count in [64usize, 1024] {
        Benchmark::new(&format!("Cleanup of {} blocks", block_count), 50)
            .run(|| {
                let mut pool = MemoryPool::new(Arc::clone(&runtime));
                for i in 0..block_count {
                    let _ = pool.allocate(256 * (i % 8 + 1));
                }
                pool.cleanup().is_ok()
            })
            .report();
    }
}

fn main() {
    println!("====================================");
    println!("keplerforge Memory Pool Benchmarks");
    println!("====================================");

    benchmark_fresh_vs_reuse();
    benchmark_first_fit_scan();
    benchmark_cleanup();
}
