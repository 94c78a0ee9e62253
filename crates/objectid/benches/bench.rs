use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use objectid::{
    AllocationManager, Block, BlockAllocator, CounterStore, FileCounterStore, LocalGenerator,
    ManagerConfig, MemoryCounterStore, TypeDeclaration,
};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};
use tokio::runtime::Builder;

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

fn allocator<S: CounterStore>(store: S) -> BlockAllocator<S> {
    let allocator = BlockAllocator::new(
        store,
        1,
        vec![TypeDeclaration::new("user", 1, "Registered users")],
    )
    .unwrap();
    allocator.setup_types().unwrap();
    allocator
}

/// Issues IDs from one pre-filled generator on a single thread.
fn benchmark_generator_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/sequential");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let generator = LocalGenerator::new("user", 1);
                generator
                    .add_block(Block::new("user", 1, 1, 1, TOTAL_IDS as u64).unwrap())
                    .unwrap();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next().unwrap());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Issues IDs from one generator shared by several threads.
fn benchmark_generator_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/contended");

    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements((TOTAL_IDS * threads) as u64));
        group.bench_function(format!("threads/{threads}/elems/{TOTAL_IDS}"), |b| {
            b.iter_custom(|iters| {
                let mut elapsed = core::time::Duration::ZERO;
                for _ in 0..iters {
                    let generator = LocalGenerator::new("user", 1);
                    generator
                        .add_block(
                            Block::new("user", 1, 1, 1, (TOTAL_IDS * threads) as u64).unwrap(),
                        )
                        .unwrap();
                    let barrier = Barrier::new(threads + 1);
                    let start = scope(|s| {
                        for _ in 0..threads {
                            s.spawn(|| {
                                barrier.wait();
                                for _ in 0..TOTAL_IDS {
                                    black_box(generator.next().unwrap());
                                }
                            });
                        }
                        barrier.wait();
                        Instant::now()
                    });
                    elapsed += start.elapsed();
                }
                elapsed
            });
        });
    }

    group.finish();
}

/// Reserves blocks from an in-memory counter.
fn benchmark_allocator_memory(c: &mut Criterion) {
    let allocator = allocator(MemoryCounterStore::new());
    let mut group = c.benchmark_group("allocator/memory");
    group.throughput(Throughput::Elements(1));
    group.bench_function("block/100", |b| {
        b.iter(|| black_box(allocator.generate_block("user", 100).unwrap()));
    });
    group.finish();
}

/// Reserves blocks from a file-backed counter; dominated by fsync.
fn benchmark_allocator_file(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let allocator = allocator(FileCounterStore::open(dir.path()).unwrap());
    let mut group = c.benchmark_group("allocator/file");
    group.sample_size(20);
    group.throughput(Throughput::Elements(1));
    group.bench_function("block/100", |b| {
        b.iter(|| black_box(allocator.generate_block("user", 100).unwrap()));
    });
    group.finish();
}

/// Issues IDs through the manager with an in-process source, including
/// refills every `request_size` values.
fn benchmark_manager_tokio(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager/tokio");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for request_size in [100, 1_000] {
        group.bench_function(format!("request/{request_size}/elems/{TOTAL_IDS}"), |b| {
            let rt = Builder::new_multi_thread()
                .enable_all()
                .worker_threads(1)
                .build()
                .unwrap();

            b.to_async(&rt).iter_custom(|iters| async move {
                let start = Instant::now();
                for _ in 0..iters {
                    let manager = AllocationManager::new(
                        Arc::new(allocator(MemoryCounterStore::new())),
                        ManagerConfig::new(request_size, request_size / 5).unwrap(),
                    );
                    for _ in 0..TOTAL_IDS {
                        black_box(manager.generate_id("user").await.unwrap());
                    }
                }
                start.elapsed()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_generator_sequential,
    benchmark_generator_contended,
    benchmark_allocator_memory,
    benchmark_allocator_file,
    benchmark_manager_tokio,
);
criterion_main!(benches);
