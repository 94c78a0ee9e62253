use crate::{Block, Error, LocalGenerator};
use std::collections::HashSet;
use std::sync::Mutex;
use std::thread::scope;

fn block(start: u64, end: u64) -> Block {
    Block::new("user", 1, 7, start, end).unwrap()
}

fn drain(generator: &LocalGenerator) -> Vec<u64> {
    let mut values = Vec::new();
    while let Ok(id) = generator.next() {
        values.push(id.value);
    }
    values
}

#[test]
fn empty_generator_is_exhausted() {
    let generator = LocalGenerator::new("user", 1);
    assert_eq!(generator.available(), 0);
    assert!(matches!(generator.next(), Err(Error::Exhausted { .. })));
}

#[test]
fn first_value_is_block_start() {
    let generator = LocalGenerator::new("user", 1);
    generator.add_block(block(6, 10)).unwrap();

    let id = generator.next().unwrap();
    assert_eq!(id.value, 6);
    assert_eq!(id.type_id, 1);
    assert_eq!(id.source_id, 7);
    assert_eq!(generator.available(), 4);
}

#[test]
fn walks_blocks_in_fifo_order() {
    let generator = LocalGenerator::new("user", 1);
    generator.add_block(block(1, 3)).unwrap();
    generator.add_block(block(10, 11)).unwrap();
    generator.add_block(block(20, 20)).unwrap();
    assert_eq!(generator.available(), 6);
    assert_eq!(generator.buffered_blocks(), 3);

    assert_eq!(drain(&generator), vec![1, 2, 3, 10, 11, 20]);
    assert_eq!(generator.available(), 0);
    assert_eq!(generator.buffered_blocks(), 0);
}

#[test]
fn available_tracks_partial_head() {
    let generator = LocalGenerator::new("user", 1);
    generator.add_block(block(1, 5)).unwrap();
    generator.next().unwrap();
    generator.next().unwrap();
    assert_eq!(generator.available(), 3);

    generator.add_block(block(6, 10)).unwrap();
    assert_eq!(generator.available(), 8);
}

#[test]
fn refill_after_exhaustion_resumes_at_new_start() {
    let generator = LocalGenerator::new("user", 1);
    generator.add_block(block(1, 2)).unwrap();
    assert_eq!(drain(&generator), vec![1, 2]);
    assert!(matches!(generator.next(), Err(Error::Exhausted { .. })));

    generator.add_block(block(3, 4)).unwrap();
    assert_eq!(drain(&generator), vec![3, 4]);
}

#[test]
fn rejects_block_for_other_type() {
    let generator = LocalGenerator::new("user", 1);
    let by_id = Block::new("user", 2, 7, 1, 5).unwrap();
    let by_name = Block::new("order", 1, 7, 1, 5).unwrap();
    assert!(matches!(
        generator.add_block(by_id),
        Err(Error::InvalidRequest { .. })
    ));
    assert!(matches!(
        generator.add_block(by_name),
        Err(Error::InvalidRequest { .. })
    ));
    assert_eq!(generator.available(), 0);
}

#[test]
fn rejects_block_that_would_go_backwards() {
    let generator = LocalGenerator::new("user", 1);
    generator.add_block(block(10, 20)).unwrap();
    assert!(generator.add_block(block(5, 9)).is_err());
    assert!(generator.add_block(block(20, 30)).is_err());
    assert_eq!(generator.available(), 11);

    // Even once everything is consumed, old ranges stay refused.
    drain(&generator);
    assert!(generator.add_block(block(1, 5)).is_err());
    generator.add_block(block(21, 21)).unwrap();
}

#[test]
fn output_is_strictly_increasing() {
    let generator = LocalGenerator::new("user", 1);
    for i in 0..100 {
        generator.add_block(block(i * 50 + 1, i * 50 + 25)).unwrap();
    }

    let values = drain(&generator);
    assert_eq!(values.len(), 2_500);
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn concurrent_consumers_never_share_a_value() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 1_000;

    let generator = LocalGenerator::new("user", 1);
    generator
        .add_block(block(1, (THREADS * PER_THREAD) as u64))
        .unwrap();

    let seen = Mutex::new(HashSet::with_capacity(THREADS * PER_THREAD));
    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut local = Vec::with_capacity(PER_THREAD);
                let mut last = 0;
                for _ in 0..PER_THREAD {
                    let value = generator.next().unwrap().value;
                    // Each thread observes its own values in increasing order.
                    assert!(value > last);
                    last = value;
                    local.push(value);
                }
                let mut seen = seen.lock().unwrap();
                for value in local {
                    assert!(seen.insert(value), "duplicate value {value}");
                }
            });
        }
    });

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), THREADS * PER_THREAD);
    assert_eq!(generator.available(), 0);
    assert!(generator.next().is_err());
}
