//! three-stage fan-out/fan-in pipeline
//!
//! a producer publishes consecutive integers into a source ring; two parallel
//! stages compute squares and cubes into their own rings; a final stage
//! follows both and checks cube - square. the producer gates on the final
//! stage so no ring ever laps an unconsumed slot.
//!
//! run with: cargo run --release --example three_stage

use std::sync::Arc;
use std::thread;
use std::time::Instant;
use weir_pipeline::{ReadCursor, RingBuffer, WaitError, WriteCursor};

const CAPACITY: usize = 1024;
const EVENTS: i64 = 1_000_000;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let source = Arc::new(RingBuffer::<i64>::new(CAPACITY));
    let squares = Arc::new(RingBuffer::<i64>::new(CAPACITY));
    let cubes = Arc::new(RingBuffer::<i64>::new(CAPACITY));

    let mut producer = WriteCursor::new("producer", CAPACITY);
    let mut square_stage = ReadCursor::new("square");
    let mut cube_stage = ReadCursor::new("cube");
    let mut diff_stage = ReadCursor::new("diff");

    // wire the DAG before any thread starts
    square_stage.follows(producer.cursor());
    cube_stage.follows(producer.cursor());
    diff_stage.follows(square_stage.cursor());
    diff_stage.follows(cube_stage.cursor());
    producer.follows(diff_stage.cursor());

    let start = Instant::now();

    let producer_thread = thread::spawn({
        let source = Arc::clone(&source);
        move || {
            for i in 0..EVENTS {
                let pos = producer.wait_next().unwrap();
                // safety: wait_next validated pos against the diff stage
                unsafe { *source.get_mut(pos) = i }
                producer.publish(pos);
            }
            producer.set_eof();
        }
    });

    let square_thread = thread::spawn({
        let source = Arc::clone(&source);
        let squares = Arc::clone(&squares);
        move || {
            run_stage(&mut square_stage, |pos| {
                // safety: pos is published upstream; our publication gates
                // the diff stage's reads
                unsafe {
                    let v = *source.get(pos);
                    *squares.get_mut(pos) = v * v;
                }
            })
        }
    });

    let cube_thread = thread::spawn({
        let source = Arc::clone(&source);
        let cubes = Arc::clone(&cubes);
        move || {
            run_stage(&mut cube_stage, |pos| {
                // safety: same gating as the square stage
                unsafe {
                    let v = *source.get(pos);
                    *cubes.get_mut(pos) = v * v * v;
                }
            })
        }
    });

    let diff_thread = thread::spawn({
        let squares = Arc::clone(&squares);
        let cubes = Arc::clone(&cubes);
        move || {
            run_stage(&mut diff_stage, |pos| {
                // safety: both upstream stages published pos
                let (s, c) = unsafe { (*squares.get(pos), *cubes.get(pos)) };
                assert_eq!(c - s, pos * pos * pos - pos * pos);
            })
        }
    });

    producer_thread.join().unwrap();
    let processed = [
        square_thread.join().unwrap(),
        cube_thread.join().unwrap(),
        diff_thread.join().unwrap(),
    ];
    let elapsed = start.elapsed();

    assert_eq!(processed, [EVENTS; 3]);
    println!("{} events through 3 stages in {:?}", EVENTS, elapsed);
    println!(
        "{:.1}M events/sec",
        EVENTS as f64 / elapsed.as_secs_f64() / 1e6
    );
}

/// drive one consumer stage to eof, applying `work` to every position.
fn run_stage<F: FnMut(i64)>(stage: &mut ReadCursor, mut work: F) -> i64 {
    let mut pos = 0i64;
    loop {
        match stage.wait_for(pos) {
            Ok(end) => {
                while pos < end {
                    work(pos);
                    stage.publish(pos);
                    pos += 1;
                }
            }
            Err(WaitError::Eof) => break pos,
            Err(e) => panic!("stage failed: {e}"),
        }
    }
}
