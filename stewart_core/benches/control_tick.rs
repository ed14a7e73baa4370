use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use stewart_core::{NUM_ACTUATORS, Platform, SmoothingFilter};
use stewart_hardware::SimulatedActuator;
use stewart_traits::clock::test_clock::TestClock;

// Noisy feedback trace from a tiny xorshift PRNG
fn synth_trace(n: usize, seed: u32) -> Vec<u16> {
    let mut state = seed.max(1);
    (0..n)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let base = 512.0 + 400.0 * (i as f32 / 300.0).sin();
            (base as i32 + (state % 9) as i32 - 4).clamp(0, 1023) as u16
        })
        .collect()
}

pub fn bench_filter(c: &mut Criterion) {
    let trace = synth_trace(10_000, 0xC0FFEE);
    c.bench_function("filter_push_10k", |b| {
        b.iter_batched(
            || SmoothingFilter::new(5),
            |mut f| {
                for &s in &trace {
                    black_box(f.push(s));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn bench_platform_tick(c: &mut Criterion) {
    c.bench_function("platform_tick_hold", |b| {
        b.iter_batched(
            || {
                let clock = TestClock::new();
                let mut p = Platform::builder()
                    .with_actuators(std::array::from_fn(|_| SimulatedActuator::default()))
                    .with_clock(Arc::new(clock))
                    .build()
                    .unwrap();
                p.calibrate_with(&[[100, 900]; NUM_ACTUATORS]).unwrap();
                for _ in 0..5 {
                    p.tick().unwrap();
                }
                p.set_platform_lengths(&[0.5; NUM_ACTUATORS]).unwrap();
                p
            },
            |mut p| {
                for _ in 0..100 {
                    black_box(p.tick().unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_filter, bench_platform_tick);
criterion_main!(benches);
