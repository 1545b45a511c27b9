use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_stereo::prelude::*;

/// Deterministic texture so the benchmark input is stable between runs.
fn textured(width: usize, height: usize, shift_x: usize) -> GrayFloatImage {
    GrayFloatImage::from_fn(width, height, |x, y| {
        let mut h = (x + shift_x).wrapping_mul(0x9e37_79b9) ^ y.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        ((h >> 7) % 97) as f32
    })
}

fn matching_bench(c: &mut Criterion) {
    let params = Params {
        window_size: 9,
        disparity_search_width: 32,
        disparity_max: 31,
        ..Params::default()
    };

    // Build frame
    let frame = StereoFrame::new(textured(256, 192, 0), textured(256, 192, 5));

    // Benchmark compute function of both strategies
    let mut sad = StereoMatcher::sad(params.clone()).unwrap();
    c.bench_function("sad 256x192 d32", |b| {
        b.iter(|| sad.compute(black_box(&frame)))
    });

    let mut guided = StereoMatcher::guided(params).unwrap();
    c.bench_function("guided 256x192 d32", |b| {
        b.iter(|| guided.compute(black_box(&frame)))
    });
}

criterion_group!(benches, matching_bench);
criterion_main!(benches);
