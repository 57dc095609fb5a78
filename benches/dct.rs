//! Microbenchmarks for the forward and inverse transforms.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jpeg_oxide::dct::forward_dct_8x8;
use jpeg_oxide::idct::{inverse_dct_8x8, inverse_dct_8x8_to_16x16};

fn sample_block() -> [i16; 64] {
    let mut block = [0i16; 64];
    for (i, s) in block.iter_mut().enumerate() {
        *s = ((i as i16 * 13) % 255) - 128;
    }
    block
}

fn bench_forward(c: &mut Criterion) {
    let samples = sample_block();
    let mut coeffs = [0i32; 64];
    c.bench_function("forward_dct_8x8", |b| {
        b.iter(|| {
            forward_dct_8x8(black_box(&samples), &mut coeffs);
            black_box(coeffs[0])
        })
    });
}

fn bench_inverse(c: &mut Criterion) {
    let samples = sample_block();
    let mut coeffs = [0i32; 64];
    forward_dct_8x8(&samples, &mut coeffs);
    let mut out = [0u8; 64];
    c.bench_function("inverse_dct_8x8", |b| {
        b.iter(|| {
            inverse_dct_8x8(black_box(&coeffs), &mut out);
            black_box(out[0])
        })
    });
}

fn bench_upsampling_inverse(c: &mut Criterion) {
    let samples = sample_block();
    let mut coeffs = [0i32; 64];
    forward_dct_8x8(&samples, &mut coeffs);
    let mut out = [0u8; 256];
    c.bench_function("inverse_dct_8x8_to_16x16", |b| {
        b.iter(|| {
            inverse_dct_8x8_to_16x16(black_box(&coeffs), &mut out);
            black_box(out[0])
        })
    });
}

criterion_group!(benches, bench_forward, bench_inverse, bench_upsampling_inverse);
criterion_main!(benches);
