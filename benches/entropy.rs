//! Microbenchmark for baseline entropy coding of a typical block.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jpeg_oxide::bitstream::BitWriter;
use jpeg_oxide::entropy::EntropyEncoder;
use jpeg_oxide::huffman::{DerivedTable, HuffTable};

fn bench_encode_block(c: &mut Criterion) {
    let dc = DerivedTable::derive(&HuffTable::std_dc_luma()).unwrap();
    let ac = DerivedTable::derive(&HuffTable::std_ac_luma()).unwrap();

    // A sparse block shaped like real quantized output.
    let mut block = [0i16; 64];
    block[0] = -53;
    for (zigzag, value) in [(1, 17), (2, -9), (3, 4), (5, -2), (9, 1), (17, -1)] {
        block[jpeg_oxide::consts::JPEG_NATURAL_ORDER[zigzag]] = value;
    }

    c.bench_function("entropy_encode_block", |b| {
        b.iter(|| {
            let mut encoder = EntropyEncoder::new(BitWriter::new(Vec::with_capacity(128)));
            encoder
                .encode_block(black_box(&block), 0, &dc, &ac)
                .unwrap();
            black_box(encoder.into_writer().unwrap().into_inner().len())
        })
    });
}

criterion_group!(benches, bench_encode_block);
criterion_main!(benches);
