use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vfa::codec::{self, Method};

fn bench_compression(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];
    c.bench_function("zstd_compress_1mb", |b| b.iter(|| codec::compress(Method::Zstd, 5, black_box(&data))));
    c.bench_function("zlib_compress_1mb", |b| b.iter(|| codec::compress(Method::Zlib, 6, black_box(&data))));
    c.bench_function("brotli_compress_1mb", |b| b.iter(|| codec::compress(Method::Brotli, 5, black_box(&data))));
}

criterion_group!(benches, bench_compression);
criterion_main!(benches);
