use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use disco_core::{decrypt_symmetric, encrypt_symmetric, SymmetricKey};

fn bench_seal_open(c: &mut Criterion) {
    let key = SymmetricKey::generate();
    let mut group = c.benchmark_group("symmetric");

    for size in [64usize, 16 * 1024, 1024 * 1024] {
        let plaintext = vec![0xA5u8; size];
        let sealed = encrypt_symmetric(&plaintext, &key).unwrap();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encrypt", size), &plaintext, |b, p| {
            b.iter(|| encrypt_symmetric(black_box(p), &key).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decrypt", size), &sealed, |b, s| {
            b.iter(|| decrypt_symmetric(black_box(s), &key).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_seal_open);
criterion_main!(benches);
