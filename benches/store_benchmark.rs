use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cxdb::{CompressionRegistry, CounterexampleDatabase, DatabaseConfig, Metadata};
use tempfile::tempdir;

fn sample_value(size: usize) -> Vec<u8> {
    b"LINE\n8\nWALLS\n10\n0.0\n20\n0.0\n11\n12.5\n21\n3.75\n"
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect()
}

fn bench_codecs(c: &mut Criterion) {
    let registry = CompressionRegistry::with_builtins();
    let value = sample_value(16 * 1024);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(value.len() as u64));
    for name in registry.names() {
        let Some(codec) = registry.get(&name) else {
            continue;
        };
        let compressed = codec.compress(&value).unwrap();

        group.bench_with_input(BenchmarkId::new("compress", &name), &value, |b, value| {
            b.iter(|| codec.compress(black_box(value)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decompress", &name), &compressed, |b, data| {
            b.iter(|| codec.decompress(black_box(data)).unwrap())
        });
    }
    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let value = sample_value(1024);

    c.bench_function("store_in_memory", |b| {
        let db = CounterexampleDatabase::new(DatabaseConfig::in_memory()).unwrap();
        b.iter(|| {
            db.store("bench", "p", black_box(&value), "e", Metadata::new())
                .unwrap()
        })
    });

    c.bench_function("store_write_through", |b| {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig::from_file(dir.path().join("bench.db"));
        let db = CounterexampleDatabase::new(config).unwrap();
        b.iter(|| {
            db.store("bench", "p", black_box(&value), "e", Metadata::new())
                .unwrap()
        })
    });
}

fn bench_export(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("export.pbtc");
    let config = DatabaseConfig::in_memory().with_auto_cleanup(false);
    let db = CounterexampleDatabase::new(config).unwrap();
    for n in 0..500 {
        db.store(&format!("test-{}", n % 25), "p", &sample_value(512), "e", Metadata::new())
            .unwrap();
    }

    c.bench_function("export_500", |b| {
        b.iter(|| db.export_to_file(black_box(&path)).unwrap())
    });
}

criterion_group!(benches, bench_codecs, bench_store, bench_export);
criterion_main!(benches);
