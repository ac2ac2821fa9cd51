use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use recordset::database::{MemoryDataSource, SqlValue};
use recordset::writer::{partition, WriteOptions};
use recordset::RecordSet;
use std::time::Duration;

fn encode(id: &i64) -> Vec<SqlValue> {
    vec![SqlValue::BigInt(*id), SqlValue::from("benchmark")]
}

fn benchmark_partition(c: &mut Criterion) {
    let records: Vec<i64> = (0..100_000).collect();
    c.bench_function("partition_100k_by_1000", |b| {
        b.iter(|| partition(black_box(&records), 1000).len())
    });
}

fn benchmark_batched_write(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let records: Vec<i64> = (0..10_000).collect();
    let mut group = c.benchmark_group("memory_write_10k");

    for workers in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let options = WriteOptions::new(500, workers, Duration::from_secs(60));
            b.iter(|| {
                let record_set = RecordSet::new(MemoryDataSource::new());
                runtime
                    .block_on(record_set.write_all(
                        &records,
                        "INSERT INTO readings (id, label) VALUES ($1, $2)",
                        encode,
                        &options,
                    ))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_partition, benchmark_batched_write);
criterion_main!(benches);
