#[macro_use]
extern crate criterion;
extern crate rand;
extern crate xorfuse;

use criterion::{BenchmarkId, Criterion};
use rand::Rng;
use xorfuse::{BinaryFuse8, BinaryFuseBuilder, Filter};

const SAMPLE_SIZE: u32 = 500_000;

fn serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("BinaryFuse8");
    let group = group.sample_size(10);

    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

    let filter = BinaryFuse8::try_from(keys).unwrap();

    group.bench_with_input(
        BenchmarkId::new("to_bytes", SAMPLE_SIZE),
        &filter,
        |b, filter| {
            b.iter(|| filter.to_bytes());
        },
    );

    let serialized_filter = filter.to_bytes();

    group.bench_with_input(
        BenchmarkId::new("from_bytes", SAMPLE_SIZE),
        &serialized_filter,
        |b, bytes| {
            b.iter(|| BinaryFuse8::from_bytes(bytes).unwrap());
        },
    );
}

fn from(c: &mut Criterion) {
    let mut group = c.benchmark_group("BinaryFuse8");
    let group = group.sample_size(10);

    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

    group.bench_with_input(BenchmarkId::new("from", SAMPLE_SIZE), &keys, |b, keys| {
        b.iter(|| BinaryFuse8::try_from(keys).unwrap());
    });

    let mut builder = BinaryFuseBuilder::new();
    let mut scratch = keys.clone();
    group.bench_function(BenchmarkId::new("build_with", SAMPLE_SIZE), |b| {
        b.iter(|| {
            scratch.copy_from_slice(&keys);
            BinaryFuse8::build_with(&mut builder, &mut scratch).unwrap()
        });
    });
}

fn contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("BinaryFuse8");

    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
    let filter = BinaryFuse8::try_from(&keys).unwrap();

    group.bench_function(BenchmarkId::new("contains", SAMPLE_SIZE), |b| {
        let key = rng.gen();
        b.iter(|| filter.contains(&key));
    });
}

criterion_group!(bfuse8, serialization, from, contains);
criterion_main!(bfuse8);
