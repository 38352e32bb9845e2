//! Criterion microbenches for tfrec encoding, framing and parsing.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - Example encoding (TfRecordsBuilder::build)
//! - Container framing (build_tfrecords)
//! - Container parsing with checksum validation (TfRecordsReader::new)
//! - Feature lookup (TfRecordsReader::get_feature)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use tfrec::{build_tfrecords, FeatureType, TfRecordsBuilder, TfRecordsReader};

// Include the test fixture at compile time (no file I/O during benchmark)
const FIXTURE: &[u8] = include_bytes!("../tests/fixtures/sample.tfrecord");

/// A detection-style record with a 64 KiB stand-in for the encoded image.
fn detection_builder() -> TfRecordsBuilder {
    let mut builder = TfRecordsBuilder::new();
    builder.add_int_feature("image/height", 480);
    builder.add_int_feature("image/width", 640);
    builder.add_string_feature("image/filename", "frame_000123.jpg");
    builder.add_binary_feature("image/encoded", &vec![0xA5; 64 * 1024]);
    builder.add_float_array_feature("image/object/bbox/xmin", vec![0.1; 20]);
    builder.add_float_array_feature("image/object/bbox/ymin", vec![0.2; 20]);
    builder.add_float_array_feature("image/object/bbox/xmax", vec![0.6; 20]);
    builder.add_float_array_feature("image/object/bbox/ymax", vec![0.7; 20]);
    builder.add_string_array_feature("image/object/class/text", &["person"; 20]);
    builder.add_int_array_feature("image/object/class/label", (0..20).collect());
    builder
}

/// Benchmark Example encoding.
fn bench_build(c: &mut Criterion) {
    let builder = detection_builder();
    let mut group = c.benchmark_group("build");
    group.throughput(Throughput::Bytes(builder.build().len() as u64));

    group.bench_function("detection_record", |b| {
        b.iter(|| black_box(black_box(&builder).build()))
    });

    group.finish();
}

/// Benchmark TFRecord framing of many records.
fn bench_frame(c: &mut Criterion) {
    let record = detection_builder().build();
    let records = vec![record; 32];
    let total: usize = records.iter().map(Vec::len).sum();

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Bytes(total as u64));

    group.bench_function("build_tfrecords_32", |b| {
        b.iter(|| black_box(build_tfrecords(black_box(&records))))
    });

    group.finish();
}

/// Benchmark container parsing, which checksums every byte.
fn bench_parse(c: &mut Criterion) {
    let container = build_tfrecords(&vec![detection_builder().build(); 32]);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(container.len() as u64));

    group.bench_function("reader_32", |b| {
        b.iter(|| black_box(TfRecordsReader::new(black_box(&container)).unwrap()))
    });
    group.bench_function("reader_fixture", |b| {
        b.iter(|| black_box(TfRecordsReader::new(black_box(FIXTURE)).unwrap()))
    });

    group.finish();
}

/// Benchmark decoding a record and projecting one feature.
fn bench_lookup(c: &mut Criterion) {
    let reader = TfRecordsReader::new(FIXTURE).expect("Failed to parse fixture");

    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_feature_string_list", |b| {
        b.iter(|| {
            let values = reader
                .get_feature(0, black_box("image/object/class/text"), FeatureType::String)
                .unwrap();
            black_box(values)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_frame, bench_parse, bench_lookup);
criterion_main!(benches);
