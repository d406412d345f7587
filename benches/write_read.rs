//! Write throughput and pyramid navigation benchmarks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jls::{Reader, SignalDef, SourceDef, SummaryEntry, Writer};
use rand::{Rng, SeedableRng};
use std::path::Path;
use tempfile::TempDir;

const SAMPLES: usize = 1_000_000;

fn make_data() -> Vec<f32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x6a6c73);
    (0..SAMPLES).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn write_file(path: &Path, data: &[f32]) {
    let mut wr = Writer::open(path).unwrap();
    wr.source_def(&SourceDef {
        source_id: 1,
        name: "bench",
        vendor: "",
        model: "",
        version: "",
        serial_number: "",
    })
    .unwrap();
    wr.signal_def(&SignalDef {
        signal_id: 1,
        source_id: 1,
        sample_rate: 1_000_000,
        samples_per_data: 100_000,
        sample_decimate_factor: 100,
        entries_per_summary: 20_000,
        summary_decimate_factor: 100,
        name: "bench_1",
        si_units: "A",
        ..Default::default()
    })
    .unwrap();
    wr.fsr_f32(1, 0, data).unwrap();
    wr.close().unwrap();
}

fn bench_write(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let data = make_data();
    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(SAMPLES as u64));
    group.sample_size(10);
    group.bench_function(BenchmarkId::new("fsr_f32", SAMPLES), |b| {
        b.iter(|| write_file(&dir.path().join("bench.jls"), &data));
    });
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("read.jls");
    let data = make_data();
    write_file(&path, &data);

    let mut group = c.benchmark_group("read");
    group.sample_size(20);

    group.bench_function("point_seek", |b| {
        let mut rd = Reader::open(&path).unwrap();
        let length = rd.fsr_length(1).unwrap();
        let mut out = [0.0f32; 1];
        let mut sample = 0i64;
        b.iter(|| {
            rd.fsr_f32(1, sample, &mut out).unwrap();
            sample = (sample + 19_683) % length;
        });
    });

    group.bench_function("statistics_increment_10k", |b| {
        let mut rd = Reader::open(&path).unwrap();
        let mut entries = vec![SummaryEntry::default(); 100];
        b.iter(|| {
            rd.fsr_f32_statistics(1, 0, 10_000, &mut entries).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
