//! 분류 벤치마크
//!
//! 기본 패턴 분류, 사용자 패턴 수에 따른 스케일링, 파이프라인 단건/청크 수집 처리량을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logsift_core::types::LogLevel;
use logsift_pipeline::{Classifier, IngestionPipeline, PatternFlags, PatternRegistry};

const ERROR_LINE: &str = "2024-01-15 12:00:00 ERROR: disk full on /dev/sda1";
const INFO_LINE: &str = "2024-01-15 12:00:00 request handled in 12ms";
const LONG_LINE: &str = "2024-01-15 12:00:00 [worker-7] processed batch 1842 of 20000 records for tenant acme-prod-eu-west with 0 retries and 3 skipped entries while compacting segment files under /var/lib/service/data";

fn bench_default_patterns(c: &mut Criterion) {
    let classifier = Classifier::new(Arc::new(PatternRegistry::with_defaults()));

    let mut group = c.benchmark_group("classify_default");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [("error", ERROR_LINE), ("no_match", INFO_LINE), ("long", LONG_LINE)] {
        group.bench_with_input(BenchmarkId::new("line", name), &line, |b, &line| {
            b.iter(|| classifier.classify(black_box(line)))
        });
    }

    group.finish();
}

fn bench_custom_pattern_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_custom_scaling");

    for count in [10usize, 100, 500] {
        let registry = Arc::new(PatternRegistry::with_defaults());
        for i in 0..count {
            registry
                .add_custom(
                    LogLevel::Warning,
                    &format!("custom-token-{i}\\b"),
                    2,
                    PatternFlags::default(),
                )
                .unwrap();
        }
        let classifier = Classifier::new(registry);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("patterns", count), &count, |b, _| {
            b.iter(|| classifier.classify(black_box(INFO_LINE)))
        });
    }

    group.finish();
}

fn bench_pipeline_ingest(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pipeline = IngestionPipeline::builder().build().unwrap();
    let lines: Vec<&str> = [ERROR_LINE, INFO_LINE, LONG_LINE]
        .iter()
        .copied()
        .cycle()
        .take(1000)
        .collect();

    let mut group = c.benchmark_group("pipeline_ingest");

    group.throughput(Throughput::Elements(1));
    group.bench_function("ingest_line", |b| {
        b.iter(|| {
            runtime
                .block_on(pipeline.ingest_line(black_box(INFO_LINE), "bench", None))
                .unwrap()
        })
    });

    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("ingest_batch_parallel_1000", |b| {
        b.iter(|| runtime.block_on(pipeline.ingest_batch_parallel(black_box(&lines), "bench", 100)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_default_patterns,
    bench_custom_pattern_scaling,
    bench_pipeline_ingest
);
criterion_main!(benches);
