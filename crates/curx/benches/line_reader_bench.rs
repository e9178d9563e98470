//! 🏎️ Streaming decompressor benchmarks.
//!
//! How fast do CUR lines come out of a gzip body, and how much does the refill
//! chunk size matter? Spoiler: 1 KiB is not the fastest. It is the friendliest.

use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use curx::decompress::ReportLineReader;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::TryStreamExt;

const HEADER: &str = "identity/LineItemId,identity/TimeInterval,lineItem/UsageAccountId,lineItem/UsageAmount,lineItem/UnblendedRate,lineItem/UnblendedCost,product/ProductName";

/// 🧾 A fake but plausible CUR body with `rows` data rows.
fn cur_report(rows: usize) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    writeln!(encoder, "{}", HEADER).unwrap();
    for row in 0..rows {
        writeln!(
            encoder,
            "li-{row:08},2024-03-01T00:00:00Z/2024-03-01T01:00:00Z,111122223333,{}.5,0.0116,{:.6},\"Amazon Elastic Compute Cloud, Linux\"",
            row % 24,
            (row % 24) as f64 * 0.0116
        )
        .unwrap();
    }
    encoder.finish().unwrap()
}

fn line_reader_benchmarks(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("line_reader");

    let rows = 20_000;
    let report = cur_report(rows);
    group.throughput(Throughput::Elements(rows as u64));

    for chunk_size in [256usize, 1024, 16 * 1024, 256 * 1024] {
        group.bench_with_input(
            BenchmarkId::new("chunk_size", chunk_size),
            &report,
            |b, report| {
                b.to_async(&runtime).iter(|| async move {
                    let reader = ReportLineReader::with_chunk_size(report.as_slice(), chunk_size)
                        .await
                        .unwrap();
                    let lines: Vec<String> = reader.into_lines().try_collect().await.unwrap();
                    assert_eq!(lines.len(), rows);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, line_reader_benchmarks);
criterion_main!(benches);
