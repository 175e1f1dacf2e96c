//! 액세스 로그 파서 벤치마크
//!
//! lenient/strict 모드 및 퍼센트 인코딩 경로의 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logflux_log_pipeline::config::{ParseMode, TimestampZone};
use logflux_log_pipeline::parser::AccessLogParser;

/// 일반적인 라인
const ACCESS_SHORT: &[u8] = br#"1.2.3.4 - - [10/Nov/2023:13:20:00 +0000] https "GET /foo/bar?x=1 HTTP/1.1" 200 512 "-" "-" "-" 0.002 0.010"#;

/// 긴 user agent와 인코딩된 경로를 포함한 라인
const ACCESS_LONG: &[u8] = br#"203.0.113.45 - admin [31/Dec/2023:23:59:59 +0000] https "POST /api/v1/users/%E4%B8%AD%E6%96%87/create?token=eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9&page=2 HTTP/2.0" 201 48213 "https://example.com/dashboard/users" "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36" "10.0.0.1" 0.245 0.251"#;

/// 필드 복구가 필요한 라인
const ACCESS_RECOVER: &[u8] = br#"1.2.3.4 - - [10/Nov/2023:13:20:00 +0000] http "GET / HTTP/1.1" 499 0 "-" "curl/8.0" "-" - 0.000"#;

fn bench_access_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_log");

    for (name, mode) in [("lenient", ParseMode::Lenient), ("strict", ParseMode::Strict)] {
        let parser = AccessLogParser::new(TimestampZone::default(), mode).unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("short", name), &ACCESS_SHORT, |b, line| {
            b.iter(|| parser.parse_line(black_box(line)))
        });
        group.bench_with_input(BenchmarkId::new("long_encoded", name), &ACCESS_LONG, |b, line| {
            b.iter(|| parser.parse_line(black_box(line)))
        });
    }

    group.finish();
}

fn bench_recovery(c: &mut Criterion) {
    let parser = AccessLogParser::new(TimestampZone::default(), ParseMode::Lenient).unwrap();

    let mut group = c.benchmark_group("access_log_recovery");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                let _ = parser.parse_line(black_box(ACCESS_RECOVER));
            }
        })
    });
    group.finish();
}

fn bench_timezone(c: &mut Criterion) {
    let fixed = AccessLogParser::new(TimestampZone::default(), ParseMode::Strict).unwrap();
    let from_log = AccessLogParser::new(TimestampZone::FromLog, ParseMode::Strict).unwrap();

    let mut group = c.benchmark_group("access_log_timezone");
    group.bench_function("fixed", |b| b.iter(|| fixed.parse_line(black_box(ACCESS_SHORT))));
    group.bench_function("from_log", |b| {
        b.iter(|| from_log.parse_line(black_box(ACCESS_SHORT)))
    });
    group.finish();
}

criterion_group!(benches, bench_access_log, bench_recovery, bench_timezone);
criterion_main!(benches);
