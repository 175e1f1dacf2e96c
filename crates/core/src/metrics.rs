//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logflux_`
//! - 모듈명: `log_pipeline_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 큐 레이블 키 (raw, entry)
pub const LABEL_QUEUE: &str = "queue";

/// 에러 단계 레이블 키 (parse, timestamp, sink)
pub const LABEL_STAGE: &str = "stage";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// Log Pipeline: 읽어들인 전체 라인 수 (counter)
pub const LOG_PIPELINE_LINES_HANDLED_TOTAL: &str = "logflux_log_pipeline_lines_handled_total";

/// Log Pipeline: 처리 에러 수 (counter)
pub const LOG_PIPELINE_ERRORS_TOTAL: &str = "logflux_log_pipeline_errors_total";

/// Log Pipeline: 싱크에 기록된 포인트 수 (counter)
pub const LOG_PIPELINE_POINTS_WRITTEN_TOTAL: &str = "logflux_log_pipeline_points_written_total";

/// Log Pipeline: 큐 내 대기 항목 수 (gauge, label: queue)
pub const LOG_PIPELINE_QUEUE_DEPTH: &str = "logflux_log_pipeline_queue_depth";

/// Log Pipeline: 윈도우 처리량 (gauge, lines/sec)
pub const LOG_PIPELINE_THROUGHPUT: &str = "logflux_log_pipeline_throughput_lines_per_second";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logflux_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "logflux_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        LOG_PIPELINE_LINES_HANDLED_TOTAL,
        "Total number of lines read from the tailed file"
    );
    describe_counter!(
        LOG_PIPELINE_ERRORS_TOTAL,
        "Total number of records that failed parsing or sink dispatch"
    );
    describe_counter!(
        LOG_PIPELINE_POINTS_WRITTEN_TOTAL,
        "Total number of points successfully written to the sink"
    );
    describe_gauge!(
        LOG_PIPELINE_QUEUE_DEPTH,
        "Number of items waiting in a pipeline queue"
    );
    describe_gauge!(
        LOG_PIPELINE_THROUGHPUT,
        "Windowed line throughput in lines per second"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        for name in [
            LOG_PIPELINE_LINES_HANDLED_TOTAL,
            LOG_PIPELINE_ERRORS_TOTAL,
            LOG_PIPELINE_POINTS_WRITTEN_TOTAL,
            LOG_PIPELINE_QUEUE_DEPTH,
            LOG_PIPELINE_THROUGHPUT,
            DAEMON_UPTIME_SECONDS,
            DAEMON_BUILD_INFO,
        ] {
            assert!(name.starts_with("logflux_"), "{name}");
        }
    }

    #[test]
    fn counters_end_with_total() {
        assert!(LOG_PIPELINE_LINES_HANDLED_TOTAL.ends_with("_total"));
        assert!(LOG_PIPELINE_ERRORS_TOTAL.ends_with("_total"));
        assert!(LOG_PIPELINE_POINTS_WRITTEN_TOTAL.ends_with("_total"));
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
