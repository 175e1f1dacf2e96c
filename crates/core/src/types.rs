//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// 액세스 로그 엔트리
///
/// 파싱에 성공한 한 줄의 액세스 로그를 나타냅니다.
/// 모든 필드가 채워진 상태로만 생성되며, 부분 파싱된 엔트리는 존재하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 요청 시각 (설정된 타임존 기준)
    pub time_local: DateTime<FixedOffset>,
    /// 응답 바이트 수
    pub bytes_sent: u64,
    /// 요청 경로 (쿼리 스트링 제외)
    pub path: String,
    /// HTTP 메서드
    pub method: String,
    /// 요청 스킴 (http, https)
    pub scheme: String,
    /// 상태 코드 (원문 그대로, 예: "200")
    pub status: String,
    /// 업스트림 응답 시간 (초)
    pub upstream_time: f64,
    /// 전체 요청 처리 시간 (초)
    pub request_time: f64,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}://{} {} {}B {:.3}s",
            self.time_local.to_rfc3339(),
            self.method,
            self.scheme,
            self.path,
            self.status,
            self.bytes_sent,
            self.request_time,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> LogEntry {
        let zone = FixedOffset::east_opt(8 * 3600).unwrap();
        LogEntry {
            time_local: zone.with_ymd_and_hms(2023, 11, 10, 13, 20, 0).unwrap(),
            bytes_sent: 512,
            path: "/foo/bar".to_owned(),
            method: "GET".to_owned(),
            scheme: "https".to_owned(),
            status: "200".to_owned(),
            upstream_time: 0.002,
            request_time: 0.010,
        }
    }

    #[test]
    fn display_contains_key_fields() {
        let text = sample().to_string();
        assert!(text.contains("GET"));
        assert!(text.contains("/foo/bar"));
        assert!(text.contains("2023-11-10T13:20:00+08:00"));
    }

    #[test]
    fn serde_keeps_offset() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.time_local.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(back, sample());
    }
}
