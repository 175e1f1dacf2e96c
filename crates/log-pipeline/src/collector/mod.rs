//! 로그 수집 모듈 -- 성장하는 파일에서 원시 라인을 읽어옵니다.
//!
//! # 수집 소스
//! - [`FileTailer`]: 파일 끝에서부터 새로 추가되는 라인을 폴링 방식으로 수집
//!
//! # 아키텍처
//! 수집기는 자체 tokio 태스크에서 실행되며, 읽은 라인을
//! `tokio::mpsc::Sender<RawRecord>` 채널을 통해 파서 워커로 전달합니다.
//! 큐가 가득 차면 전송이 대기하므로 리더가 자연스럽게 느려집니다.

pub mod file;

pub use file::{FileTailer, FileTailerConfig};

use std::time::{Duration, Instant};

use bytes::Bytes;

/// 수집된 원시 라인
///
/// 줄바꿈 문자가 제거된 한 줄의 바이트와 수신 시각입니다.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 라인 바이트 (`\n`, `\r\n` 제외)
    pub data: Bytes,
    /// 리더가 라인을 완성한 시각
    pub received_at: Instant,
}

impl RawRecord {
    /// 현재 시각으로 새 RawRecord를 생성합니다.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            received_at: Instant::now(),
        }
    }

    /// 수신 이후 경과 시간 (큐 대기 시간 확인용)
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// 손실 허용 UTF-8 텍스트로 변환합니다 (로그 출력용).
    pub fn text_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_from_static() {
        let record = RawRecord::new(&b"GET /"[..]);
        assert_eq!(record.data.as_ref(), b"GET /");
        assert_eq!(record.text_lossy(), "GET /");
        assert!(record.received_at <= Instant::now());
    }

    #[test]
    fn raw_record_lossy_text() {
        let record = RawRecord::new(vec![b'a', 0xff, b'b']);
        assert_eq!(record.text_lossy(), "a\u{fffd}b");
    }
}
