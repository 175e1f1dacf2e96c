//! 로그 파싱 모듈 -- 액세스 로그 파서와 파서 워커
//!
//! [`AccessLogParser`]는 core의 [`LogParser`](logflux_core::pipeline::LogParser) trait을 구현합니다.
//! [`ParseWorker`]는 원시 라인 큐를 소비하여 엔트리 큐로 전달하는 단계입니다.
//!
//! # 사용 예시
//! ```ignore
//! use logflux_log_pipeline::config::{ParseMode, TimestampZone};
//! use logflux_log_pipeline::parser::AccessLogParser;
//!
//! let parser = AccessLogParser::new(TimestampZone::default(), ParseMode::Lenient)?;
//! let parsed = parser.parse_line(line.as_bytes())?;
//! ```

pub mod access;

pub use access::{AccessLogParser, ParsedLine};

use std::sync::Arc;

use logflux_core::types::LogEntry;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::collector::RawRecord;
use crate::counter::CounterHandle;
use crate::queue::SharedReceiver;

/// 파서 워커
///
/// 원시 라인 큐가 닫히고 비워지면 종료합니다.
/// 실패한 라인은 에러 카운터를 올리고 버립니다.
pub struct ParseWorker {
    id: usize,
    parser: Arc<AccessLogParser>,
    rx: SharedReceiver<RawRecord>,
    tx: mpsc::Sender<LogEntry>,
    counters: CounterHandle,
}

impl ParseWorker {
    /// 새 파서 워커를 생성합니다.
    pub fn new(
        id: usize,
        parser: Arc<AccessLogParser>,
        rx: SharedReceiver<RawRecord>,
        tx: mpsc::Sender<LogEntry>,
        counters: CounterHandle,
    ) -> Self {
        Self {
            id,
            parser,
            rx,
            tx,
            counters,
        }
    }

    /// 워커 루프를 실행합니다.
    pub async fn run(self) {
        debug!(worker = self.id, "parser worker started");

        while let Some(record) = self.rx.recv().await {
            trace!(
                worker = self.id,
                queued_us = record.age().as_micros() as u64,
                "raw record dequeued"
            );
            let parsed = match self.parser.parse_line(&record.data) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.counters.error(e.stage());
                    warn!(
                        worker = self.id,
                        error = %e,
                        line = %record.text_lossy(),
                        "dropping unparsable line"
                    );
                    continue;
                }
            };

            if let Some(e) = &parsed.recovered {
                self.counters.error(e.stage());
                debug!(worker = self.id, error = %e, "timestamp replaced with epoch");
            }

            if self.tx.send(parsed.entry).await.is_err() {
                warn!(worker = self.id, "entry queue closed, parser worker exiting");
                return;
            }
        }

        debug!(worker = self.id, "raw record queue drained, parser worker exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParseMode, TimestampZone};
    use crate::counter::CounterAggregator;
    use std::time::Duration;

    const LINE: &str = r#"1.2.3.4 - - [10/Nov/2023:13:20:00 +0000] https "GET /foo/bar?x=1 HTTP/1.1" 200 512 "-" "-" "-" 0.002 0.010"#;

    #[tokio::test]
    async fn worker_forwards_entries_and_counts_failures() {
        let parser =
            Arc::new(AccessLogParser::new(TimestampZone::default(), ParseMode::Lenient).unwrap());
        let (raw_tx, raw_rx) = mpsc::channel(8);
        let (entry_tx, mut entry_rx) = mpsc::channel(8);
        let (aggregator, counters) = CounterAggregator::new();
        let mut watch = aggregator.subscribe();
        tokio::spawn(aggregator.run());

        let worker = ParseWorker::new(0, parser, SharedReceiver::new(raw_rx), entry_tx, counters);
        let task = tokio::spawn(worker.run());

        raw_tx.send(RawRecord::new(LINE.as_bytes().to_vec())).await.unwrap();
        raw_tx.send(RawRecord::new(&b"not an access log"[..])).await.unwrap();
        raw_tx
            .send(RawRecord::new(LINE.replace("10/Nov/2023", "10/Foo/2023").into_bytes()))
            .await
            .unwrap();
        drop(raw_tx);

        let first = entry_rx.recv().await.unwrap();
        assert_eq!(first.path, "/foo/bar");
        let recovered = entry_rx.recv().await.unwrap();
        assert_eq!(recovered.time_local.timestamp(), 0);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(entry_rx.recv().await.is_none());

        let counters = tokio::time::timeout(Duration::from_secs(1), watch.wait_for(|c| c.err_num == 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counters.handled_lines, 0);
    }
}
