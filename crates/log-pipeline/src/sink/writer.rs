//! 라이터 워커 -- 엔트리 큐를 소비해 배치 단위로 싱크에 기록합니다.
//!
//! # 플러시 조건
//! - 버퍼가 `batch_size`에 도달
//! - 첫 항목이 버퍼에 들어온 뒤 `flush_interval` 경과
//! - 엔트리 큐가 닫힘 (남은 항목을 기록하고 종료)
//!
//! 전송 실패 시 배치를 버리고 버린 엔트리 수만큼 에러 카운터를 올립니다.
//! 연결 생성에 실패하면 다음 플러시에서 다시 시도합니다.

use std::sync::Arc;
use std::time::Duration;

use logflux_core::metrics as m;
use logflux_core::types::LogEntry;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use super::{Point, PointBatch, Sink, SinkConnector};
use crate::buffer::BatchBuffer;
use crate::counter::CounterHandle;
use crate::queue::SharedReceiver;

/// 라이터 워커 설정
#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// 측정 이름
    pub measurement: String,
    /// 배치 크기
    pub batch_size: usize,
    /// 미완성 배치 플러시 간격
    pub flush_interval: Duration,
}

enum WriterEvent {
    Entry(Option<LogEntry>),
    FlushDue,
}

/// 싱크 라이터 워커
pub struct SinkWriter<C: SinkConnector> {
    id: usize,
    connector: Arc<C>,
    sink: Option<C::Sink>,
    rx: SharedReceiver<LogEntry>,
    counters: CounterHandle,
    measurement: String,
    buffer: BatchBuffer<Point>,
    flush_interval: Duration,
}

impl<C: SinkConnector> SinkWriter<C> {
    /// 새 라이터 워커를 생성합니다.
    pub fn new(
        id: usize,
        connector: Arc<C>,
        rx: SharedReceiver<LogEntry>,
        counters: CounterHandle,
        settings: WriterSettings,
    ) -> Self {
        Self {
            id,
            connector,
            sink: None,
            rx,
            counters,
            measurement: settings.measurement,
            buffer: BatchBuffer::new(settings.batch_size),
            flush_interval: settings.flush_interval,
        }
    }

    /// 워커 루프를 실행합니다.
    ///
    /// 엔트리 큐가 닫히고 비워지면 남은 배치를 기록한 뒤 종료합니다.
    pub async fn run(mut self) {
        debug!(worker = self.id, "sink writer started");
        self.ensure_connected();

        let rx = self.rx.clone();
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                entry = rx.recv() => WriterEvent::Entry(entry),
                _ = ticker.tick(), if !self.buffer.is_empty() => WriterEvent::FlushDue,
            };

            match event {
                WriterEvent::Entry(Some(entry)) => {
                    let full = self
                        .buffer
                        .push(Point::from_entry(&self.measurement, &entry));
                    if full {
                        self.flush().await;
                    } else if self.buffer.len() == 1 {
                        ticker.reset();
                    }
                }
                WriterEvent::Entry(None) => {
                    self.flush().await;
                    break;
                }
                WriterEvent::FlushDue => self.flush().await,
            }
        }

        debug!(
            worker = self.id,
            received = self.buffer.total_received(),
            flushes = self.buffer.flush_count(),
            "entry queue drained, sink writer exiting"
        );
    }

    /// 연결이 없으면 새로 생성합니다. 연결이 준비되면 `true`.
    fn ensure_connected(&mut self) -> bool {
        if self.sink.is_some() {
            return true;
        }
        match self.connector.connect() {
            Ok(sink) => {
                self.sink = Some(sink);
                true
            }
            Err(e) => {
                warn!(worker = self.id, error = %e, "sink connect failed, will retry on next flush");
                false
            }
        }
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = PointBatch::new(self.buffer.take());

        if !self.ensure_connected() {
            self.counters.errors("sink", batch.len());
            return;
        }
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        match sink.write(&batch).await {
            Ok(()) => {
                metrics::counter!(m::LOG_PIPELINE_POINTS_WRITTEN_TOTAL)
                    .increment(u64::try_from(batch.len()).unwrap_or(u64::MAX));
                debug!(worker = self.id, points = batch.len(), "batch written");
            }
            Err(e) => {
                warn!(
                    worker = self.id,
                    points = batch.len(),
                    error = %e,
                    "sink write failed, dropping batch"
                );
                self.counters.errors("sink", batch.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{CounterAggregator, Counters};
    use crate::error::LogPipelineError;
    use chrono::{FixedOffset, TimeZone};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, watch};

    #[derive(Clone, Default)]
    struct MemorySink {
        batches: Arc<Mutex<Vec<PointBatch>>>,
        fail_writes: bool,
    }

    impl Sink for MemorySink {
        async fn write(&self, batch: &PointBatch) -> Result<(), LogPipelineError> {
            if self.fail_writes {
                return Err(LogPipelineError::SinkWrite("unavailable".to_owned()));
            }
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    struct MemoryConnector {
        sink: MemorySink,
        connects: AtomicUsize,
        failing_connects: usize,
    }

    impl MemoryConnector {
        fn new(sink: MemorySink) -> Self {
            Self {
                sink,
                connects: AtomicUsize::new(0),
                failing_connects: 0,
            }
        }
    }

    impl SinkConnector for MemoryConnector {
        type Sink = MemorySink;

        fn connect(&self) -> Result<MemorySink, LogPipelineError> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failing_connects {
                return Err(LogPipelineError::SinkConnect("refused".to_owned()));
            }
            Ok(self.sink.clone())
        }
    }

    fn entry(path: &str) -> LogEntry {
        LogEntry {
            time_local: FixedOffset::east_opt(8 * 3600)
                .unwrap()
                .with_ymd_and_hms(2023, 11, 10, 13, 20, 0)
                .unwrap(),
            bytes_sent: 1,
            path: path.to_owned(),
            method: "GET".to_owned(),
            scheme: "http".to_owned(),
            status: "200".to_owned(),
            upstream_time: 0.0,
            request_time: 0.0,
        }
    }

    struct Harness {
        tx: mpsc::Sender<LogEntry>,
        counters: watch::Receiver<Counters>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_writer(connector: MemoryConnector, batch_size: usize, flush: Duration) -> Harness {
        let (tx, rx) = mpsc::channel(64);
        let (aggregator, handle) = CounterAggregator::new();
        let counters = aggregator.subscribe();
        tokio::spawn(aggregator.run());
        let writer = SinkWriter::new(
            0,
            Arc::new(connector),
            SharedReceiver::new(rx),
            handle,
            WriterSettings {
                measurement: "nginx_log".to_owned(),
                batch_size,
                flush_interval: flush,
            },
        );
        Harness {
            tx,
            counters,
            task: tokio::spawn(writer.run()),
        }
    }

    #[tokio::test]
    async fn batch_size_one_writes_each_entry() {
        let sink = MemorySink::default();
        let h = spawn_writer(MemoryConnector::new(sink.clone()), 1, Duration::from_secs(60));

        h.tx.send(entry("/a")).await.unwrap();
        h.tx.send(entry("/b")).await.unwrap();
        drop(h.tx);
        h.task.await.unwrap();

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 1));
        assert_eq!(batches[0].points()[0].tags["Path"], "/a");
    }

    #[tokio::test]
    async fn full_batch_is_written_together() {
        let sink = MemorySink::default();
        let h = spawn_writer(MemoryConnector::new(sink.clone()), 3, Duration::from_secs(60));

        for p in ["/a", "/b", "/c", "/d"] {
            h.tx.send(entry(p)).await.unwrap();
        }
        drop(h.tx);
        h.task.await.unwrap();

        let sizes: Vec<usize> = sink.batches.lock().unwrap().iter().map(PointBatch::len).collect();
        assert_eq!(sizes, vec![3, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_flushed_after_interval() {
        let sink = MemorySink::default();
        let h = spawn_writer(MemoryConnector::new(sink.clone()), 100, Duration::from_millis(200));

        h.tx.send(entry("/a")).await.unwrap();
        h.tx.send(entry("/b")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.batches.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let batches = sink.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        drop(h.tx);
    }

    #[tokio::test]
    async fn failed_write_counts_every_dropped_entry() {
        let sink = MemorySink {
            fail_writes: true,
            ..MemorySink::default()
        };
        let mut h = spawn_writer(MemoryConnector::new(sink), 2, Duration::from_secs(60));

        for p in ["/a", "/b", "/c"] {
            h.tx.send(entry(p)).await.unwrap();
        }
        drop(h.tx);
        h.task.await.unwrap();

        let counters = tokio::time::timeout(Duration::from_secs(1), h.counters.wait_for(|c| c.err_num == 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counters.err_num, 3);
    }

    #[tokio::test]
    async fn connect_is_retried_on_next_flush() {
        let sink = MemorySink::default();
        let mut connector = MemoryConnector::new(sink.clone());
        // 시작 시 1회 + 첫 플러시 1회 실패
        connector.failing_connects = 2;
        let mut h = spawn_writer(connector, 1, Duration::from_secs(60));

        h.tx.send(entry("/lost")).await.unwrap();
        h.tx.send(entry("/kept")).await.unwrap();
        drop(h.tx);
        h.task.await.unwrap();

        let batches = sink.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].points()[0].tags["Path"], "/kept");

        let counters = tokio::time::timeout(Duration::from_secs(1), h.counters.wait_for(|c| c.err_num == 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counters.err_num, 1);
    }
}
