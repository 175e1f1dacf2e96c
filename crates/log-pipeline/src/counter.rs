//! 처리 카운터 -- 단일 집계 태스크가 소유하는 누적 카운터
//!
//! 파이프라인 각 단계는 [`CounterHandle`]로 [`CounterEvent`]를 보내기만 하고,
//! 실제 합산은 [`CounterAggregator`] 태스크 하나가 수행합니다.
//! 집계 결과는 `watch` 채널로 공개되어 모니터가 잠금 없이 읽습니다.
//!
//! 이벤트 채널은 무제한 용량이므로 카운터 보고가 파이프라인을 막지 않습니다.

use logflux_core::metrics as m;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// 카운터 증가 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEvent {
    /// 리더가 한 줄을 읽음
    LineHandled,
    /// 에러 발생 (단계 이름: parse, sink 등)
    ErrorOccurred(&'static str),
}

/// 누적 카운터 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// 읽어들인 전체 라인 수
    pub handled_lines: u64,
    /// 누적 에러 수
    pub err_num: u64,
}

/// 카운터 이벤트 송신 핸들
///
/// 복제 비용이 낮으므로 각 워커가 하나씩 보유합니다.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    tx: mpsc::UnboundedSender<CounterEvent>,
}

impl CounterHandle {
    /// 한 줄 읽음을 보고합니다.
    pub fn line_handled(&self) {
        self.emit(CounterEvent::LineHandled);
    }

    /// 에러 한 건을 보고합니다.
    pub fn error(&self, stage: &'static str) {
        self.emit(CounterEvent::ErrorOccurred(stage));
    }

    /// 에러 여러 건을 보고합니다 (배치 전송 실패 등).
    pub fn errors(&self, stage: &'static str, count: usize) {
        for _ in 0..count {
            self.emit(CounterEvent::ErrorOccurred(stage));
        }
    }

    fn emit(&self, event: CounterEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "counter aggregator gone, event dropped");
        }
    }
}

/// 카운터 집계기
///
/// 모든 [`CounterHandle`]이 drop되면 [`run`](Self::run)이 종료됩니다.
pub struct CounterAggregator {
    rx: mpsc::UnboundedReceiver<CounterEvent>,
    counters: Counters,
    publish: watch::Sender<Counters>,
}

impl CounterAggregator {
    /// 집계기와 송신 핸들을 생성합니다.
    pub fn new() -> (Self, CounterHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (publish, _) = watch::channel(Counters::default());
        let aggregator = Self {
            rx,
            counters: Counters::default(),
            publish,
        };
        (aggregator, CounterHandle { tx })
    }

    /// 집계 결과 구독자를 생성합니다.
    pub fn subscribe(&self) -> watch::Receiver<Counters> {
        self.publish.subscribe()
    }

    /// 이벤트 수신 루프를 실행합니다.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.apply(event);
        }
        debug!(
            handled_lines = self.counters.handled_lines,
            err_num = self.counters.err_num,
            "counter aggregator finished"
        );
    }

    fn apply(&mut self, event: CounterEvent) {
        match event {
            CounterEvent::LineHandled => {
                self.counters.handled_lines += 1;
                metrics::counter!(m::LOG_PIPELINE_LINES_HANDLED_TOTAL).increment(1);
            }
            CounterEvent::ErrorOccurred(stage) => {
                self.counters.err_num += 1;
                metrics::counter!(m::LOG_PIPELINE_ERRORS_TOTAL, m::LABEL_STAGE => stage)
                    .increment(1);
            }
        }
        self.publish.send_replace(self.counters);
    }
}
