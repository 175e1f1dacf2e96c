//! 모니터 -- 파이프라인 상태 스냅샷과 처리량 샘플링
//!
//! [`Monitor`]는 카운터 집계 결과, 두 큐의 깊이, 가동 시간을 모아
//! [`SystemSnapshot`]을 만듭니다. 처리량(tps)은 주기적으로 기록한
//! 누적 라인 수 샘플 두 개의 차이를 샘플 간격으로 나눈 값입니다.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use logflux_core::metrics as m;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::counter::Counters;
use crate::queue::QueueProbe;

/// 처리량 계산용 슬라이딩 윈도우 (샘플 2개)
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    samples: VecDeque<u64>,
    interval: Duration,
}

impl ThroughputWindow {
    /// 윈도우가 보관하는 최대 샘플 수
    pub const CAPACITY: usize = 2;

    /// 샘플 간격으로 윈도우를 생성합니다.
    pub fn new(interval: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(Self::CAPACITY),
            interval,
        }
    }

    /// 누적 라인 수 샘플을 추가합니다. 가장 오래된 샘플은 밀려납니다.
    pub fn record(&mut self, handled_lines: u64) {
        if self.samples.len() == Self::CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(handled_lines);
    }

    /// 초당 처리 라인 수
    ///
    /// 샘플이 2개 미만이면 0입니다.
    pub fn tps(&self) -> f64 {
        let secs = self.interval.as_secs_f64();
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) if self.samples.len() >= Self::CAPACITY && secs > 0.0 => {
                newest.saturating_sub(*oldest) as f64 / secs
            }
            _ => 0.0,
        }
    }

    /// 현재 샘플 목록 (오래된 것부터)
    pub fn samples(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }
}

/// 모니터 엔드포인트가 반환하는 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    /// 누적 처리 라인 수
    pub handle_line: u64,
    /// 초당 처리 라인 수
    pub tps: f64,
    /// 리더 -> 파서 큐 대기 수
    pub read_chan_len: usize,
    /// 파서 -> 라이터 큐 대기 수
    pub write_chan_len: usize,
    /// 가동 시간 (예: `1h2m3.5s`)
    pub run_time: String,
    /// 누적 에러 수
    pub err_num: u64,
}

/// 파이프라인 모니터
///
/// 여러 HTTP 요청이 동시에 [`snapshot`](Self::snapshot)을 호출해도 안전합니다.
pub struct Monitor {
    started_at: OnceLock<Instant>,
    counters: watch::Receiver<Counters>,
    raw_queue: QueueProbe,
    entry_queue: QueueProbe,
    window: Mutex<ThroughputWindow>,
    sample_interval: Duration,
}

impl Monitor {
    /// 새 모니터를 생성합니다.
    ///
    /// 가동 시간은 [`mark_started`](Self::mark_started) 호출 시점부터 측정됩니다.
    pub fn new(
        counters: watch::Receiver<Counters>,
        raw_queue: QueueProbe,
        entry_queue: QueueProbe,
        sample_interval: Duration,
    ) -> Self {
        Self {
            started_at: OnceLock::new(),
            counters,
            raw_queue,
            entry_queue,
            window: Mutex::new(ThroughputWindow::new(sample_interval)),
            sample_interval,
        }
    }

    /// 가동 시작 시각을 기록합니다. 두 번째 호출부터는 무시됩니다.
    pub fn mark_started(&self) {
        let _ = self.started_at.set(Instant::now());
    }

    /// 현재 누적 카운터
    pub fn counters(&self) -> Counters {
        *self.counters.borrow()
    }

    /// 카운터 구독자를 복제합니다.
    pub fn subscribe(&self) -> watch::Receiver<Counters> {
        self.counters.clone()
    }

    /// 현재 누적 라인 수를 처리량 윈도우에 기록합니다.
    pub fn sample(&self) {
        let handled = self.counters().handled_lines;
        let tps = {
            let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
            window.record(handled);
            window.tps()
        };

        metrics::gauge!(m::LOG_PIPELINE_THROUGHPUT).set(tps);
        metrics::gauge!(m::LOG_PIPELINE_QUEUE_DEPTH, m::LABEL_QUEUE => "raw")
            .set(self.raw_queue.len() as f64);
        metrics::gauge!(m::LOG_PIPELINE_QUEUE_DEPTH, m::LABEL_QUEUE => "entry")
            .set(self.entry_queue.len() as f64);
    }

    /// 현재 상태 스냅샷을 생성합니다. 내부 상태를 바꾸지 않습니다.
    pub fn snapshot(&self) -> SystemSnapshot {
        let counters = self.counters();
        let tps = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tps();

        SystemSnapshot {
            handle_line: counters.handled_lines,
            tps,
            read_chan_len: self.raw_queue.len(),
            write_chan_len: self.entry_queue.len(),
            run_time: format_run_time(self.uptime()),
            err_num: counters.err_num,
        }
    }

    /// 가동 시간. 시작 전에는 0입니다.
    pub fn uptime(&self) -> Duration {
        self.started_at.get().map_or(Duration::ZERO, Instant::elapsed)
    }

    /// 샘플링 태스크를 시작합니다. 첫 샘플은 한 주기 뒤에 기록됩니다.
    pub fn spawn_sampler(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.sample_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("throughput sampler stopped");
                        break;
                    }
                    _ = ticker.tick() => self.sample(),
                }
            }
        })
    }
}

/// 경과 시간을 `1h2m3.5s`, `2m0s`, `850ms`, `12µs` 형식으로 표시합니다.
pub fn format_run_time(elapsed: Duration) -> String {
    if elapsed.is_zero() {
        return "0s".to_owned();
    }

    let total_secs = elapsed.as_secs();
    if total_secs == 0 {
        let micros = elapsed.subsec_micros();
        return if micros >= 1000 {
            format!("{}ms", with_fraction(u64::from(micros / 1000), micros % 1000))
        } else {
            format!("{micros}µs")
        };
    }

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = with_fraction(total_secs % 60, elapsed.subsec_millis());

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{seconds}s");
    out
}

/// 정수부와 천분의 일 단위 소수부를 이어 붙입니다. 반올림하지 않고 버립니다.
fn with_fraction(whole: u64, thousandths: u32) -> String {
    if thousandths == 0 {
        return whole.to_string();
    }
    let text = format!("{whole}.{thousandths:03}");
    text.trim_end_matches('0').to_owned()
}
