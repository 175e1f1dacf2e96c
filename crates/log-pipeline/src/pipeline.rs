//! 파이프라인 오케스트레이션 -- tail/파싱/싱크 전송의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](logflux_core::pipeline::Pipeline) trait을 구현하여
//! `logflux-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileTailer -> mpsc(raw) -> ParseWorker x N -> mpsc(entry) -> SinkWriter x M -> Sink
//!      |                          |                                |
//!      +------------- CounterHandle (LineHandled / ErrorOccurred) -+--> CounterAggregator -> Monitor
//! ```
//!
//! # 정지 순서
//! 리더를 취소하면 raw 큐가 닫히고, 파서가 남은 라인을 처리한 뒤 종료하면서
//! entry 큐가 닫히고, 라이터가 남은 배치를 기록한 뒤 종료합니다.
//! 전체 대기는 `shutdown_timeout`으로 제한되며 초과한 태스크는 abort됩니다.

use std::sync::Arc;

use logflux_core::error::{LogfluxError, PipelineError};
use logflux_core::pipeline::{HealthStatus, Pipeline};
use logflux_core::types::LogEntry;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collector::{FileTailer, FileTailerConfig, RawRecord};
use crate::config::PipelineConfig;
use crate::counter::{CounterAggregator, CounterHandle, Counters};
use crate::error::LogPipelineError;
use crate::monitor::Monitor;
use crate::parser::{AccessLogParser, ParseWorker};
use crate::queue::{QueueProbe, SharedReceiver};
use crate::sink::{InfluxConnector, SinkConnector, SinkWriter, WriterSettings};

/// 리더 태스크 종료 결과
pub type ReaderExit = oneshot::Receiver<Result<(), LogPipelineError>>;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 파이프라인 -- tail/파싱/싱크 전송의 전체 흐름을 관리합니다.
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use logflux_log_pipeline::{InfluxConnector, LogPipelineBuilder};
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config.clone())
///     .connector(Arc::new(InfluxConnector::from_config(&config)?))
///     .build()?;
///
/// pipeline.start().await?;
/// let snapshot = pipeline.monitor().snapshot();
/// ```
pub struct LogPipeline<C: SinkConnector = InfluxConnector> {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 파서 워커가 공유하는 파서
    parser: Arc<AccessLogParser>,
    /// 라이터 워커가 공유하는 싱크 팩토리
    connector: Arc<C>,
    /// 카운터 이벤트 송신 핸들
    counters: CounterHandle,
    /// 시작 시 스폰될 카운터 집계기
    aggregator: Option<CounterAggregator>,
    /// 상태 스냅샷 제공자
    monitor: Arc<Monitor>,
    /// raw 큐 깊이 (헬스 체크용)
    raw_probe: QueueProbe,
    /// raw 큐 송신측 (시작 시 리더에 전달)
    raw_tx: Option<mpsc::Sender<RawRecord>>,
    raw_rx: Option<mpsc::Receiver<RawRecord>>,
    entry_tx: Option<mpsc::Sender<LogEntry>>,
    entry_rx: Option<mpsc::Receiver<LogEntry>>,
    /// 리더/샘플러 취소 토큰
    cancel: CancellationToken,
    reader_task: Option<JoinHandle<()>>,
    reader_exit: Option<ReaderExit>,
    parser_tasks: Vec<JoinHandle<()>>,
    writer_tasks: Vec<JoinHandle<()>>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl<C: SinkConnector> LogPipeline<C> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정을 반환합니다.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 모니터를 반환합니다 (HTTP 엔드포인트에서 공유).
    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(&self.monitor)
    }

    /// 현재 누적 카운터를 반환합니다.
    pub fn counters(&self) -> Counters {
        self.monitor.counters()
    }

    /// 카운터 변경 구독자를 반환합니다.
    pub fn subscribe_counters(&self) -> watch::Receiver<Counters> {
        self.monitor.subscribe()
    }

    /// 리더 종료 알림을 가져갑니다.
    ///
    /// 리더가 I/O 에러로 중단되면 `Err`가 전달되며, daemon은 이를 받아 종료를 시작합니다.
    /// 시작 전이거나 이미 가져갔다면 `None`.
    pub fn take_reader_exit(&mut self) -> Option<ReaderExit> {
        self.reader_exit.take()
    }

    fn spawn_workers(
        &mut self,
        raw_rx: mpsc::Receiver<RawRecord>,
        entry_tx: mpsc::Sender<LogEntry>,
        entry_rx: mpsc::Receiver<LogEntry>,
    ) {
        let raw_shared = SharedReceiver::new(raw_rx);
        for id in 0..self.config.parser_workers {
            let worker = ParseWorker::new(
                id,
                Arc::clone(&self.parser),
                raw_shared.clone(),
                entry_tx.clone(),
                self.counters.clone(),
            );
            self.parser_tasks.push(tokio::spawn(worker.run()));
        }
        // 파서만 entry 송신측을 가지도록 원본은 여기서 drop
        drop(entry_tx);

        let entry_shared = SharedReceiver::new(entry_rx);
        let settings = WriterSettings {
            measurement: self.config.measurement.clone(),
            batch_size: self.config.batch_size,
            flush_interval: self.config.flush_interval,
        };
        for id in 0..self.config.writer_workers {
            let writer = SinkWriter::new(
                id,
                Arc::clone(&self.connector),
                entry_shared.clone(),
                self.counters.clone(),
                settings.clone(),
            );
            self.writer_tasks.push(tokio::spawn(writer.run()));
        }
    }
}

impl<C: SinkConnector> Pipeline for LogPipeline<C> {
    async fn start(&mut self) -> Result<(), LogfluxError> {
        match self.state {
            PipelineState::Running => return Err(PipelineError::AlreadyRunning.into()),
            PipelineState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "pipeline cannot be restarted; build a new instance".to_owned(),
                )
                .into());
            }
            PipelineState::Initialized => {}
        }

        info!(path = %self.config.path.display(), "starting log pipeline");

        let raw_tx = self.raw_tx.clone().ok_or_else(|| {
            PipelineError::InitFailed("raw record queue not available".to_owned())
        })?;

        // 1. 파일 열기 (실패 시 채널은 그대로 두어 재시도 가능)
        let mut tailer = FileTailer::open(
            FileTailerConfig {
                path: self.config.path.clone(),
                poll_interval: self.config.poll_interval,
            },
            raw_tx,
            self.counters.clone(),
            self.cancel.child_token(),
        )
        .await?;

        let (Some(raw_rx), Some(entry_tx), Some(entry_rx), Some(aggregator)) = (
            self.raw_rx.take(),
            self.entry_tx.take(),
            self.entry_rx.take(),
            self.aggregator.take(),
        ) else {
            return Err(PipelineError::InitFailed("pipeline queues already consumed".to_owned()).into());
        };
        // 리더만 raw 송신측을 가지도록 보관분 제거
        self.raw_tx = None;

        // 2. 카운터 집계기 (모든 핸들이 drop될 때 스스로 종료)
        tokio::spawn(aggregator.run());

        // 3. 소비자 먼저 스폰
        self.spawn_workers(raw_rx, entry_tx, entry_rx);

        // 4. 처리량 샘플러
        self.background_tasks
            .push(Arc::clone(&self.monitor).spawn_sampler(self.cancel.child_token()));

        // 5. 리더
        let (exit_tx, exit_rx) = oneshot::channel();
        self.reader_task = Some(tokio::spawn(async move {
            let result = tailer.run().await;
            let _ = exit_tx.send(result);
        }));
        self.reader_exit = Some(exit_rx);

        self.monitor.mark_started();
        self.state = PipelineState::Running;
        info!(
            parsers = self.config.parser_workers,
            writers = self.config.writer_workers,
            batch_size = self.config.batch_size,
            "log pipeline started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogfluxError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log pipeline");
        let deadline = Instant::now() + self.config.shutdown_timeout;

        // 1. 리더 취소 -> raw 큐 닫힘
        self.cancel.cancel();
        join_until(self.reader_task.take().into_iter().collect(), deadline, "reader").await;

        // 2. 파서 드레인 -> entry 큐 닫힘
        join_until(std::mem::take(&mut self.parser_tasks), deadline, "parser").await;

        // 3. 라이터 드레인 및 마지막 플러시
        join_until(std::mem::take(&mut self.writer_tasks), deadline, "writer").await;

        join_until(std::mem::take(&mut self.background_tasks), deadline, "sampler").await;

        self.state = PipelineState::Stopped;
        let counters = self.counters();
        info!(
            handled_lines = counters.handled_lines,
            err_num = counters.err_num,
            "log pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.reader_task.as_ref().is_none_or(JoinHandle::is_finished) {
                    return HealthStatus::Unhealthy("file reader stopped".to_owned());
                }
                let utilization = self.raw_probe.utilization();
                if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "raw queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 태스크들이 기한 안에 끝나기를 기다리고, 초과하면 abort합니다.
async fn join_until(tasks: Vec<JoinHandle<()>>, deadline: Instant, stage: &str) {
    for mut task in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(stage, error = %e, "pipeline task ended abnormally"),
            Err(_) => {
                warn!(stage, "shutdown timeout reached, aborting task");
                task.abort();
            }
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파서, 큐, 카운터 집계기, 모니터를 구성합니다.
pub struct LogPipelineBuilder<C: SinkConnector = InfluxConnector> {
    config: PipelineConfig,
    connector: Option<Arc<C>>,
}

impl<C: SinkConnector> LogPipelineBuilder<C> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            connector: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 싱크 연결 팩토리를 설정합니다.
    pub fn connector(mut self, connector: Arc<C>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline<C>, LogPipelineError> {
        self.config.validate()?;

        let connector = self
            .connector
            .ok_or_else(|| LogPipelineError::config("connector", "sink connector must be provided"))?;

        let parser = Arc::new(AccessLogParser::new(
            self.config.timezone,
            self.config.parse_mode,
        )?);

        let (raw_tx, raw_rx) = mpsc::channel(self.config.raw_queue_capacity);
        let (entry_tx, entry_rx) = mpsc::channel(self.config.entry_queue_capacity);
        let raw_probe = QueueProbe::for_sender(&raw_tx);
        let entry_probe = QueueProbe::for_sender(&entry_tx);

        let (aggregator, counters) = CounterAggregator::new();
        let monitor = Arc::new(Monitor::new(
            aggregator.subscribe(),
            raw_probe.clone(),
            entry_probe,
            self.config.sample_interval,
        ));

        Ok(LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            parser,
            connector,
            counters,
            aggregator: Some(aggregator),
            monitor,
            raw_probe,
            raw_tx: Some(raw_tx),
            raw_rx: Some(raw_rx),
            entry_tx: Some(entry_tx),
            entry_rx: Some(entry_rx),
            cancel: CancellationToken::new(),
            reader_task: None,
            reader_exit: None,
            parser_tasks: Vec::new(),
            writer_tasks: Vec::new(),
            background_tasks: Vec::new(),
        })
    }
}

impl<C: SinkConnector> Default for LogPipelineBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
