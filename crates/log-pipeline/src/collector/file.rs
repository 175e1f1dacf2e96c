//! 파일 기반 로그 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 수집합니다.
//! `tail -f`와 유사한 동작을 비동기 폴링 방식으로 구현합니다.
//!
//! # 동작
//! - 시작 시 파일 끝으로 이동하므로 기존 내용은 읽지 않습니다.
//! - EOF에 도달하면 `poll_interval` 만큼 대기 후 다시 읽습니다.
//! - 줄바꿈 없이 끝난 조각은 다음 폴링까지 보관했다가 이어 붙입니다.
//! - 읽기 I/O 에러는 복구하지 않고 태스크를 에러로 종료합니다.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{CollectorStatus, RawRecord};
use crate::counter::CounterHandle;
use crate::error::LogPipelineError;

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct FileTailerConfig {
    /// 감시할 파일 경로
    pub path: PathBuf,
    /// EOF 도달 시 재시도 간격
    pub poll_interval: Duration,
}

impl Default for FileTailerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("access.log"),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// 파일 tail 수집기
///
/// [`open`](Self::open)에서 파일을 열고 끝으로 이동한 뒤,
/// [`run`](Self::run)에서 취소될 때까지 새 라인을 전송합니다.
pub struct FileTailer {
    config: FileTailerConfig,
    reader: BufReader<File>,
    tx: mpsc::Sender<RawRecord>,
    counters: CounterHandle,
    cancel: CancellationToken,
    status: CollectorStatus,
}

impl FileTailer {
    /// 파일을 열고 끝으로 이동합니다.
    ///
    /// 파일이 없거나 열 수 없으면 에러를 반환합니다.
    pub async fn open(
        config: FileTailerConfig,
        tx: mpsc::Sender<RawRecord>,
        counters: CounterHandle,
        cancel: CancellationToken,
    ) -> Result<Self, LogPipelineError> {
        let mut file = File::open(&config.path)
            .await
            .map_err(|e| tail_error(&config.path, format!("open failed: {e}")))?;
        let offset = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| tail_error(&config.path, format!("seek failed: {e}")))?;

        info!(path = %config.path.display(), offset, "tailing file from end");

        Ok(Self {
            config,
            reader: BufReader::new(file),
            tx,
            counters,
            cancel,
            status: CollectorStatus::Idle,
        })
    }

    /// 수집 루프를 실행합니다.
    ///
    /// 취소되면 `Ok(())`, 읽기 실패나 큐 닫힘이면 에러를 반환합니다.
    /// `tokio::spawn`으로 별도 태스크에서 호출하세요.
    pub async fn run(&mut self) -> Result<(), LogPipelineError> {
        self.status = CollectorStatus::Running;
        let result = self.read_loop().await;
        self.status = match &result {
            Ok(()) => CollectorStatus::Stopped,
            Err(e) => {
                error!(path = %self.config.path.display(), error = %e, "file tailer failed");
                CollectorStatus::Error(e.to_string())
            }
        };
        result
    }

    async fn read_loop(&mut self) -> Result<(), LogPipelineError> {
        let mut pending: Vec<u8> = Vec::with_capacity(1024);

        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("file tailer received shutdown signal");
                    return Ok(());
                }
                read = self.reader.read_until(b'\n', &mut pending) => read,
            };

            let n = read.map_err(|e| tail_error(&self.config.path, format!("read failed: {e}")))?;

            // EOF 이거나 줄바꿈 없이 끝난 조각: 다음 폴링까지 대기
            if n == 0 || pending.last() != Some(&b'\n') {
                if sleep_or_cancel(self.config.poll_interval, &self.cancel).await {
                    return Ok(());
                }
                continue;
            }

            let record = RawRecord::new(take_line(&mut pending));
            self.counters.line_handled();

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                sent = self.tx.send(record) => {
                    if sent.is_err() {
                        return Err(LogPipelineError::Channel("raw record queue closed".to_owned()));
                    }
                }
            }
        }
    }

    /// 감시 중인 파일 경로를 반환합니다.
    pub fn path(&self) -> &std::path::Path {
        &self.config.path
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }
}

/// 보관 중인 버퍼에서 완성된 한 줄을 꺼내고 줄바꿈을 제거합니다.
fn take_line(pending: &mut Vec<u8>) -> Bytes {
    let mut line = std::mem::take(pending);
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Bytes::from(line)
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

fn tail_error(path: &std::path::Path, reason: String) -> LogPipelineError {
    LogPipelineError::Tail {
        path: path.display().to_string(),
        reason,
    }
}
