//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogfluxError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logflux_core::error::{ConfigError, LogfluxError, ParseError, PipelineError, SinkError};

/// 로그 파이프라인 도메인 에러
///
/// tail, 파싱, 싱크 전송, 채널 통신 등 파이프라인 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 라인이 액세스 로그 문법과 일치하지 않음
    #[error("line does not match access log grammar")]
    NoMatch,

    /// 특정 필드 변환 실패
    #[error("invalid field '{field}': {reason}")]
    Field {
        /// 필드명 (time_local, request, status 등)
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 파일 tail 실패 (열기/탐색/읽기)
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 대상 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 싱크 연결(클라이언트 생성) 실패
    #[error("sink connect error: {0}")]
    SinkConnect(String),

    /// 싱크 쓰기 실패
    #[error("sink write error: {0}")]
    SinkWrite(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 필드 에러를 생성합니다.
    pub fn field(field: &str, reason: impl Into<String>) -> Self {
        Self::Field {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// 설정 에러를 생성합니다.
    pub fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    /// 메트릭 레이블용 에러 단계 이름을 반환합니다.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoMatch | Self::Field { .. } => "parse",
            Self::Tail { .. } | Self::Io(_) => "tail",
            Self::SinkConnect(_) | Self::SinkWrite(_) => "sink",
            Self::Config { .. } | Self::Regex(_) => "config",
            Self::Channel(_) => "channel",
        }
    }
}

impl From<LogPipelineError> for LogfluxError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::NoMatch => LogfluxError::Parse(ParseError::NoMatch),
            LogPipelineError::Field { field, reason } => {
                LogfluxError::Parse(ParseError::InvalidField { field, reason })
            }
            LogPipelineError::Config { field, reason } => {
                LogfluxError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::SinkConnect(reason) => {
                LogfluxError::Sink(SinkError::Connection(reason))
            }
            LogPipelineError::SinkWrite(reason) => LogfluxError::Sink(SinkError::Write(reason)),
            LogPipelineError::Io(e) => LogfluxError::Io(e),
            err @ LogPipelineError::Tail { .. } => {
                LogfluxError::Pipeline(PipelineError::Fatal(err.to_string()))
            }
            LogPipelineError::Channel(reason) => {
                LogfluxError::Pipeline(PipelineError::ChannelSend(reason))
            }
            err @ LogPipelineError::Regex(_) => {
                LogfluxError::Pipeline(PipelineError::InitFailed(err.to_string()))
            }
        }
    }
}
