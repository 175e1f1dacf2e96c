//! 에러 타입 -- 도메인별 에러 정의

/// logflux 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogfluxError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 싱크(시계열 저장소) 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 복구 불가능한 실행 중 장애 (읽기 I/O 실패 등)
    #[error("pipeline failed: {0}")]
    Fatal(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 문법(정규식) 불일치
    #[error("line does not match access log grammar")]
    NoMatch,

    /// 특정 필드 파싱 실패
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쓰기 실패
    #[error("write failed: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: LogfluxError = ConfigError::InvalidValue {
            field: "sink.dsn".to_owned(),
            reason: "expected 5 fields".to_owned(),
        }
        .into();
        assert!(matches!(err, LogfluxError::Config(_)));
        assert!(err.to_string().contains("sink.dsn"));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::InvalidField {
            field: "request".to_owned(),
            reason: "expected 3 tokens, got 2".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("request"));
        assert!(msg.contains("got 2"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: LogfluxError = io.into();
        assert!(matches!(err, LogfluxError::Io(_)));
    }

    #[test]
    fn pipeline_state_errors_display() {
        assert_eq!(
            PipelineError::AlreadyRunning.to_string(),
            "pipeline is already running"
        );
        assert_eq!(PipelineError::NotRunning.to_string(), "pipeline is not running");
    }
}
