#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 성장하는 파일에서 원시 라인 수집 (tail)
//! - [`parser`]: nginx 액세스 로그 파서 및 파서 워커
//! - [`sink`]: 포인트 변환, InfluxDB 싱크, 배치 라이터 워커
//! - [`buffer`]: 라이터의 인메모리 배치 버퍼
//! - [`counter`]: 처리/에러 카운터 집계
//! - [`monitor`]: 처리량 샘플링 및 상태 스냅샷
//! - [`queue`]: 다중 소비자 수신기와 큐 깊이 측정
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> raw queue -> ParseWorker x N -> entry queue -> SinkWriter x M -> InfluxDB
//!     |                          |                               |
//!  poll + seek end        regex + timestamp               batch + line protocol
//! ```

pub mod buffer;
pub mod config;
pub mod counter;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod queue;

pub mod collector;
pub mod parser;
pub mod sink;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder, ReaderExit};

// 설정
pub use config::{ParseMode, PipelineConfig, PipelineConfigBuilder, TimestampZone};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{AccessLogParser, ParsedLine};

// 수집기
pub use collector::{FileTailer, RawRecord};

// 싱크
pub use sink::{InfluxConnector, Point, PointBatch, Sink, SinkConnector, SinkDescriptor};

// 모니터
pub use counter::Counters;
pub use monitor::{Monitor, SystemSnapshot};

// 버퍼
pub use buffer::BatchBuffer;
