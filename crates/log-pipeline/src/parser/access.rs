//! nginx 액세스 로그 파서
//!
//! 다음 형식의 라인을 [`LogEntry`]로 변환합니다.
//!
//! ```text
//! 1.2.3.4 - - [10/Nov/2023:13:20:00 +0000] https "GET /foo?x=1 HTTP/1.1" 200 512 "-" "UA" "-" 0.002 0.010
//! ```
//!
//! # 필드 순서
//! remote_addr, remote_user(2개), `[time_local]`, scheme, `"request"`, status,
//! body_bytes_sent, `"referer"`, `"user_agent"`, `"x_forwarded_for"`,
//! upstream_response_time, request_time
//!
//! 정규식은 앵커 없이 검색하므로 앞쪽에 잡음이 있어도 가장 왼쪽 매치를 사용합니다.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use logflux_core::error::LogfluxError;
use logflux_core::pipeline::LogParser;
use logflux_core::types::LogEntry;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::config::{ParseMode, TimestampZone};
use crate::error::LogPipelineError;

/// 액세스 로그 문법 (캡처 그룹 13개)
const ACCESS_LOG_PATTERN: &str = r#"([\d,]+)\s+([^ \[]+)\s+([^ \[]+)\s+\[([^\]]+)\]\s+([a-z]+)\s+"([^"]+)"\s+(\d{3})\s+(\d+)\s+"([^"]+)"\s+"(.*?)"\s+"([\d.-]+)"\s+([\d.-]+)\s+([\d.-]+)"#;

/// 오프셋을 제외한 타임스탬프 형식 (`10/Nov/2023:13:20:00`)
const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S";

/// 오프셋을 포함한 타임스탬프 형식 (`10/Nov/2023:13:20:00 +0000`)
const TIME_LOCAL_WITH_OFFSET_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

// 캡처 그룹 인덱스
const GROUP_TIME_LOCAL: usize = 4;
const GROUP_SCHEME: usize = 5;
const GROUP_REQUEST: usize = 6;
const GROUP_STATUS: usize = 7;
const GROUP_BYTES_SENT: usize = 8;
const GROUP_UPSTREAM_TIME: usize = 12;
const GROUP_REQUEST_TIME: usize = 13;

/// 파싱 결과
///
/// lenient 모드에서 타임스탬프 변환이 실패해도 엔트리가 생성되며,
/// 이때 `recovered`에 실패 원인이 담깁니다.
#[derive(Debug)]
pub struct ParsedLine {
    /// 생성된 엔트리
    pub entry: LogEntry,
    /// epoch로 대체된 타임스탬프 에러 (있다면)
    pub recovered: Option<LogPipelineError>,
}

impl ParsedLine {
    /// 필드 복구 없이 깨끗하게 파싱되었는지 확인합니다.
    pub fn is_clean(&self) -> bool {
        self.recovered.is_none()
    }
}

/// nginx 액세스 로그 파서
///
/// 정규식은 생성 시 한 번만 컴파일되며, 파서는 여러 워커가 `Arc`로 공유합니다.
pub struct AccessLogParser {
    pattern: Regex,
    zone: TimestampZone,
    mode: ParseMode,
}

impl AccessLogParser {
    /// 새 파서를 생성합니다.
    pub fn new(zone: TimestampZone, mode: ParseMode) -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(ACCESS_LOG_PATTERN)?,
            zone,
            mode,
        })
    }

    /// 현재 파싱 모드
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// 한 줄을 파싱합니다.
    ///
    /// 문법 불일치, 요청 라인 형식 오류, 경로 디코딩 실패는 모드와 관계없이 에러입니다.
    /// 숫자/타임스탬프 변환 실패는 strict 모드에서만 에러입니다.
    /// lenient 모드에서 숫자는 조용히 0이 되고, 타임스탬프는 epoch로 채운 뒤
    /// [`ParsedLine::recovered`]에 기록합니다 (에러 카운트 대상).
    pub fn parse_line(&self, raw: &[u8]) -> Result<ParsedLine, LogPipelineError> {
        let line = String::from_utf8_lossy(raw);
        let caps = self
            .pattern
            .captures(&line)
            .ok_or(LogPipelineError::NoMatch)?;
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());

        let (method, target) = split_request(group(GROUP_REQUEST))?;
        let path = decode_path(target)?;

        let (time_local, recovered) =
            match (self.parse_time_local(group(GROUP_TIME_LOCAL)), self.mode) {
                (Ok(time), _) => (time, None),
                (Err(e), ParseMode::Strict) => return Err(e),
                (Err(e), ParseMode::Lenient) => (self.epoch(), Some(e)),
            };

        let status = group(GROUP_STATUS);
        self.coerce(
            status
                .parse::<u16>()
                .map_err(|e| LogPipelineError::field("status", e.to_string())),
        )?;

        let bytes_sent =
            self.coerce(parse_number::<u64>("body_bytes_sent", group(GROUP_BYTES_SENT)))?;
        let upstream_time = self.coerce(parse_number::<f64>(
            "upstream_response_time",
            group(GROUP_UPSTREAM_TIME),
        ))?;
        let request_time =
            self.coerce(parse_number::<f64>("request_time", group(GROUP_REQUEST_TIME)))?;

        Ok(ParsedLine {
            entry: LogEntry {
                time_local,
                bytes_sent,
                path: path.into_owned(),
                method: method.to_owned(),
                scheme: group(GROUP_SCHEME).to_owned(),
                status: status.to_owned(),
                upstream_time,
                request_time,
            },
            recovered,
        })
    }

    /// strict 모드에서는 숫자 변환 에러를 전파하고, lenient 모드에서는 0으로 대체합니다.
    fn coerce<T: Default>(&self, result: Result<T, LogPipelineError>) -> Result<T, LogPipelineError> {
        match (result, self.mode) {
            (Ok(value), _) => Ok(value),
            (Err(e), ParseMode::Strict) => Err(e),
            (Err(_), ParseMode::Lenient) => Ok(T::default()),
        }
    }

    fn parse_time_local(&self, raw: &str) -> Result<DateTime<FixedOffset>, LogPipelineError> {
        let invalid = |reason: String| LogPipelineError::field("time_local", reason);
        match self.zone {
            TimestampZone::FromLog => {
                DateTime::parse_from_str(raw, TIME_LOCAL_WITH_OFFSET_FORMAT)
                    .map_err(|e| invalid(format!("'{raw}': {e}")))
            }
            TimestampZone::Fixed(zone) => {
                // 오프셋 표기는 무시하고 벽시계 시각만 사용
                let wall = raw.split_once(' ').map_or(raw, |(wall, _)| wall);
                let naive = NaiveDateTime::parse_from_str(wall, TIME_LOCAL_FORMAT)
                    .map_err(|e| invalid(format!("'{raw}': {e}")))?;
                zone.from_local_datetime(&naive)
                    .single()
                    .ok_or_else(|| invalid(format!("'{raw}' is ambiguous in {zone}")))
            }
        }
    }

    /// 타임스탬프 변환 실패 시 대체값 (해석 기준 타임존의 Unix epoch)
    fn epoch(&self) -> DateTime<FixedOffset> {
        let zone = match self.zone {
            TimestampZone::Fixed(zone) => zone,
            TimestampZone::FromLog => Utc.fix(),
        };
        DateTime::UNIX_EPOCH.with_timezone(&zone)
    }
}

impl LogParser for AccessLogParser {
    fn format_name(&self) -> &str {
        "nginx_access"
    }

    fn parse(&self, raw: &[u8]) -> Result<LogEntry, LogfluxError> {
        Ok(self.parse_line(raw)?.entry)
    }
}

/// 요청 라인을 공백 기준으로 정확히 3개 토큰으로 나눕니다.
fn split_request(request: &str) -> Result<(&str, &str), LogPipelineError> {
    let tokens: Vec<&str> = request.split(' ').collect();
    match tokens.as_slice() {
        [method, target, _protocol] => Ok((method, target)),
        other => Err(LogPipelineError::field(
            "request",
            format!("expected 3 tokens, got {}", other.len()),
        )),
    }
}

/// 요청 대상에서 경로만 추출하고 퍼센트 인코딩을 해제합니다.
///
/// `/`로 시작하는 origin-form은 `?`/`#` 앞까지 원문을 그대로 자릅니다.
/// 스캐너가 보내는 `<`, `>`, 백틱 같은 문자도 로그에는 그대로 남기 때문에
/// 엄격한 URI 문법 검사는 absolute-form에만 적용합니다.
fn decode_path(target: &str) -> Result<Cow<'_, str>, LogPipelineError> {
    if target.starts_with('/') {
        let raw_path = target
            .find(['?', '#'])
            .map_or(target, |end| &target[..end]);
        check_escapes(raw_path)?;
        return Ok(percent_decode_str(raw_path).decode_utf8_lossy());
    }

    let uri: http::Uri = target
        .parse()
        .map_err(|e| LogPipelineError::field("request", format!("invalid target '{target}': {e}")))?;
    decode_owned(uri.path())
}

fn decode_owned(path: &str) -> Result<Cow<'static, str>, LogPipelineError> {
    check_escapes(path)?;
    Ok(Cow::Owned(
        percent_decode_str(path).decode_utf8_lossy().into_owned(),
    ))
}

/// `%` 뒤에 16진수 두 자리가 오는지 확인합니다.
fn check_escapes(path: &str) -> Result<(), LogPipelineError> {
    let bytes = path.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(LogPipelineError::field(
                    "request",
                    format!("invalid escape in path '{path}'"),
                ));
            }
        }
    }
    Ok(())
}

fn parse_number<T>(field: &str, raw: &str) -> Result<T, LogPipelineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| LogPipelineError::field(field, format!("'{raw}': {e}")))
}
