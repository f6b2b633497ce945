//! 로컬 텔레메트리 피드 파서.
//!
//! 외부 측정 프로세스는 한 줄에 JSON 객체 하나를 출력한다:
//!
//! ```json
//! {"event":"metrics","ts":1712345678.5,"rtt_ms":18.2,"loss_pct":0.0,"uplink_kbps":9800,
//!  "cpu_pct":31.0,"gpu_pct":22.0,"mem_mb":5120,
//!  "obs":{"dropped_ratio":0.0,"encoding_lag_ms":2.1,"render_lag_ms":3.0}}
//! ```
//!
//! 숫자가 아닌 값은 0으로 처리하고, 형식이 잘못된 줄은 버린다.

use serde_json::{Map, Value};
use streamsentinel_core::error::CoreError;
use streamsentinel_core::models::metrics::{
    unix_now_secs, LocalObsMetrics, LocalTelemetry, MetricKey,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// 이 값보다 큰 타임스탬프는 밀리초로 간주
const MILLIS_THRESHOLD: f64 = 1e12;

/// 페이로드에서 측정값이 아닌 키
const RESERVED_KEYS: [&str; 3] = ["event", "ts", "obs"];

/// 타임스탬프 정규화 (ms → 초). 누락/비정상 값이면 `now`.
pub fn normalize_timestamp(ts: Option<&Value>, now: f64) -> f64 {
    match ts.and_then(number) {
        Some(ts) if ts > MILLIS_THRESHOLD => ts / 1000.0,
        Some(ts) if ts > 0.0 => ts,
        _ => now,
    }
}

/// JSON 값 → 숫자 (숫자 문자열 허용)
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn field(map: &Map<String, Value>, key: &str) -> f64 {
    map.get(key).and_then(number).unwrap_or(0.0)
}

/// 한 줄 파싱.
///
/// - `Ok(Some(_))`: 측정값
/// - `Ok(None)`: 빈 줄 또는 `event`가 `"metrics"`가 아닌 줄 (무시)
/// - `Err(_)`: JSON이 아니거나 객체가 아님
pub fn parse_payload(line: &str, now: f64) -> Result<Option<LocalTelemetry>, CoreError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)?;
    let Value::Object(map) = value else {
        return Err(CoreError::Validation {
            field: "payload".to_string(),
            message: "JSON 객체가 아닙니다".to_string(),
        });
    };

    if let Some(event) = map.get("event") {
        if event.as_str() != Some("metrics") {
            return Ok(None);
        }
    }

    let obs = match map.get("obs") {
        Some(Value::Object(obs)) => LocalObsMetrics {
            dropped_ratio: field(obs, "dropped_ratio"),
            encoding_lag_ms: field(obs, "encoding_lag_ms"),
            render_lag_ms: field(obs, "render_lag_ms"),
        },
        _ => LocalObsMetrics::default(),
    };

    // `net.rtt_ms`처럼 접두사가 붙은 알려진 키도 extra로 보내지 않는다
    let extra = map
        .iter()
        .filter(|(k, _)| {
            !RESERVED_KEYS.contains(&k.as_str()) && MetricKey::from_name(k).is_none()
        })
        .filter_map(|(k, v)| v.as_f64().map(|v| (k.clone(), v)))
        .collect();

    Ok(Some(LocalTelemetry {
        timestamp: normalize_timestamp(map.get("ts"), now),
        rtt_ms: field(&map, "rtt_ms"),
        loss_pct: field(&map, "loss_pct"),
        uplink_kbps: field(&map, "uplink_kbps"),
        cpu_pct: field(&map, "cpu_pct"),
        gpu_pct: field(&map, "gpu_pct"),
        mem_mb: field(&map, "mem_mb"),
        obs,
        extra,
    }))
}

/// 줄 단위 피드 리더
pub struct FeedReader<R> {
    reader: R,
    line: String,
    discarded: u64,
}

impl<R: AsyncBufRead + Unpin> FeedReader<R> {
    /// 새 리더 생성
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            discarded: 0,
        }
    }

    /// 지금까지 버린 줄 수
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// 다음 측정값. 잘못된 줄은 로그를 남기고 건너뛴다. EOF면 `None`.
    pub async fn next_telemetry(&mut self) -> Result<Option<LocalTelemetry>, CoreError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                debug!("로컬 피드 종료 (EOF)");
                return Ok(None);
            }
            match parse_payload(&self.line, unix_now_secs()) {
                Ok(Some(telemetry)) => return Ok(Some(telemetry)),
                Ok(None) => continue,
                Err(e) => {
                    self.discarded += 1;
                    warn!("로컬 피드 줄 파싱 실패, 건너뜀: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::io::BufReader;

    #[test]
    fn parses_full_payload() {
        let line = r#"{"event":"metrics","ts":1700000000.5,"rtt_ms":18.2,"loss_pct":0.1,
            "uplink_kbps":9800,"cpu_pct":31,"gpu_pct":22.5,"mem_mb":5120,
            "obs":{"dropped_ratio":0.01,"encoding_lag_ms":2.1,"render_lag_ms":3.0}}"#
            .replace('\n', "");
        let t = parse_payload(&line, 0.0).unwrap().unwrap();
        assert_eq!(t.timestamp, 1700000000.5);
        assert_eq!(t.rtt_ms, 18.2);
        assert_eq!(t.uplink_kbps, 9800.0);
        assert_eq!(t.cpu_pct, 31.0);
        assert_eq!(t.obs.encoding_lag_ms, 2.1);
        assert_eq!(t.obs.dropped_ratio, 0.01);
        assert!(t.extra.is_empty());
    }

    #[test]
    fn millisecond_timestamp_is_normalized() {
        let t = parse_payload(r#"{"ts":1700000000500}"#, 0.0).unwrap().unwrap();
        assert_eq!(t.timestamp, 1700000000.5);
    }

    #[test]
    fn missing_timestamp_uses_now() {
        let t = parse_payload(r#"{"rtt_ms":10}"#, 42.0).unwrap().unwrap();
        assert_eq!(t.timestamp, 42.0);
        let t = parse_payload(r#"{"ts":"later"}"#, 43.0).unwrap().unwrap();
        assert_eq!(t.timestamp, 43.0);
    }

    #[test]
    fn non_numeric_fields_default_to_zero() {
        let t = parse_payload(
            r#"{"rtt_ms":"n/a","loss_pct":null,"cpu_pct":"55.5","obs":"broken"}"#,
            1.0,
        )
        .unwrap()
        .unwrap();
        assert_eq!(t.rtt_ms, 0.0);
        assert_eq!(t.loss_pct, 0.0);
        assert_eq!(t.cpu_pct, 55.5);
        assert_eq!(t.obs, LocalObsMetrics::default());
    }

    #[test]
    fn unknown_numeric_keys_go_to_extra() {
        let t = parse_payload(r#"{"rtt_ms":5,"temperature_c":71.5,"label":"x"}"#, 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(t.extra.get("temperature_c"), Some(&71.5));
        assert!(!t.extra.contains_key("label"));
        assert!(!t.extra.contains_key("rtt_ms"));
    }

    #[test]
    fn prefixed_known_keys_stay_out_of_extra() {
        let t = parse_payload(r#"{"rtt_ms":10,"net.rtt_ms":900,"sys.cpu_pct":99}"#, 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(t.rtt_ms, 10.0);
        assert!(t.extra.is_empty());
    }

    #[test]
    fn other_events_are_ignored() {
        assert_eq!(parse_payload(r#"{"event":"log","msg":"hi"}"#, 1.0).unwrap(), None);
        assert_eq!(parse_payload("   ", 1.0).unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert_matches!(parse_payload("{not json", 1.0), Err(CoreError::Serialization(_)));
        assert_matches!(parse_payload("[1,2,3]", 1.0), Err(CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn reader_skips_bad_lines() {
        let input = concat!(
            "{\"rtt_ms\":10,\"ts\":1}\n",
            "garbage\n",
            "{\"event\":\"status\"}\n",
            "\n",
            "{\"rtt_ms\":20,\"ts\":2}\n",
        );
        let mut reader = FeedReader::new(BufReader::new(input.as_bytes()));

        let first = reader.next_telemetry().await.unwrap().unwrap();
        assert_eq!(first.rtt_ms, 10.0);
        let second = reader.next_telemetry().await.unwrap().unwrap();
        assert_eq!(second.rtt_ms, 20.0);
        assert_eq!(second.timestamp, 2.0);
        assert!(reader.next_telemetry().await.unwrap().is_none());
        assert_eq!(reader.discarded(), 1);
    }
}
