//! OBS WebSocket v5 메시지 형식.
//!
//! 모든 메시지는 `{"op": <opcode>, "d": {...}}` 형태다.
//! 요청은 `requestId`로 응답과 짝지어진다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ObsError;

/// 지원하는 RPC 버전
pub const RPC_VERSION: u32 = 1;

/// 인증 실패 시 서버가 보내는 close 코드
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

/// 메시지 opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Hello = 0,
    Identify = 1,
    Identified = 2,
    Reidentify = 3,
    Event = 5,
    Request = 6,
    RequestResponse = 7,
}

impl OpCode {
    /// 숫자 → opcode
    pub fn from_u8(op: u8) -> Option<Self> {
        match op {
            0 => Some(OpCode::Hello),
            1 => Some(OpCode::Identify),
            2 => Some(OpCode::Identified),
            3 => Some(OpCode::Reidentify),
            5 => Some(OpCode::Event),
            6 => Some(OpCode::Request),
            7 => Some(OpCode::RequestResponse),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct Outgoing<T: Serialize> {
    op: u8,
    d: T,
}

#[derive(Deserialize)]
struct RawIncoming {
    op: u8,
    #[serde(default)]
    d: Value,
}

/// Hello (op 0): 접속 직후 서버가 보내는 첫 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    /// 인증 요구 시에만 존재
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

/// 서버 인증 챌린지 (base64 문자열)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

/// Identify (op 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// 이벤트 구독 비트마스크 (폴링만 하므로 0)
    pub event_subscriptions: u32,
}

/// Identified (op 2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    request_type: &'a str,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_data: Option<Value>,
}

/// 요청 처리 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

/// RequestResponse (op 7)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

impl RequestResponse {
    /// 성공이면 응답 데이터, 실패면 `ObsError::Protocol`
    pub fn into_result(self) -> Result<Value, ObsError> {
        if self.request_status.result {
            Ok(self
                .response_data
                .unwrap_or_else(|| Value::Object(Default::default())))
        } else {
            Err(ObsError::Protocol(format!(
                "{} 실패 (code {}): {}",
                self.request_type,
                self.request_status.code,
                self.request_status.comment.as_deref().unwrap_or("-")
            )))
        }
    }
}

/// 수신 메시지
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Hello(Hello),
    Identified(Identified),
    /// 이벤트 (구독하지 않으므로 건너뛴다)
    Event { event_type: String },
    RequestResponse(RequestResponse),
    /// 처리하지 않는 opcode
    Other(u8),
}

/// 텍스트 프레임 디코딩
pub fn decode(text: &str) -> Result<Incoming, ObsError> {
    let raw: RawIncoming = serde_json::from_str(text)?;
    let incoming = match OpCode::from_u8(raw.op) {
        Some(OpCode::Hello) => Incoming::Hello(serde_json::from_value(raw.d)?),
        Some(OpCode::Identified) => Incoming::Identified(serde_json::from_value(raw.d)?),
        Some(OpCode::Event) => Incoming::Event {
            event_type: raw
                .d
                .get("eventType")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        Some(OpCode::RequestResponse) => {
            Incoming::RequestResponse(serde_json::from_value(raw.d)?)
        }
        _ => Incoming::Other(raw.op),
    };
    Ok(incoming)
}

/// Identify 메시지 인코딩
pub fn encode_identify(authentication: Option<String>) -> Result<String, ObsError> {
    let msg = Outgoing {
        op: OpCode::Identify as u8,
        d: Identify {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        },
    };
    Ok(serde_json::to_string(&msg)?)
}

/// Request 메시지 인코딩
pub fn encode_request(
    request_type: &str,
    request_id: &str,
    request_data: Option<Value>,
) -> Result<String, ObsError> {
    let msg = Outgoing {
        op: OpCode::Request as u8,
        d: Request {
            request_type,
            request_id,
            request_data,
        },
    };
    Ok(serde_json::to_string(&msg)?)
}

// ============================================================
// 응답 데이터
// ============================================================

/// GetStats 응답
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsData {
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory_usage: f64,
    #[serde(default)]
    pub active_fps: f64,
    /// 평균 프레임 렌더 시간 (ms)
    #[serde(default)]
    pub average_frame_render_time: f64,
    #[serde(default)]
    pub render_skipped_frames: f64,
    #[serde(default)]
    pub render_total_frames: f64,
    #[serde(default)]
    pub output_skipped_frames: f64,
    #[serde(default)]
    pub output_total_frames: f64,
}

/// GetStreamStatus 응답.
///
/// 지연/비트레이트 필드는 서버 빌드에 따라 없을 수 있다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusData {
    #[serde(default)]
    pub output_active: bool,
    #[serde(default)]
    pub output_reconnecting: bool,
    #[serde(default)]
    pub output_skipped_frames: f64,
    #[serde(default)]
    pub output_total_frames: f64,
    #[serde(default)]
    pub output_bytes: f64,
    /// 인코딩 지연 (ms)
    #[serde(default)]
    pub encoding_lag: Option<f64>,
    /// 렌더 지연 (ms)
    #[serde(default)]
    pub render_lag: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// 비트레이트 (bps)
    #[serde(default)]
    pub bitrate: Option<f64>,
}

/// GetVideoSettings 응답
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettingsData {
    #[serde(default)]
    pub fps_numerator: Option<u32>,
    #[serde(default)]
    pub fps_denominator: Option<u32>,
    #[serde(default)]
    pub base_width: Option<u32>,
    #[serde(default)]
    pub base_height: Option<u32>,
    #[serde(default)]
    pub output_width: Option<u32>,
    #[serde(default)]
    pub output_height: Option<u32>,
}
