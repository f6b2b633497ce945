//! OBS WebSocket v5 클라이언트.
//!
//! 상태 머신: `Disconnected → Connecting → Authenticating → Polling`.
//! 어느 단계에서든 실패하면 연결을 정리하고 `Disconnected`로 돌아간다.
//! 자동 재연결은 하지 않는다.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use streamsentinel_core::config::ObsConfig;
use streamsentinel_core::error::CoreError;
use streamsentinel_core::models::metrics::{unix_now_secs, RemoteStats};
use streamsentinel_core::models::obs::{ConnectionState, ObsOutputSettings};
use streamsentinel_core::ports::remote::RemoteStatsSource;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::auth::compute_auth_response;
use crate::error::{AuthFailure, ErrorKind, ObsError};
use crate::protocol::{
    self, Hello, Incoming, StatsData, StreamStatusData, VideoSettingsData,
    CLOSE_AUTHENTICATION_FAILED,
};
use crate::ws_client::{self, WsMessage, WsSender};

/// close 프레임 전송 대기 한도
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// OBS 클라이언트
pub struct ObsClient {
    config: ObsConfig,
    conn: Mutex<Option<ObsConnection>>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ObsClient {
    /// 새 클라이언트 생성 (연결하지 않음)
    pub fn new(config: ObsConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            conn: Mutex::new(None),
            state_tx,
        }
    }

    /// 연결 설정
    pub fn config(&self) -> &ObsConfig {
        &self.config
    }

    /// 현재 상태
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// 상태 변경 구독
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let prev = self.state_tx.send_replace(state);
        if prev != state {
            debug!("OBS 연결 상태: {prev} → {state}");
        }
    }

    /// 연결 + 인증. 기존 연결이 있으면 먼저 닫는다.
    pub async fn connect(&self) -> Result<(), ObsError> {
        let mut guard = self.conn.lock().await;
        if let Some(old) = guard.take() {
            old.close().await;
        }

        self.set_state(ConnectionState::Connecting);
        match self.establish().await {
            Ok(conn) => {
                *guard = Some(conn);
                self.set_state(ConnectionState::Polling);
                info!("OBS 연결 완료: {}", self.config.url());
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                warn!("OBS 연결 실패: {e}");
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<ObsConnection, ObsError> {
        let timeout = self.config.timeout();
        let (sender, inbox) = ws_client::connect(&self.config.url(), timeout).await?;
        let mut conn = ObsConnection::new(sender, inbox, timeout);

        self.set_state(ConnectionState::Authenticating);
        if let Err(e) = conn.handshake(self.config.password()).await {
            conn.close().await;
            return Err(e);
        }
        Ok(conn)
    }

    /// 통계 1회 조회 (GetStats + GetStreamStatus).
    ///
    /// 실패하면 연결을 정리하고 `Disconnected`로 전이한 뒤 에러를 반환한다.
    pub async fn poll_stats(&self) -> Result<RemoteStats, ObsError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_connected)?;

        let result = conn.fetch_stats().await;
        if let Err(e) = &result {
            warn!("OBS 통계 조회 실패, 연결 해제: {e}");
            if let Some(conn) = guard.take() {
                conn.close().await;
            }
            self.set_state(ConnectionState::Disconnected);
        }
        result
    }

    /// 출력 설정 조회.
    ///
    /// 요청별 에러 응답은 해당 항목을 `None`으로 두고, 전송 에러는 연결을 정리하고 반환한다.
    pub async fn fetch_output_settings(&self) -> Result<ObsOutputSettings, ObsError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_connected)?;

        let result = conn
            .fetch_output_settings(&self.config.stream_output_name)
            .await;
        if let Err(e) = &result {
            warn!("OBS 출력 설정 조회 실패, 연결 해제: {e}");
            if let Some(conn) = guard.take() {
                conn.close().await;
            }
            self.set_state(ConnectionState::Disconnected);
        }
        result
    }

    /// close 프레임 전송 후 연결 해제
    pub async fn disconnect(&self) {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            conn.close().await;
            info!("OBS 연결 종료");
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

#[async_trait]
impl RemoteStatsSource for ObsClient {
    async fn connect(&self) -> Result<(), CoreError> {
        Ok(ObsClient::connect(self).await?)
    }

    async fn poll_stats(&self) -> Result<RemoteStats, CoreError> {
        Ok(ObsClient::poll_stats(self).await?)
    }

    async fn fetch_output_settings(&self) -> Result<ObsOutputSettings, CoreError> {
        Ok(ObsClient::fetch_output_settings(self).await?)
    }

    async fn disconnect(&self) {
        ObsClient::disconnect(self).await
    }

    fn state(&self) -> ConnectionState {
        ObsClient::state(self)
    }
}

fn not_connected() -> ObsError {
    ObsError::Transport("OBS에 연결되어 있지 않습니다".to_string())
}

/// 타임아웃을 적용해 실행 (초과 시 `ObsError::Timeout`)
async fn within<T>(
    timeout: Duration,
    operation: &str,
    fut: impl Future<Output = Result<T, ObsError>>,
) -> Result<T, ObsError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ObsError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// 수신 결과
enum Inbound {
    Message(Incoming),
    Closed { code: Option<u16>, reason: String },
}

/// 클라이언트 내부 전용 연결 상태
struct ObsConnection {
    sender: WsSender,
    inbox: mpsc::Receiver<WsMessage>,
    timeout: Duration,
    is_authenticated: bool,
    is_connected: bool,
}

impl ObsConnection {
    fn new(sender: WsSender, inbox: mpsc::Receiver<WsMessage>, timeout: Duration) -> Self {
        Self {
            sender,
            inbox,
            timeout,
            is_authenticated: false,
            is_connected: true,
        }
    }

    async fn next_inbound(&mut self) -> Result<Inbound, ObsError> {
        match self.inbox.recv().await {
            Some(WsMessage::Text(text)) => Ok(Inbound::Message(protocol::decode(&text)?)),
            Some(WsMessage::Close { code, reason }) => {
                self.is_connected = false;
                Ok(Inbound::Closed { code, reason })
            }
            None => {
                self.is_connected = false;
                Ok(Inbound::Closed {
                    code: None,
                    reason: "수신 채널 종료".to_string(),
                })
            }
        }
    }

    /// Hello 수신 → (필요 시 인증 응답 계산) → Identify → Identified 대기
    async fn handshake(&mut self, password: Option<&str>) -> Result<(), ObsError> {
        let timeout = self.timeout;
        let hello = within(timeout, "Hello 수신", self.wait_hello()).await?;
        debug!(
            "OBS Hello: 서버 {} / rpc {}",
            hello.obs_web_socket_version.as_deref().unwrap_or("?"),
            hello.rpc_version
        );

        let authentication = match &hello.authentication {
            None => None,
            Some(challenge) => {
                let password = password.ok_or(AuthFailure::PasswordRequired)?;
                Some(compute_auth_response(
                    password,
                    &challenge.salt,
                    &challenge.challenge,
                )?)
            }
        };

        let sent_auth = authentication.is_some();
        let identify = protocol::encode_identify(authentication)?;
        self.sender.send_text(&identify).await?;

        within(timeout, "Identified 수신", self.wait_identified(sent_auth)).await?;
        self.is_authenticated = true;
        Ok(())
    }

    async fn wait_hello(&mut self) -> Result<Hello, ObsError> {
        loop {
            match self.next_inbound().await? {
                Inbound::Message(Incoming::Hello(hello)) => return Ok(hello),
                Inbound::Message(other) => trace!("Hello 대기 중 무시: {other:?}"),
                Inbound::Closed { code, reason } => {
                    return Err(ObsError::Transport(format!(
                        "Hello 수신 전 연결 종료 ({code:?}): {reason}"
                    )))
                }
            }
        }
    }

    /// 인증 응답을 보낸 뒤 4009로 닫힌 경우만 인증 거부, 그 외 종료는 전송 에러
    async fn wait_identified(&mut self, sent_auth: bool) -> Result<(), ObsError> {
        loop {
            match self.next_inbound().await? {
                Inbound::Message(Incoming::Identified(identified)) => {
                    debug!("OBS Identified: rpc {}", identified.negotiated_rpc_version);
                    return Ok(());
                }
                Inbound::Message(other) => trace!("Identified 대기 중 무시: {other:?}"),
                Inbound::Closed {
                    code: Some(CLOSE_AUTHENTICATION_FAILED),
                    reason,
                } if sent_auth => {
                    let detail = format!("인증 실패 (4009) {reason}");
                    return Err(AuthFailure::Rejected(detail.trim().to_string()).into());
                }
                Inbound::Closed { code, reason } => {
                    return Err(ObsError::Transport(format!(
                        "Identified 수신 전 연결 종료 ({code:?}): {reason}"
                    )))
                }
            }
        }
    }

    /// 요청 전송 후 같은 `requestId` 응답까지 대기 (이벤트와 다른 응답은 건너뜀)
    async fn request(
        &mut self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, ObsError> {
        if !self.is_connected {
            return Err(not_connected());
        }
        let request_id = Uuid::new_v4().to_string();
        let text = protocol::encode_request(request_type, &request_id, request_data)?;
        self.sender.send_text(&text).await?;

        let timeout = self.timeout;
        within(timeout, request_type, async {
            loop {
                match self.next_inbound().await? {
                    Inbound::Message(Incoming::RequestResponse(resp))
                        if resp.request_id == request_id =>
                    {
                        return resp.into_result();
                    }
                    Inbound::Message(other) => trace!("{request_type} 응답 대기 중 무시: {other:?}"),
                    Inbound::Closed { code, reason } => {
                        return Err(ObsError::Transport(format!(
                            "{request_type} 응답 대기 중 연결 종료 ({code:?}): {reason}"
                        )))
                    }
                }
            }
        })
        .await
    }

    async fn fetch_stats(&mut self) -> Result<RemoteStats, ObsError> {
        let stats: StatsData = serde_json::from_value(self.request("GetStats", None).await?)?;
        let status: StreamStatusData =
            serde_json::from_value(self.request("GetStreamStatus", None).await?)?;
        Ok(remote_stats_from(&stats, &status, unix_now_secs()))
    }

    async fn fetch_output_settings(
        &mut self,
        stream_output_name: &str,
    ) -> Result<ObsOutputSettings, ObsError> {
        let mut settings = ObsOutputSettings::unknown();

        if let Some(video) = tolerate(self.request("GetVideoSettings", None).await)? {
            let video: VideoSettingsData = serde_json::from_value(video).unwrap_or_default();
            settings.output_width = video.output_width;
            settings.output_height = video.output_height;
            settings.fps_numerator = video.fps_numerator;
            settings.fps_denominator = video.fps_denominator;
        }

        if let Some(service) = tolerate(self.request("GetStreamServiceSettings", None).await)? {
            settings.bitrate_kbps = service
                .get("streamServiceSettings")
                .and_then(|s| s.get("bitrate"))
                .and_then(as_u32);
        }

        let output_request = json!({ "outputName": stream_output_name });
        let output = tolerate(self.request("GetOutputSettings", Some(output_request)).await)?;
        if let Some(output) = output.as_ref().and_then(|o| o.get("outputSettings")) {
            if let Some(bitrate) = output.get("bitrate").and_then(as_u32) {
                settings.bitrate_kbps = Some(bitrate);
            }
            settings.encoder = output
                .get("encoder")
                .or_else(|| output.get("streamEncoder"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }

        Ok(settings)
    }

    async fn close(self) {
        if self.is_connected {
            match tokio::time::timeout(CLOSE_TIMEOUT, self.sender.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("close 프레임 전송 실패: {e}"),
                Err(_) => debug!("close 프레임 전송 타임아웃"),
            }
        }
    }
}

/// 프로토콜 에러 응답은 `None`으로 흡수하고 그 외 에러는 전달
fn tolerate(result: Result<Value, ObsError>) -> Result<Option<Value>, ObsError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::Protocol => {
            debug!("출력 설정 항목 조회 실패 (Unknown 처리): {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// GetStats + GetStreamStatus 응답으로 `RemoteStats` 구성.
///
/// - 버린 프레임 비율 = `outputSkippedFrames / max(outputTotalFrames, 1)` (GetStats)
/// - 렌더 지연이 없거나 0이면 `averageFrameRenderTime`으로 대체
/// - fps가 없으면 `activeFps`, 비트레이트는 bps → kbps
pub fn remote_stats_from(
    stats: &StatsData,
    status: &StreamStatusData,
    timestamp: f64,
) -> RemoteStats {
    let dropped_ratio = if stats.output_total_frames > 0.0 {
        stats.output_skipped_frames / stats.output_total_frames.max(1.0)
    } else {
        0.0
    };
    let render_lag_ms = status
        .render_lag
        .filter(|v| *v > 0.0)
        .unwrap_or(stats.average_frame_render_time);
    let fps = status
        .fps
        .filter(|v| *v > 0.0)
        .unwrap_or(stats.active_fps);

    RemoteStats {
        timestamp,
        dropped_ratio,
        encoding_lag_ms: status.encoding_lag.unwrap_or(0.0),
        render_lag_ms,
        fps,
        bitrate_kbps: status.bitrate.unwrap_or(0.0) / 1000.0,
        output_active: status.output_active,
    }
}
