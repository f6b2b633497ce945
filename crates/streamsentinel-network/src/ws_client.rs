//! WebSocket 전송 계층.
//!
//! `tokio-tungstenite` 기반. 수신은 별도 태스크가 mpsc 채널로 전달하고,
//! 송신은 `WsSender`가 담당한다.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::ObsError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 수신 채널 버퍼 크기
const INBOX_CAPACITY: usize = 64;

/// WebSocket으로 수신한 메시지
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    /// 텍스트 메시지 (JSON)
    Text(String),
    /// 연결 종료 (close 코드, 사유)
    Close { code: Option<u16>, reason: String },
}

/// WebSocket 연결 수립 (타임아웃 적용)
///
/// 수신 메시지는 반환된 `Receiver`로, 송신은 `WsSender`로 처리.
pub async fn connect(
    url: &str,
    timeout: Duration,
) -> Result<(WsSender, mpsc::Receiver<WsMessage>), ObsError> {
    info!("WebSocket 연결: {url}");

    let (ws_stream, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| ObsError::Timeout {
            operation: "WebSocket 연결".to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| ObsError::Transport(format!("WebSocket 연결 실패: {e}")))?;

    let (write, read) = ws_stream.split();
    let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

    // 수신 태스크
    tokio::spawn(read_loop(read, tx));

    Ok((
        WsSender {
            write: Arc::new(tokio::sync::Mutex::new(write)),
        },
        rx,
    ))
}

/// 수신 루프: 소켓이 닫히거나 수신자가 사라지면 종료
async fn read_loop(mut read: SplitStream<WsStream>, tx: mpsc::Sender<WsMessage>) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if tx.send(WsMessage::Text(text.to_string())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = match frame {
                    Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                    None => (None, String::new()),
                };
                let _ = tx.send(WsMessage::Close { code, reason }).await;
                break;
            }
            Ok(_) => {} // Binary/Ping/Pong 무시 (Ping은 자동 응답)
            Err(e) => {
                warn!("WebSocket 수신 에러: {e}");
                let _ = tx
                    .send(WsMessage::Close {
                        code: None,
                        reason: e.to_string(),
                    })
                    .await;
                break;
            }
        }
    }
    debug!("WebSocket 수신 루프 종료");
}

/// WebSocket 송신기
#[derive(Clone, Debug)]
pub struct WsSender {
    write: Arc<tokio::sync::Mutex<SplitSink<WsStream, Message>>>,
}

impl WsSender {
    /// 텍스트 메시지 전송
    pub async fn send_text(&self, text: &str) -> Result<(), ObsError> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| ObsError::Transport(format!("WebSocket 전송 실패: {e}")))
    }

    /// 정상 종료 close 프레임 전송
    pub async fn close(&self) -> Result<(), ObsError> {
        let mut write = self.write.lock().await;
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client disconnect".into(),
        };
        write
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| ObsError::Transport(format!("WebSocket 종료 실패: {e}")))
    }
}
