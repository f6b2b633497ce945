//! 종료 제어.
//!
//! OS 시그널을 받거나 로컬 피드가 끝나면 모든 루프에 종료를 알린다.
//! 폴링 소스(sysinfo)는 스스로 끝나지 않으므로 시그널만 종료 사유가 된다.

use std::fmt;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// SIGINT, SIGTERM, Ctrl+C
    Signal(&'static str),
    /// 로컬 측정 소스 종료 (피드 EOF 또는 읽기 실패)
    LocalSourceEnded,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal(name) => write!(f, "{name} 수신"),
            ExitReason::LocalSourceEnded => f.write_str("로컬 측정 소스 종료"),
        }
    }
}

/// 종료 신호 송신측
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// 종료 수신기
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// 종료 신호 발송 (구독자가 없어도 값은 갱신)
    pub fn trigger(&self, reason: ExitReason) {
        info!("종료 신호 발송: {reason}");
        self.tx.send_replace(true);
    }

    /// 시그널 또는 로컬 소스 종료 중 먼저 온 쪽을 기다린 뒤 종료 신호 발송
    pub async fn run_until_exit(&self, local_done: oneshot::Receiver<()>) -> ExitReason {
        let reason = tokio::select! {
            name = os_signal() => ExitReason::Signal(name),
            _ = local_done => ExitReason::LocalSourceEnded,
        };
        self.trigger(reason);
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

async fn os_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                let name = tokio::select! {
                    _ = sigint.recv() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                };
                return name;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("시그널 핸들러 등록 실패, Ctrl+C만 대기: {e}");
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C",
        Err(e) => {
            // 시그널로는 끝낼 수 없고 로컬 소스 종료만 남는다
            warn!("Ctrl+C 핸들러 등록 실패: {e}");
            std::future::pending().await
        }
    }
}
