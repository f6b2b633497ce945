//! OBS 연결 감독.
//!
//! 연결 → 출력 설정 조회 → 통계 폴링을 돌리고, 끊기면 지수 백오프로 재연결한다.
//! 인증 실패는 재시도하지 않는다.

use std::sync::Arc;
use std::time::Duration;
use streamsentinel_analysis::engine::Engine;
use streamsentinel_analysis::gateway::IngestEvent;
use streamsentinel_core::config::ReconnectConfig;
use streamsentinel_core::error::CoreError;
use streamsentinel_core::models::obs::ConnectionState;
use streamsentinel_core::ports::remote::RemoteStatsSource;
use streamsentinel_network::poller::{ObsPoller, PollOutcome, RemoteEvent};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::event_bus::{AppEvent, EventBus};

/// 다음 백오프 (2배, 최대값 제한)
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// 실제 대기 시간 (최소 쿨다운 보장)
pub fn retry_delay(backoff: Duration, cooldown: Duration) -> Duration {
    backoff.max(cooldown)
}

/// 감독 루프 종료 사유
#[derive(Debug)]
pub enum SupervisorExit {
    /// 종료 신호
    Shutdown,
    /// 인증 실패 (재시작 전까지 재시도하지 않음)
    AuthFailed(String),
    /// 인제스트 채널 닫힘
    IngestClosed,
}

/// 한 번의 연결 세션 결과
enum SessionEnd {
    Exit(SupervisorExit),
    Retry,
}

/// OBS 연결 감독자
pub struct ObsSupervisor {
    source: Arc<dyn RemoteStatsSource>,
    engine: Arc<Engine>,
    bus: Arc<EventBus>,
    reconnect: ReconnectConfig,
    poll_interval: Duration,
}

impl ObsSupervisor {
    pub fn new(
        source: Arc<dyn RemoteStatsSource>,
        engine: Arc<Engine>,
        bus: Arc<EventBus>,
        reconnect: ReconnectConfig,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            engine,
            bus,
            reconnect,
            poll_interval,
        }
    }

    /// 감독 루프 실행
    pub async fn run(
        &self,
        ingest_tx: mpsc::Sender<IngestEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SupervisorExit {
        let initial = self.reconnect.initial_backoff();
        let max = self.reconnect.max_backoff();
        let cooldown = self.reconnect.cooldown();
        let mut backoff = initial;

        loop {
            if *shutdown_rx.borrow() {
                return SupervisorExit::Shutdown;
            }

            self.bus
                .publish(AppEvent::ConnectionChanged(ConnectionState::Connecting));
            match self.source.connect().await {
                Ok(()) => {
                    backoff = initial;
                    match self.session(&ingest_tx, &mut shutdown_rx).await {
                        SessionEnd::Exit(exit) => return exit,
                        SessionEnd::Retry => {}
                    }
                }
                Err(CoreError::Auth(reason)) => {
                    error!("OBS 인증 실패, 재연결 중단: {reason}");
                    self.publish_disconnected();
                    return SupervisorExit::AuthFailed(reason);
                }
                Err(e) => {
                    warn!("OBS 연결 실패: {e}");
                    self.publish_disconnected();
                }
            }

            let delay = retry_delay(backoff, cooldown);
            info!("OBS 재연결 대기: {:.1}초", delay.as_secs_f64());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        return SupervisorExit::Shutdown;
                    }
                }
            }
            backoff = next_backoff(backoff, max);
        }
    }

    /// 연결된 상태에서 출력 설정 조회 후 폴링
    async fn session(
        &self,
        ingest_tx: &mpsc::Sender<IngestEvent>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        self.bus
            .publish(AppEvent::ConnectionChanged(ConnectionState::Polling));

        match self.source.fetch_output_settings().await {
            Ok(settings) => {
                info!("OBS 출력 설정: {settings}");
                self.engine.set_output_settings(Some(settings.clone()));
                self.bus.publish(AppEvent::OutputSettingsUpdated(settings));
            }
            Err(e) => {
                warn!("OBS 출력 설정 조회 실패: {e}");
            }
        }

        let poller = ObsPoller::new(self.source.clone(), self.poll_interval);
        let (remote_tx, remote_rx) = mpsc::channel(16);
        let poll = async {
            let remote_tx = remote_tx;
            poller.run(&remote_tx, shutdown_rx).await
        };
        let (outcome, forwarded) = tokio::join!(poll, forward(remote_rx, ingest_tx));

        self.source.disconnect().await;
        self.engine.set_output_settings(None);
        self.publish_disconnected();

        if !forwarded {
            return SessionEnd::Exit(SupervisorExit::IngestClosed);
        }
        match outcome {
            PollOutcome::Shutdown => SessionEnd::Exit(SupervisorExit::Shutdown),
            PollOutcome::ReceiverClosed => SessionEnd::Exit(SupervisorExit::IngestClosed),
            PollOutcome::Failed(CoreError::Auth(reason)) => {
                error!("OBS 인증 만료, 재연결 중단: {reason}");
                SessionEnd::Exit(SupervisorExit::AuthFailed(reason))
            }
            PollOutcome::Failed(e) => {
                debug!("폴링 세션 종료: {e}");
                SessionEnd::Retry
            }
        }
    }

    fn publish_disconnected(&self) {
        self.bus
            .publish(AppEvent::ConnectionChanged(ConnectionState::Disconnected));
    }
}

/// 폴러 이벤트를 인제스트 이벤트로 변환해 전달. 인제스트 채널이 닫히면 `false`.
async fn forward(
    mut remote_rx: mpsc::Receiver<RemoteEvent>,
    ingest_tx: &mpsc::Sender<IngestEvent>,
) -> bool {
    while let Some(event) = remote_rx.recv().await {
        let event = match event {
            RemoteEvent::Stats(stats) => IngestEvent::Remote(stats),
            RemoteEvent::Disconnected { reason } => {
                info!("원격 통계 중단: {reason}");
                IngestEvent::RemoteLost
            }
        };
        if ingest_tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}
