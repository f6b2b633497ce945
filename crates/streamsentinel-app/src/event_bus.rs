//! 내부 이벤트 버스.
//!
//! `tokio::broadcast` 기반 내부 이벤트 라우팅.

use std::sync::Arc;
use streamsentinel_core::models::health::HealthAlert;
use streamsentinel_core::models::metrics::MetricSample;
use streamsentinel_core::models::obs::{ConnectionState, ObsOutputSettings};
use streamsentinel_core::models::score::ScoreResult;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 내부 앱 이벤트
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// 융합 샘플 인제스트 완료
    SampleIngested(Arc<MetricSample>),
    /// OBS 연결 상태 변경
    ConnectionChanged(ConnectionState),
    /// OBS 출력 설정 조회 완료
    OutputSettingsUpdated(ObsOutputSettings),
    /// 헬스 상태 전이
    HealthAlert(HealthAlert),
    /// 주기 점수 보고
    ScoreReported(ScoreResult),
}

/// 내부 이벤트 버스
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행 (구독자가 없으면 버림)
    pub fn publish(&self, event: AppEvent) {
        debug!("이벤트 발행: {:?}", std::mem::discriminant(&event));
        let _ = self.tx.send(event);
    }

    /// 구독자 생성
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

/// 연결 상태 변화를 로그로 남기는 구독 루프
pub fn spawn_status_logger(
    bus: &EventBus,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let mut last_state = None;
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(AppEvent::ConnectionChanged(state)) => {
                        if last_state != Some(state) {
                            info!("OBS 연결 상태: {state}");
                            last_state = Some(state);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("이벤트 {n}개 누락 (구독 지연)");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_rx.changed() => break,
            }
        }
    })
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
