//! 통계 폴링 세션.
//!
//! 연결된 클라이언트에서 고정 주기로 통계를 가져와 채널로 보낸다.
//! 첫 실패에서 `RemoteEvent::Disconnected`를 보내고 종료하며, 재연결은 호출자 몫이다.

use std::sync::Arc;
use std::time::Duration;
use streamsentinel_core::error::CoreError;
use streamsentinel_core::models::metrics::RemoteStats;
use streamsentinel_core::ports::remote::RemoteStatsSource;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// 폴링 세션이 내보내는 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// 새 통계 스냅샷
    Stats(RemoteStats),
    /// 연결 끊김: 이전 스냅샷은 더 이상 유효하지 않다
    Disconnected { reason: String },
}

/// 폴링 종료 사유
#[derive(Debug)]
pub enum PollOutcome {
    /// 종료 신호 수신
    Shutdown,
    /// 수신 측 채널 닫힘
    ReceiverClosed,
    /// 통계 조회 실패
    Failed(CoreError),
}

/// 통계 폴러
pub struct ObsPoller {
    source: Arc<dyn RemoteStatsSource>,
    interval: Duration,
}

impl ObsPoller {
    /// 새 폴러 생성
    pub fn new(source: Arc<dyn RemoteStatsSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// 폴링 루프 실행.
    ///
    /// 종료 신호는 매 조회 전과 대기 중에 확인한다.
    pub async fn run(
        &self,
        tx: &mpsc::Sender<RemoteEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PollOutcome {
        info!("OBS 통계 폴링 시작 (주기: {:?})", self.interval);

        loop {
            if *shutdown.borrow() {
                debug!("OBS 폴링 종료 신호");
                return PollOutcome::Shutdown;
            }

            match self.source.poll_stats().await {
                Ok(stats) => {
                    if tx.send(RemoteEvent::Stats(stats)).await.is_err() {
                        return PollOutcome::ReceiverClosed;
                    }
                }
                Err(e) => {
                    warn!("OBS 폴링 중단: {e}");
                    let _ = tx
                        .send(RemoteEvent::Disconnected {
                            reason: e.to_string(),
                        })
                        .await;
                    return PollOutcome::Failed(e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("OBS 폴링 종료 신호 (대기 중)");
                        return PollOutcome::Shutdown;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use streamsentinel_core::models::obs::{ConnectionState, ObsOutputSettings};

    /// N번 성공 후 실패하는 가짜 소스
    struct FakeSource {
        polls: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl RemoteStatsSource for FakeSource {
        async fn connect(&self) -> Result<(), CoreError> {
            Ok(())
        }

        async fn poll_stats(&self) -> Result<RemoteStats, CoreError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_after {
                return Err(CoreError::Network("socket closed".to_string()));
            }
            Ok(RemoteStats {
                timestamp: n as f64,
                fps: 60.0,
                ..Default::default()
            })
        }

        async fn fetch_output_settings(&self) -> Result<ObsOutputSettings, CoreError> {
            Ok(ObsOutputSettings::unknown())
        }

        async fn disconnect(&self) {}

        fn state(&self) -> ConnectionState {
            ConnectionState::Polling
        }
    }

    #[tokio::test]
    async fn emits_stats_then_disconnected() {
        let source = Arc::new(FakeSource {
            polls: AtomicUsize::new(0),
            fail_after: 2,
        });
        let poller = ObsPoller::new(source.clone(), Duration::from_millis(5));
        let (tx, mut rx) = mpsc::channel(8);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let outcome = poller.run(&tx, &mut shutdown_rx).await;
        assert_matches!(outcome, PollOutcome::Failed(CoreError::Network(_)));

        assert_matches!(rx.recv().await, Some(RemoteEvent::Stats(s)) if s.timestamp == 0.0);
        assert_matches!(rx.recv().await, Some(RemoteEvent::Stats(s)) if s.timestamp == 1.0);
        assert_matches!(rx.recv().await, Some(RemoteEvent::Disconnected { .. }));
        assert_eq!(source.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let source = Arc::new(FakeSource {
            polls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let poller = ObsPoller::new(source.clone(), Duration::from_secs(60));
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { poller.run(&tx, &mut shutdown_rx).await });

        // 첫 조회 결과를 받은 뒤 긴 대기 중에 종료 신호
        assert_matches!(rx.recv().await, Some(RemoteEvent::Stats(_)));
        shutdown_tx.send(true).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(outcome, PollOutcome::Shutdown);
        assert_eq!(source.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_before_first_poll() {
        let source = Arc::new(FakeSource {
            polls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let poller = ObsPoller::new(source.clone(), Duration::from_millis(5));
        let (tx, _rx) = mpsc::channel(8);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(true);

        assert_matches!(
            poller.run(&tx, &mut shutdown_rx).await,
            PollOutcome::Shutdown
        );
        assert_eq!(source.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn closed_receiver_ends_loop() {
        let source = Arc::new(FakeSource {
            polls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let poller = ObsPoller::new(source, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        assert_matches!(
            poller.run(&tx, &mut shutdown_rx).await,
            PollOutcome::ReceiverClosed
        );
    }
}
