//! 3-루프 스케줄러.
//!
//! 로컬 인제스트(1초), 게이트웨이(단일 writer), 상태 보고(5초) 오케스트레이션.
//! OBS 폴링은 `supervisor`가 따로 돌리며 같은 인제스트 채널로 합류한다.

use std::sync::Arc;
use std::time::Duration;
use streamsentinel_analysis::engine::Engine;
use streamsentinel_analysis::gateway::{IngestEvent, IngestGateway};
use streamsentinel_core::config::AppConfig;
use streamsentinel_core::models::score::ScoreResult;
use streamsentinel_core::ports::telemetry::LocalTelemetrySource;
use streamsentinel_monitor::feed::FeedReader;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event_bus::{AppEvent, EventBus};

/// 인제스트 채널 기본 용량
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 로컬 수집 간격 (폴링 소스만 해당)
    pub ingest_interval: Duration,
    /// 점수/헬스 보고 간격
    pub report_interval: Duration,
    /// 인제스트 채널 용량
    pub channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ingest_interval: Duration::from_secs(1),
            report_interval: Duration::from_secs(5),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    /// 앱 설정에서 생성
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ingest_interval: config.ingest_interval(),
            report_interval: config.report_interval(),
            ..Self::default()
        }
    }
}

/// 로컬 측정값 공급 방식
pub enum LocalSource {
    /// 주기적으로 `collect()` 호출
    Polled(Arc<dyn LocalTelemetrySource>),
    /// 외부 프로세스가 줄 단위로 밀어주는 피드 (EOF에서 종료)
    Feed(FeedReader<Box<dyn AsyncBufRead + Unpin + Send>>),
}

/// 스케줄러
pub struct Scheduler {
    config: SchedulerConfig,
    engine: Arc<Engine>,
    bus: Arc<EventBus>,
}

impl Scheduler {
    /// 새 스케줄러 생성
    pub fn new(config: SchedulerConfig, engine: Arc<Engine>, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            engine,
            bus,
        }
    }

    /// 인제스트 채널 생성
    pub fn ingest_channel(&self) -> (mpsc::Sender<IngestEvent>, mpsc::Receiver<IngestEvent>) {
        mpsc::channel(self.config.channel_capacity.max(1))
    }

    /// 게이트웨이 루프. 모든 송신자가 닫히면 종료한다.
    pub fn spawn_gateway(&self, mut rx: mpsc::Receiver<IngestEvent>) -> JoinHandle<()> {
        let mut gateway = IngestGateway::new(self.engine.clone());
        let bus = self.bus.clone();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(sample) = gateway.handle(event) {
                    bus.publish(AppEvent::SampleIngested(sample));
                }
            }
            debug!("인제스트 채널 닫힘, 게이트웨이 종료");
        })
    }

    /// 로컬 인제스트 루프
    pub fn spawn_local(
        &self,
        source: LocalSource,
        tx: mpsc::Sender<IngestEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let interval_dur = self.config.ingest_interval;

        tokio::spawn(async move {
            match source {
                LocalSource::Polled(source) => {
                    info!("로컬 수집 시작 (주기: {}ms)", interval_dur.as_millis());
                    let mut interval = tokio::time::interval(interval_dur);
                    loop {
                        tokio::select! {
                            _ = interval.tick() => {
                                match source.collect().await {
                                    Ok(telemetry) => {
                                        if tx.send(IngestEvent::Local(telemetry)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => warn!("로컬 수집 실패: {e}"),
                                }
                            }
                            _ = shutdown_rx.changed() => {
                                info!("로컬 수집 루프 종료");
                                break;
                            }
                        }
                    }
                }
                LocalSource::Feed(mut reader) => {
                    info!("로컬 피드 수신 시작");
                    loop {
                        tokio::select! {
                            next = reader.next_telemetry() => {
                                match next {
                                    Ok(Some(telemetry)) => {
                                        if tx.send(IngestEvent::Local(telemetry)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(None) => {
                                        info!("로컬 피드 종료 (버린 줄 {}개)", reader.discarded());
                                        break;
                                    }
                                    Err(e) => {
                                        warn!("로컬 피드 읽기 실패: {e}");
                                        break;
                                    }
                                }
                            }
                            _ = shutdown_rx.changed() => {
                                info!("로컬 피드 루프 종료");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// 상태 보고 루프
    pub fn spawn_report(&self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let bus = self.bus.clone();
        let interval_dur = self.config.report_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_dur);
            // 첫 틱은 즉시 발생하므로 건너뜀
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        report(&engine, &bus);
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("보고 루프 종료");
                        break;
                    }
                }
            }
        })
    }
}

/// 현재 점수와 헬스 요약을 로그로 남기고 버스에 발행
pub fn report(engine: &Engine, bus: &EventBus) -> ScoreResult {
    let result = engine.score();
    if result.is_no_data() {
        debug!("점수 보고: 데이터 없음");
    } else {
        info!(
            "품질 점수 {:.1} ({}): {}",
            result.score, result.grade, result.action
        );
        for reason in &result.reasons {
            info!("  사유: {reason}");
        }
    }

    if let Some(summary) = engine.health_summary() {
        debug!(
            "헬스 요약: {} (점수 {:.0}, RTT {:.1}ms, 손실 {:.2}%, 버린 프레임 {:.3})",
            summary.state,
            summary.health_score,
            summary.avg_rtt_ms,
            summary.avg_loss_pct,
            summary.avg_dropped_ratio
        );
    }

    bus.publish(AppEvent::ScoreReported(result.clone()));
    result
}
