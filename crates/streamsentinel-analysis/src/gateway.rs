//! 인제스트 게이트웨이.
//!
//! 로컬 틱과 원격 폴링 결과를 하나의 `MetricSample`로 융합해 엔진에 넣는다.
//! 샘플은 로컬 틱마다 하나씩 만들어지고, 원격 값은 최신 스냅샷만 유지한다.

use std::sync::Arc;
use streamsentinel_core::models::metrics::{LocalTelemetry, MetricSample, RemoteStats};
use tracing::{debug, info};

use crate::engine::Engine;

/// 게이트웨이 입력 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// 로컬 측정값 (샘플 생성 트리거)
    Local(LocalTelemetry),
    /// 원격 폴링 결과
    Remote(RemoteStats),
    /// 원격 연결 끊김: 오래된 원격 값을 버린다
    RemoteLost,
}

/// 로컬 측정값과 원격 스냅샷 융합. 원격 값이 있으면 OBS 지표를 덮어쓴다.
pub fn fuse(local: &LocalTelemetry, remote: Option<&RemoteStats>) -> MetricSample {
    let mut sample = MetricSample {
        timestamp: local.timestamp,
        rtt_ms: local.rtt_ms,
        loss_pct: local.loss_pct,
        uplink_kbps: local.uplink_kbps,
        cpu_pct: local.cpu_pct,
        gpu_pct: local.gpu_pct,
        mem_mb: local.mem_mb,
        dropped_ratio: local.obs.dropped_ratio,
        encoding_lag_ms: local.obs.encoding_lag_ms,
        render_lag_ms: local.obs.render_lag_ms,
        extra: local.extra.clone(),
        ..Default::default()
    };
    if let Some(remote) = remote {
        sample.dropped_ratio = remote.dropped_ratio;
        sample.encoding_lag_ms = remote.encoding_lag_ms;
        sample.render_lag_ms = remote.render_lag_ms;
        sample.fps = remote.fps;
        sample.bitrate_kbps = remote.bitrate_kbps;
    }
    sample
}

/// 단일 writer 게이트웨이
pub struct IngestGateway {
    engine: Arc<Engine>,
    latest_local: Option<LocalTelemetry>,
    latest_remote: Option<RemoteStats>,
}

impl IngestGateway {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            latest_local: None,
            latest_remote: None,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// 최신 원격 스냅샷
    pub fn latest_remote(&self) -> Option<&RemoteStats> {
        self.latest_remote.as_ref()
    }

    /// 최신 로컬 측정값
    pub fn latest_local(&self) -> Option<&LocalTelemetry> {
        self.latest_local.as_ref()
    }

    /// 이벤트 처리. 로컬 이벤트면 융합 샘플을 엔진에 넣고 반환한다.
    pub fn handle(&mut self, event: IngestEvent) -> Option<Arc<MetricSample>> {
        match event {
            IngestEvent::Local(local) => {
                let sample = Arc::new(fuse(&local, self.latest_remote.as_ref()));
                self.latest_local = Some(local);
                self.engine.ingest(Arc::clone(&sample));
                Some(sample)
            }
            IngestEvent::Remote(remote) => {
                debug!(
                    "원격 스냅샷 갱신: 버린 프레임 {:.3}, 인코딩 지연 {:.1}ms",
                    remote.dropped_ratio, remote.encoding_lag_ms
                );
                self.latest_remote = Some(remote);
                None
            }
            IngestEvent::RemoteLost => {
                if self.latest_remote.take().is_some() {
                    info!("원격 연결 끊김, 원격 스냅샷 폐기");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamsentinel_core::config::AppConfig;
    use streamsentinel_core::models::metrics::LocalObsMetrics;

    fn local(ts: f64) -> LocalTelemetry {
        LocalTelemetry {
            timestamp: ts,
            rtt_ms: 18.0,
            cpu_pct: 30.0,
            obs: LocalObsMetrics {
                dropped_ratio: 0.01,
                encoding_lag_ms: 4.0,
                render_lag_ms: 5.0,
            },
            ..Default::default()
        }
    }

    fn remote() -> RemoteStats {
        RemoteStats {
            timestamp: 1.0,
            dropped_ratio: 0.2,
            encoding_lag_ms: 12.0,
            render_lag_ms: 9.0,
            fps: 60.0,
            bitrate_kbps: 5800.0,
            output_active: true,
        }
    }

    fn gateway() -> IngestGateway {
        IngestGateway::new(Arc::new(Engine::new(&AppConfig::default_config())))
    }

    #[test]
    fn local_only_uses_nested_obs() {
        let sample = fuse(&local(1.0), None);
        assert_eq!(sample.rtt_ms, 18.0);
        assert_eq!(sample.dropped_ratio, 0.01);
        assert_eq!(sample.encoding_lag_ms, 4.0);
        assert_eq!(sample.fps, 0.0);
    }

    #[test]
    fn remote_overrides_obs_fields() {
        let sample = fuse(&local(1.0), Some(&remote()));
        assert_eq!(sample.rtt_ms, 18.0);
        assert_eq!(sample.cpu_pct, 30.0);
        assert_eq!(sample.dropped_ratio, 0.2);
        assert_eq!(sample.render_lag_ms, 9.0);
        assert_eq!(sample.bitrate_kbps, 5800.0);
    }

    #[test]
    fn only_local_events_produce_samples() {
        let mut gw = gateway();
        assert!(gw.handle(IngestEvent::Remote(remote())).is_none());
        let sample = gw.handle(IngestEvent::Local(local(2.0))).unwrap();
        assert_eq!(sample.fps, 60.0);
        assert_eq!(gw.engine().series("fps"), vec![(2.0, 60.0)]);
        assert_eq!(gw.latest_local().map(|l| l.timestamp), Some(2.0));
    }

    #[test]
    fn remote_lost_clears_snapshot() {
        let mut gw = gateway();
        gw.handle(IngestEvent::Remote(remote()));
        gw.handle(IngestEvent::RemoteLost);
        assert!(gw.latest_remote().is_none());

        let sample = gw.handle(IngestEvent::Local(local(3.0))).unwrap();
        assert_eq!(sample.dropped_ratio, 0.01);
        assert_eq!(sample.fps, 0.0);
    }
}
