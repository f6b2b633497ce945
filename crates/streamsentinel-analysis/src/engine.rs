//! 분석 엔진.
//!
//! 시계열 저장소, 점수 윈도우, 헬스 상태 머신을 하나로 묶는다.
//! 쓰기는 인제스트 게이트웨이 태스크 하나만 하고, 읽기는 어디서든 가능하다.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use streamsentinel_core::config::AppConfig;
use streamsentinel_core::models::health::{HealthAlert, HealthStatus, HealthSummary};
use streamsentinel_core::models::metrics::MetricSample;
use streamsentinel_core::models::obs::ObsOutputSettings;
use streamsentinel_core::models::score::ScoreResult;
use streamsentinel_core::ports::notifier::HealthNotifier;
use tracing::debug;

use crate::health::HealthMonitor;
use crate::scorer::{QualityScorer, ScoringWindow};
use crate::time_series::TimeSeriesStore;

/// 분석 엔진
pub struct Engine {
    store: RwLock<TimeSeriesStore>,
    window: RwLock<ScoringWindow>,
    health: Mutex<HealthMonitor>,
    scorer: QualityScorer,
    target_kbps: RwLock<f64>,
    output_settings: RwLock<Option<ObsOutputSettings>>,
}

impl Engine {
    /// 설정으로 엔진 생성
    pub fn new(config: &AppConfig) -> Self {
        let window_size = config.scoring.window_size;
        Self {
            store: RwLock::new(TimeSeriesStore::new(config.monitor.history_capacity)),
            window: RwLock::new(ScoringWindow::new(window_size)),
            health: Mutex::new(HealthMonitor::new(&config.health)),
            scorer: QualityScorer::new(window_size),
            target_kbps: RwLock::new(config.scoring.target_bitrate_kbps),
            output_settings: RwLock::new(None),
        }
    }

    /// 융합 샘플 반영. 헬스 상태가 바뀌면 알림 반환.
    ///
    /// 알림 수신자는 헬스 잠금을 잡은 채 호출되므로 엔진을 다시 호출하면 안 된다.
    pub fn ingest(&self, sample: Arc<MetricSample>) -> Option<HealthAlert> {
        self.store.write().append_sample(&sample);
        let alert = self.health.lock().update(&sample);
        self.window.write().push(sample);
        alert
    }

    /// 키의 시계열 복사본
    pub fn series(&self, key: &str) -> Vec<(f64, f64)> {
        self.store.read().series(key)
    }

    /// 최근 `window_secs`초 평균
    pub fn recent_average(&self, key: &str, window_secs: f64) -> Option<f64> {
        self.store.read().recent_average(key, window_secs)
    }

    /// 현재 윈도우로 점수 계산
    pub fn score(&self) -> ScoreResult {
        let snapshot = self.window.read().snapshot();
        let target = *self.target_kbps.read();
        let settings = self.output_settings.read().clone();
        self.scorer
            .compute_with_settings(&snapshot, target, settings.as_ref())
    }

    /// 헬스 상태 스냅샷
    pub fn health_status(&self) -> HealthStatus {
        self.health.lock().status()
    }

    /// 헬스 요약
    pub fn health_summary(&self) -> Option<HealthSummary> {
        self.health.lock().summary()
    }

    /// 헬스 알림 수신자 등록
    pub fn subscribe_alerts(&self, notifier: Arc<dyn HealthNotifier>) {
        self.health.lock().subscribe(notifier);
    }

    /// 원격 출력 설정 갱신
    pub fn set_output_settings(&self, settings: Option<ObsOutputSettings>) {
        if let Some(settings) = &settings {
            debug!("출력 설정 갱신: {settings}");
        }
        *self.output_settings.write() = settings;
    }

    /// 현재 출력 설정. 모르면 `Unknown` 자리표시.
    pub fn output_settings(&self) -> ObsOutputSettings {
        self.output_settings
            .read()
            .clone()
            .unwrap_or_else(ObsOutputSettings::unknown)
    }

    /// 목표 비트레이트 (kbps)
    pub fn target_bitrate(&self) -> f64 {
        *self.target_kbps.read()
    }

    /// 목표 비트레이트 변경
    pub fn set_target_bitrate(&self, kbps: f64) {
        *self.target_kbps.write() = kbps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamsentinel_core::models::health::HealthState;
    use streamsentinel_core::models::score::Grade;

    fn sample(ts: f64) -> Arc<MetricSample> {
        Arc::new(MetricSample {
            rtt_ms: 15.0,
            uplink_kbps: 10_000.0,
            ..MetricSample::new(ts)
        })
    }

    #[test]
    fn empty_engine_has_no_data() {
        let engine = Engine::new(&AppConfig::default_config());
        assert!(engine.score().is_no_data());
        assert!(engine.series("rtt_ms").is_empty());
        assert!(engine.health_summary().is_none());
        assert_eq!(engine.health_status().state, HealthState::Normal);
        assert!(engine.output_settings().is_unknown());
    }

    #[test]
    fn ingest_updates_all_views() {
        let engine = Engine::new(&AppConfig::default_config());
        for i in 0..3 {
            assert!(engine.ingest(sample(i as f64)).is_none());
        }
        assert_eq!(engine.series("net.rtt_ms").len(), 3);
        assert_eq!(engine.score().grade, Grade::Good);
        assert_eq!(engine.health_summary().unwrap().samples, 3);
    }

    #[test]
    fn target_bitrate_affects_score() {
        let engine = Engine::new(&AppConfig::default_config());
        engine.ingest(sample(1.0));
        let relaxed = engine.score();

        engine.set_target_bitrate(20_000.0);
        assert_eq!(engine.target_bitrate(), 20_000.0);
        let strict = engine.score();
        assert!(strict.score < relaxed.score);
    }

    #[test]
    fn output_settings_roundtrip() {
        let engine = Engine::new(&AppConfig::default_config());
        let settings = ObsOutputSettings {
            output_height: Some(1080),
            ..ObsOutputSettings::unknown()
        };
        engine.set_output_settings(Some(settings.clone()));
        assert_eq!(engine.output_settings(), settings);
        engine.set_output_settings(None);
        assert!(engine.output_settings().is_unknown());
    }
}
