//! 스트리밍 헬스 상태 머신.
//!
//! 샘플마다 끊김 점수(0~100)를 계산하고, 연속 샘플 수로 디바운스하여
//! Normal / Warning / Critical 사이를 전이한다. 알림은 전이 순간에만 한 번 발생한다.
//! 시각은 샘플 타임스탬프만 사용한다.

use std::collections::VecDeque;
use std::sync::Arc;
use streamsentinel_core::config::HealthConfig;
use streamsentinel_core::models::health::{
    AlertKind, HealthAlert, HealthState, HealthStatus, HealthSummary, IncidentSeverity,
};
use streamsentinel_core::models::metrics::MetricSample;
use streamsentinel_core::ports::notifier::HealthNotifier;
use tracing::{debug, info, warn};

/// 이 점수 이상이면 끊김 수준
pub const CRITICAL_SCORE: f64 = 70.0;
/// 이 점수 이상이면 경고 수준
pub const WARNING_SCORE: f64 = 40.0;

/// 요약에 쓰는 최근 샘플 수
const SUMMARY_WINDOW: usize = 10;
/// 복구 메시지를 구분하는 장애 지속 시간 (초)
const LONG_INCIDENT_SECS: f64 = 30.0;

/// 샘플 하나의 끊김 점수 (가산, 최대 100). 손실률은 % 단위.
pub fn interruption_score(
    rtt_ms: f64,
    loss_pct: f64,
    dropped_ratio: f64,
    encoding_lag_ms: f64,
    render_lag_ms: f64,
) -> f64 {
    let mut score = 0.0;

    if dropped_ratio > 0.05 {
        score += 40.0;
    } else if dropped_ratio > 0.02 {
        score += 20.0;
    }

    if loss_pct > 5.0 {
        score += 30.0;
    } else if loss_pct > 2.0 {
        score += 15.0;
    }

    if rtt_ms > 200.0 {
        score += 20.0;
    } else if rtt_ms > 150.0 {
        score += 10.0;
    }

    if encoding_lag_ms > 50.0 {
        score += 10.0;
    }
    if render_lag_ms > 50.0 {
        score += 10.0;
    }

    f64::min(score, 100.0)
}

fn sample_score(sample: &MetricSample) -> f64 {
    interruption_score(
        sample.rtt_ms,
        sample.loss_pct,
        sample.dropped_ratio,
        sample.encoding_lag_ms,
        sample.render_lag_ms,
    )
}

fn interruption_message(severity: IncidentSeverity) -> &'static str {
    match severity {
        IncidentSeverity::Temporary => "⚠️ 일시적인 스트리밍 끊김이 감지되었습니다.",
        IncidentSeverity::Unstable => {
            "🚨 스트리밍이 불안정합니다. 시청자 경험에 영향을 줄 수 있습니다."
        }
        IncidentSeverity::Severe => "💥 심각한 스트리밍 끊김이 발생했습니다. 즉시 조치가 필요합니다.",
    }
}

const DEGRADATION_MESSAGE: &str = "📉 스트리밍 품질이 저하되고 있습니다. 모니터링을 강화하세요.";

fn recovery_message(incident_secs: f64) -> &'static str {
    if incident_secs > LONG_INCIDENT_SECS {
        "✅ 스트리밍이 안정적으로 복구되었습니다."
    } else {
        "✅ 스트리밍 상태가 정상으로 돌아왔습니다."
    }
}

/// 요약 계산용 이력 항목
#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    timestamp: f64,
    rtt_ms: f64,
    loss_pct: f64,
    dropped_ratio: f64,
}

/// 헬스 상태 머신
pub struct HealthMonitor {
    critical_threshold: u32,
    recovery_threshold: u32,
    history_size: usize,
    status: HealthStatus,
    /// 현재 불량 구간에서 끊김 수준(≥70)이 이어진 첫 샘플 시각
    critical_streak_start: Option<f64>,
    history: VecDeque<HistoryEntry>,
    notifiers: Vec<Arc<dyn HealthNotifier>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(&HealthConfig::default())
    }
}

impl HealthMonitor {
    /// 설정으로 상태 머신 생성 (임계값은 최소 1)
    pub fn new(config: &HealthConfig) -> Self {
        let history_size = config.history_size.max(1);
        Self {
            critical_threshold: config.critical_threshold.max(1),
            recovery_threshold: config.recovery_threshold.max(1),
            history_size,
            status: HealthStatus::default(),
            critical_streak_start: None,
            history: VecDeque::with_capacity(history_size),
            notifiers: Vec::new(),
        }
    }

    /// 알림 수신자 등록
    pub fn subscribe(&mut self, notifier: Arc<dyn HealthNotifier>) {
        self.notifiers.push(notifier);
    }

    /// 현재 상태 스냅샷
    pub fn status(&self) -> HealthStatus {
        self.status.clone()
    }

    /// 현재 상태
    pub fn state(&self) -> HealthState {
        self.status.state
    }

    /// 샘플 반영. 상태가 바뀌면 알림을 반환하고 수신자에게도 전달한다.
    pub fn update(&mut self, sample: &MetricSample) -> Option<HealthAlert> {
        self.record(sample);

        let score = sample_score(sample);
        let alert = if score >= WARNING_SCORE {
            self.on_bad_sample(sample.timestamp, score)
        } else {
            self.on_good_sample(sample.timestamp, score)
        };

        if let Some(alert) = &alert {
            self.dispatch(alert);
        }
        alert
    }

    fn record(&mut self, sample: &MetricSample) {
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            timestamp: sample.timestamp,
            rtt_ms: sample.rtt_ms,
            loss_pct: sample.loss_pct,
            dropped_ratio: sample.dropped_ratio,
        });
    }

    fn on_bad_sample(&mut self, ts: f64, score: f64) -> Option<HealthAlert> {
        if score >= CRITICAL_SCORE {
            self.critical_streak_start.get_or_insert(ts);
        } else {
            self.critical_streak_start = None;
        }
        self.status.consecutive_bad = self.status.consecutive_bad.saturating_add(1);
        self.status.consecutive_good = 0;

        if self.status.consecutive_bad < self.critical_threshold {
            return None;
        }

        let target = if score >= CRITICAL_SCORE {
            HealthState::Critical
        } else {
            HealthState::Warning
        };
        if self.status.state == target {
            return None;
        }

        // 장애 시작은 Critical 진입 때만 기록
        if target == HealthState::Critical && self.status.incident_start_time.is_none() {
            self.status.incident_start_time = Some(self.critical_streak_start.unwrap_or(ts));
        }
        let duration = self
            .status
            .incident_start_time
            .map_or(0.0, |start| (ts - start).max(0.0));
        let previous = self.status.state;
        self.status.state = target;

        let alert = match target {
            HealthState::Critical => {
                let severity = IncidentSeverity::from_duration(duration);
                warn!(
                    "헬스 상태 전이: {previous} → Critical (끊김 점수 {score:.0}, 지속 {duration:.1}초)"
                );
                HealthAlert {
                    kind: AlertKind::Interruption,
                    state: target,
                    severity: Some(severity),
                    message: interruption_message(severity).to_string(),
                    interruption_score: score,
                    timestamp: ts,
                    incident_duration_secs: duration,
                }
            }
            _ => {
                warn!("헬스 상태 전이: {previous} → Warning (끊김 점수 {score:.0})");
                HealthAlert {
                    kind: AlertKind::Degradation,
                    state: target,
                    severity: None,
                    message: DEGRADATION_MESSAGE.to_string(),
                    interruption_score: score,
                    timestamp: ts,
                    incident_duration_secs: duration,
                }
            }
        };
        Some(alert)
    }

    fn on_good_sample(&mut self, ts: f64, score: f64) -> Option<HealthAlert> {
        self.status.consecutive_good = self.status.consecutive_good.saturating_add(1);
        self.status.consecutive_bad = 0;
        self.critical_streak_start = None;

        if self.status.consecutive_good < self.recovery_threshold
            || self.status.state == HealthState::Normal
        {
            return None;
        }

        let duration = self
            .status
            .incident_start_time
            .take()
            .map_or(0.0, |start| (ts - start).max(0.0));
        let previous = self.status.state;
        self.status.state = HealthState::Normal;
        info!("헬스 상태 전이: {previous} → Normal (장애 {duration:.1}초)");

        Some(HealthAlert {
            kind: AlertKind::Recovery,
            state: HealthState::Normal,
            severity: None,
            message: recovery_message(duration).to_string(),
            interruption_score: score,
            timestamp: ts,
            incident_duration_secs: duration,
        })
    }

    fn dispatch(&self, alert: &HealthAlert) {
        debug!("헬스 알림 전달: {:?} → {}개 수신자", alert.kind, self.notifiers.len());
        for notifier in &self.notifiers {
            notifier.notify(alert);
        }
    }

    /// 최근 이력 요약. 이력이 없으면 `None`.
    pub fn summary(&self) -> Option<HealthSummary> {
        let last = self.history.back()?;
        let recent: Vec<&HistoryEntry> = self.history.iter().rev().take(SUMMARY_WINDOW).collect();
        let n = recent.len() as f64;
        let avg_rtt_ms = recent.iter().map(|e| e.rtt_ms).sum::<f64>() / n;
        let avg_loss_pct = recent.iter().map(|e| e.loss_pct).sum::<f64>() / n;
        let avg_dropped_ratio = recent.iter().map(|e| e.dropped_ratio).sum::<f64>() / n;

        Some(HealthSummary {
            state: self.status.state,
            samples: self.history.len(),
            avg_rtt_ms,
            avg_loss_pct,
            avg_dropped_ratio,
            health_score: (100.0
                - interruption_score(avg_rtt_ms, avg_loss_pct, avg_dropped_ratio, 0.0, 0.0))
            .max(0.0),
            incident_duration_secs: self
                .status
                .incident_start_time
                .map_or(0.0, |start| (last.timestamp - start).max(0.0)),
        })
    }
}
