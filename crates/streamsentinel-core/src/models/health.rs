//! 스트리밍 헬스 상태 및 알림 모델.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 헬스 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthState::Normal => "Normal",
            HealthState::Warning => "Warning",
            HealthState::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// 디바운스 카운터를 포함한 헬스 상태 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// 현재 상태
    pub state: HealthState,
    /// 연속 불량 샘플 수
    pub consecutive_bad: u32,
    /// 연속 정상 샘플 수
    pub consecutive_good: u32,
    /// 현재 장애 시작 시각 (Unix epoch 초). 정상 복귀 시 해제.
    pub incident_start_time: Option<f64>,
}

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// Critical 진입 (끊김)
    Interruption,
    /// Warning 진입 (품질 저하)
    Degradation,
    /// Normal 복귀
    Recovery,
}

/// 끊김 심각도 (장애 지속 시간 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentSeverity {
    /// 10초 미만
    Temporary,
    /// 30초 미만
    Unstable,
    /// 30초 이상
    Severe,
}

impl IncidentSeverity {
    /// 장애 지속 시간(초) → 심각도
    pub fn from_duration(duration_secs: f64) -> Self {
        if duration_secs < 10.0 {
            IncidentSeverity::Temporary
        } else if duration_secs < 30.0 {
            IncidentSeverity::Unstable
        } else {
            IncidentSeverity::Severe
        }
    }
}

/// 상태 전이 시 한 번 발생하는 헬스 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    /// 알림 종류
    pub kind: AlertKind,
    /// 전이 후 상태
    pub state: HealthState,
    /// 끊김 심각도 (Interruption 알림만)
    pub severity: Option<IncidentSeverity>,
    /// 사용자 표시 메시지
    pub message: String,
    /// 전이를 일으킨 샘플의 끊김 점수
    pub interruption_score: f64,
    /// 전이 시각 (샘플 타임스탬프)
    pub timestamp: f64,
    /// 장애 지속 시간 (초)
    pub incident_duration_secs: f64,
}

/// 최근 이력 기반 헬스 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// 현재 상태
    pub state: HealthState,
    /// 이력 샘플 수
    pub samples: usize,
    /// 최근 평균 RTT (ms)
    pub avg_rtt_ms: f64,
    /// 최근 평균 손실률 (%)
    pub avg_loss_pct: f64,
    /// 최근 평균 버린 프레임 비율
    pub avg_dropped_ratio: f64,
    /// 100 − 평균값 기준 끊김 점수
    pub health_score: f64,
    /// 현재 장애 지속 시간 (초), 장애가 없으면 0
    pub incident_duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_by_duration() {
        assert_eq!(IncidentSeverity::from_duration(0.0), IncidentSeverity::Temporary);
        assert_eq!(IncidentSeverity::from_duration(9.9), IncidentSeverity::Temporary);
        assert_eq!(IncidentSeverity::from_duration(10.0), IncidentSeverity::Unstable);
        assert_eq!(IncidentSeverity::from_duration(29.9), IncidentSeverity::Unstable);
        assert_eq!(IncidentSeverity::from_duration(30.0), IncidentSeverity::Severe);
    }

    #[test]
    fn status_default_is_normal() {
        let status = HealthStatus::default();
        assert_eq!(status.state, HealthState::Normal);
        assert_eq!(status.consecutive_bad, 0);
        assert!(status.incident_start_time.is_none());
    }
}
