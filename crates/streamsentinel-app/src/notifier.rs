//! 헬스 알림 수신자 구현.

use std::sync::Arc;
use streamsentinel_core::models::health::{AlertKind, HealthAlert};
use streamsentinel_core::ports::notifier::HealthNotifier;
use tracing::{info, warn};

use crate::event_bus::{AppEvent, EventBus};

/// 로그로 알림 출력 (복구는 info, 나머지는 warn)
pub struct LogNotifier;

impl HealthNotifier for LogNotifier {
    fn notify(&self, alert: &HealthAlert) {
        match alert.kind {
            AlertKind::Recovery => info!(
                "{} (장애 {:.1}초)",
                alert.message, alert.incident_duration_secs
            ),
            AlertKind::Interruption | AlertKind::Degradation => warn!(
                "{} (상태 {}, 끊김 점수 {:.0})",
                alert.message, alert.state, alert.interruption_score
            ),
        }
    }
}

/// 이벤트 버스로 알림 전달
pub struct BusNotifier {
    bus: Arc<EventBus>,
}

impl BusNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl HealthNotifier for BusNotifier {
    fn notify(&self, alert: &HealthAlert) {
        self.bus.publish(AppEvent::HealthAlert(alert.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamsentinel_core::models::health::HealthState;

    fn alert(kind: AlertKind) -> HealthAlert {
        HealthAlert {
            kind,
            state: HealthState::Warning,
            severity: None,
            message: "📉 스트리밍 품질이 저하되고 있습니다. 모니터링을 강화하세요.".to_string(),
            interruption_score: 50.0,
            timestamp: 4.0,
            incident_duration_secs: 4.0,
        }
    }

    #[tokio::test]
    async fn bus_notifier_publishes_alert() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let notifier = BusNotifier::new(bus.clone());

        notifier.notify(&alert(AlertKind::Degradation));

        match rx.recv().await.unwrap() {
            AppEvent::HealthAlert(received) => assert_eq!(received.kind, AlertKind::Degradation),
            other => panic!("예상치 못한 이벤트: {other:?}"),
        }
    }

    #[test]
    fn log_notifier_handles_every_kind() {
        for kind in [
            AlertKind::Interruption,
            AlertKind::Degradation,
            AlertKind::Recovery,
        ] {
            LogNotifier.notify(&alert(kind));
        }
    }
}
