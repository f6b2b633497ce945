//! 헬스 알림 포트.
//!
//! 구현: `streamsentinel-app` crate (로그 출력, 이벤트 버스 전달)

use crate::models::health::HealthAlert;

/// 헬스 알림 수신자.
///
/// 상태 머신은 전이 시점에 동기적으로 호출하며 결과를 기다리지 않는다.
/// 구현체는 블로킹 작업을 하면 안 된다.
pub trait HealthNotifier: Send + Sync {
    /// 알림 전달
    fn notify(&self, alert: &HealthAlert);
}
