//! 로컬 텔레메트리 포트.
//!
//! 구현: `streamsentinel-monitor` crate (외부 피드 파서, sysinfo 대체 소스)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metrics::LocalTelemetry;

/// 로컬 네트워크/시스템 측정값 공급원
#[async_trait]
pub trait LocalTelemetrySource: Send + Sync {
    /// 현재 측정값 수집
    async fn collect(&self) -> Result<LocalTelemetry, CoreError>;
}
