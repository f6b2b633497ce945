//! 시스템 리소스 수집.
//!
//! `LocalTelemetrySource` 포트 구현. 외부 측정 피드가 없을 때
//! sysinfo로 CPU/메모리만 채우고 네트워크/GPU 값은 0으로 둔다.

use async_trait::async_trait;
use parking_lot::Mutex;
use streamsentinel_core::error::CoreError;
use streamsentinel_core::models::metrics::{unix_now_secs, LocalTelemetry};
use streamsentinel_core::ports::telemetry::LocalTelemetrySource;
use sysinfo::System;
use tracing::debug;

const BYTES_PER_MB: f64 = 1_048_576.0;

/// sysinfo 기반 로컬 수집기: `LocalTelemetrySource` 포트 구현
pub struct SysInfoMonitor {
    sys: Mutex<System>,
}

impl SysInfoMonitor {
    /// 새 수집기 생성
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU 사용률은 두 번째 갱신부터 의미가 있으므로 미리 한 번 갱신
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SysInfoMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalTelemetrySource for SysInfoMonitor {
    async fn collect(&self) -> Result<LocalTelemetry, CoreError> {
        let mut sys = self.sys.lock();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_pct = f64::from(sys.global_cpu_usage()).clamp(0.0, 100.0);
        let mem_mb = sys.used_memory() as f64 / BYTES_PER_MB;

        debug!("로컬 시스템: CPU {cpu_pct:.1}%, 메모리 {mem_mb:.0}MB");

        Ok(LocalTelemetry {
            timestamp: unix_now_secs(),
            cpu_pct,
            mem_mb,
            ..Default::default()
        })
    }
}
