//! 원격 방송 서버 통계 포트.
//!
//! 구현: `streamsentinel-network` crate (OBS WebSocket v5 클라이언트)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::metrics::RemoteStats;
use crate::models::obs::{ConnectionState, ObsOutputSettings};

/// 원격 통계 클라이언트.
///
/// 재연결은 하지 않는다. 실패 시 `Disconnected`로 돌아가며
/// 재시도 여부는 호출자(감독 루프)가 결정한다.
#[async_trait]
pub trait RemoteStatsSource: Send + Sync {
    /// 연결 + 인증
    async fn connect(&self) -> Result<(), CoreError>;

    /// 통계 1회 조회
    async fn poll_stats(&self) -> Result<RemoteStats, CoreError>;

    /// 출력 설정 조회 (알 수 없는 항목은 `None`)
    async fn fetch_output_settings(&self) -> Result<ObsOutputSettings, CoreError>;

    /// 연결 종료
    async fn disconnect(&self);

    /// 현재 연결 상태
    fn state(&self) -> ConnectionState;
}
