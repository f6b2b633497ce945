//! 메트릭 모델.
//!
//! 고정된 메트릭 키 공간, 로컬/원격 부분 측정값, 인제스트 틱마다 만들어지는
//! 융합 샘플(`MetricSample`)을 정의한다.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 현재 시각 (Unix epoch 초, 밀리초 정밀도)
pub fn unix_now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// 메트릭 그룹 (키 접두사)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricGroup {
    /// 네트워크 (`net.`)
    Network,
    /// 시스템 (`sys.`)
    System,
    /// 원격 방송 서버 (`obs.`)
    Remote,
}

impl MetricGroup {
    /// 키 접두사
    pub fn prefix(self) -> &'static str {
        match self {
            MetricGroup::Network => "net",
            MetricGroup::System => "sys",
            MetricGroup::Remote => "obs",
        }
    }
}

/// 알려진 메트릭 키
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    RttMs,
    LossPct,
    UplinkKbps,
    CpuPct,
    GpuPct,
    MemMb,
    DroppedRatio,
    EncodingLagMs,
    RenderLagMs,
    Fps,
    BitrateKbps,
}

impl MetricKey {
    /// 전체 키 목록 (그룹 순서)
    pub const ALL: [MetricKey; 11] = [
        MetricKey::RttMs,
        MetricKey::LossPct,
        MetricKey::UplinkKbps,
        MetricKey::CpuPct,
        MetricKey::GpuPct,
        MetricKey::MemMb,
        MetricKey::DroppedRatio,
        MetricKey::EncodingLagMs,
        MetricKey::RenderLagMs,
        MetricKey::Fps,
        MetricKey::BitrateKbps,
    ];

    /// 와이어/시계열 키 이름
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::RttMs => "rtt_ms",
            MetricKey::LossPct => "loss_pct",
            MetricKey::UplinkKbps => "uplink_kbps",
            MetricKey::CpuPct => "cpu_pct",
            MetricKey::GpuPct => "gpu_pct",
            MetricKey::MemMb => "mem_mb",
            MetricKey::DroppedRatio => "dropped_ratio",
            MetricKey::EncodingLagMs => "encoding_lag_ms",
            MetricKey::RenderLagMs => "render_lag_ms",
            MetricKey::Fps => "fps",
            MetricKey::BitrateKbps => "bitrate_kbps",
        }
    }

    /// 이름으로 키 조회. `net.rtt_ms` 같은 그룹 접두사도 허용한다.
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = match name.split_once('.') {
            Some((prefix, rest)) if matches!(prefix, "net" | "sys" | "obs") => rest,
            _ => name,
        };
        Self::ALL.into_iter().find(|k| k.as_str() == bare)
    }

    /// 소속 그룹
    pub fn group(self) -> MetricGroup {
        match self {
            MetricKey::RttMs | MetricKey::LossPct | MetricKey::UplinkKbps => MetricGroup::Network,
            MetricKey::CpuPct | MetricKey::GpuPct | MetricKey::MemMb => MetricGroup::System,
            _ => MetricGroup::Remote,
        }
    }

    /// 일반 사용자용 표시 이름
    pub fn display_name(self) -> &'static str {
        match self {
            MetricKey::RttMs => "서버 응답 속도",
            MetricKey::LossPct => "전송 손실",
            MetricKey::UplinkKbps => "업로드 대역폭",
            MetricKey::CpuPct => "CPU 사용률",
            MetricKey::GpuPct => "GPU 사용률",
            MetricKey::MemMb => "메모리 사용량",
            MetricKey::DroppedRatio => "버린 프레임 비율",
            MetricKey::EncodingLagMs => "인코딩 지연",
            MetricKey::RenderLagMs => "렌더 지연",
            MetricKey::Fps => "프레임레이트",
            MetricKey::BitrateKbps => "송출 비트레이트",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 융합 샘플: 인제스트 틱 하나에 대한 로컬 + 원격 측정값.
///
/// 누락된 필드는 항상 0.0이다. 생성 후에는 `Arc`로 공유되며 변경하지 않는다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// 수집 시각 (Unix epoch 초)
    pub timestamp: f64,
    /// 왕복 지연 (ms)
    #[serde(default)]
    pub rtt_ms: f64,
    /// 패킷 손실률 (%)
    #[serde(default)]
    pub loss_pct: f64,
    /// 업로드 가용 대역폭 (kbps)
    #[serde(default)]
    pub uplink_kbps: f64,
    /// CPU 사용률 (%)
    #[serde(default)]
    pub cpu_pct: f64,
    /// GPU 사용률 (%)
    #[serde(default)]
    pub gpu_pct: f64,
    /// 메모리 사용량 (MB)
    #[serde(default)]
    pub mem_mb: f64,
    /// 버린 프레임 비율 (0.0 ~ 1.0)
    #[serde(default)]
    pub dropped_ratio: f64,
    /// 인코딩 지연 (ms)
    #[serde(default)]
    pub encoding_lag_ms: f64,
    /// 렌더 지연 (ms)
    #[serde(default)]
    pub render_lag_ms: f64,
    /// 출력 프레임레이트
    #[serde(default)]
    pub fps: f64,
    /// 송출 비트레이트 (kbps)
    #[serde(default)]
    pub bitrate_kbps: f64,
    /// 알 수 없는 숫자 키 (보존만 하고 점수/헬스 계산에는 쓰지 않음)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl MetricSample {
    /// 모든 값이 0인 샘플
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// 키 값 조회
    pub fn get(&self, key: MetricKey) -> f64 {
        match key {
            MetricKey::RttMs => self.rtt_ms,
            MetricKey::LossPct => self.loss_pct,
            MetricKey::UplinkKbps => self.uplink_kbps,
            MetricKey::CpuPct => self.cpu_pct,
            MetricKey::GpuPct => self.gpu_pct,
            MetricKey::MemMb => self.mem_mb,
            MetricKey::DroppedRatio => self.dropped_ratio,
            MetricKey::EncodingLagMs => self.encoding_lag_ms,
            MetricKey::RenderLagMs => self.render_lag_ms,
            MetricKey::Fps => self.fps,
            MetricKey::BitrateKbps => self.bitrate_kbps,
        }
    }

    /// 키 값 설정 (샘플 구성 단계에서만 사용)
    pub fn set(&mut self, key: MetricKey, value: f64) {
        let slot = match key {
            MetricKey::RttMs => &mut self.rtt_ms,
            MetricKey::LossPct => &mut self.loss_pct,
            MetricKey::UplinkKbps => &mut self.uplink_kbps,
            MetricKey::CpuPct => &mut self.cpu_pct,
            MetricKey::GpuPct => &mut self.gpu_pct,
            MetricKey::MemMb => &mut self.mem_mb,
            MetricKey::DroppedRatio => &mut self.dropped_ratio,
            MetricKey::EncodingLagMs => &mut self.encoding_lag_ms,
            MetricKey::RenderLagMs => &mut self.render_lag_ms,
            MetricKey::Fps => &mut self.fps,
            MetricKey::BitrateKbps => &mut self.bitrate_kbps,
        };
        *slot = value;
    }

    /// 이름으로 값 조회 (알려진 키 → extra 순)
    pub fn value_of(&self, name: &str) -> Option<f64> {
        match MetricKey::from_name(name) {
            Some(key) => Some(self.get(key)),
            None => self.extra.get(name).copied(),
        }
    }

    /// 알려진 키 전체 (키, 값)
    pub fn known(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        MetricKey::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

/// 로컬 피드의 중첩 `obs` 블록
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalObsMetrics {
    /// 버린 프레임 비율 (0.0 ~ 1.0)
    #[serde(default)]
    pub dropped_ratio: f64,
    /// 인코딩 지연 (ms)
    #[serde(default)]
    pub encoding_lag_ms: f64,
    /// 렌더 지연 (ms)
    #[serde(default)]
    pub render_lag_ms: f64,
}

/// 로컬 텔레메트리 프로세스가 한 틱에 넘기는 측정값
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalTelemetry {
    /// 측정 시각 (Unix epoch 초)
    pub timestamp: f64,
    pub rtt_ms: f64,
    pub loss_pct: f64,
    pub uplink_kbps: f64,
    pub cpu_pct: f64,
    pub gpu_pct: f64,
    pub mem_mb: f64,
    /// 로컬 프로세스가 추정한 OBS 지표 (원격 값이 있으면 덮어씀)
    #[serde(default)]
    pub obs: LocalObsMetrics,
    /// 알 수 없는 숫자 키
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

/// 원격 방송 서버 폴링 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStats {
    /// 수신 시각 (Unix epoch 초)
    pub timestamp: f64,
    /// 버린 프레임 비율 (0.0 ~ 1.0)
    pub dropped_ratio: f64,
    /// 인코딩 지연 (ms)
    pub encoding_lag_ms: f64,
    /// 렌더 지연 (ms)
    pub render_lag_ms: f64,
    /// 출력 프레임레이트
    pub fps: f64,
    /// 송출 비트레이트 (kbps)
    pub bitrate_kbps: f64,
    /// 방송 출력 활성 여부
    pub output_active: bool,
}
