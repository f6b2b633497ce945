//! 애플리케이션 설정 구조체.
//!
//! OBS 연결, 수집 주기, 점수 계산, 헬스 판정, 재연결 정책 등 런타임 설정을 정의한다.
//! `config` crate를 통해 기본값 ← 설정 파일 ← 환경변수 순으로 로드.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::CoreError;

/// 환경변수 접두사 (`STREAMSENTINEL__OBS__PORT=4456`)
pub const ENV_PREFIX: &str = "STREAMSENTINEL";

/// 환경변수 구분자
const ENV_SEPARATOR: &str = "__";

/// 기본 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.toml";

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OBS WebSocket 연결 설정
    #[serde(default)]
    pub obs: ObsConfig,
    /// 로컬 수집 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 품질 점수 설정
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// 헬스 상태 머신 설정
    #[serde(default)]
    pub health: HealthConfig,
    /// 재연결 정책
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

// ============================================================
// OBS 연결 설정
// ============================================================

/// OBS WebSocket 연결 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsConfig {
    /// 호스트
    #[serde(default = "default_obs_host")]
    pub host: String,
    /// 포트
    #[serde(default = "default_obs_port")]
    pub port: u16,
    /// 비밀번호 (서버가 인증을 요구할 때만 사용)
    #[serde(default)]
    pub password: Option<String>,
    /// wss:// 사용 여부
    #[serde(default)]
    pub use_tls: bool,
    /// 연결/요청 타임아웃 (초)
    #[serde(default = "default_obs_timeout_secs")]
    pub timeout_secs: u64,
    /// 통계 폴링 주기 (밀리초)
    #[serde(default = "default_obs_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 스트림 출력 이름 (GetOutputSettings 대상)
    #[serde(default = "default_stream_output_name")]
    pub stream_output_name: String,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
            use_tls: false,
            timeout_secs: default_obs_timeout_secs(),
            poll_interval_ms: default_obs_poll_interval_ms(),
            stream_output_name: default_stream_output_name(),
        }
    }
}

impl ObsConfig {
    /// 접속 URL (`ws://host:port` / `wss://host:port`)
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// 연결/요청 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 앞뒤 공백을 제거한 비밀번호 (공백뿐이면 없음)
    pub fn password(&self) -> Option<&str> {
        self.password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

// ============================================================
// 수집 설정
// ============================================================

/// 로컬 수집 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 인제스트 틱 주기 (밀리초)
    #[serde(default = "default_ingest_interval_ms")]
    pub ingest_interval_ms: u64,
    /// 메트릭별 시계열 용량
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// 상태 리포트 주기 (밀리초)
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ingest_interval_ms: default_ingest_interval_ms(),
            history_capacity: default_history_capacity(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

// ============================================================
// 점수 설정
// ============================================================

/// 품질 점수 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// 목표 송출 비트레이트 (kbps), 업로드 여유율 계산 기준
    #[serde(default = "default_target_bitrate_kbps")]
    pub target_bitrate_kbps: f64,
    /// 점수 윈도우 크기 (샘플 수)
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            target_bitrate_kbps: default_target_bitrate_kbps(),
            window_size: default_window_size(),
        }
    }
}

// ============================================================
// 헬스 설정
// ============================================================

/// 헬스 상태 머신 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Warning/Critical 진입에 필요한 연속 불량 샘플 수
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: u32,
    /// Normal 복귀에 필요한 연속 정상 샘플 수
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,
    /// 요약용 이력 크기
    #[serde(default = "default_health_history_size")]
    pub history_size: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            critical_threshold: default_critical_threshold(),
            recovery_threshold: default_recovery_threshold(),
            history_size: default_health_history_size(),
        }
    }
}

// ============================================================
// 재연결 설정
// ============================================================

/// 재연결 정책 (지수 백오프 + 최소 쿨다운)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// 첫 재시도 대기 (초)
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: f64,
    /// 최대 재시도 대기 (초)
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: f64,
    /// 연결 시도 간 최소 간격 (초)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl ReconnectConfig {
    /// 첫 재시도 대기
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.initial_backoff_secs)
    }

    /// 최대 재시도 대기
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_backoff_secs)
    }

    /// 최소 쿨다운
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }
}

// ============================================================
// AppConfig
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            obs: ObsConfig::default(),
            monitor: MonitorConfig::default(),
            scoring: ScoringConfig::default(),
            health: HealthConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// 설정 로드: 기본값 ← 파일(선택) ← `STREAMSENTINEL__*` 환경변수
    ///
    /// 파일 형식은 확장자(toml/json/yaml)로 판단한다. 파일이 없으면 건너뛴다.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        Self::load_with_env(path, None)
    }

    /// 환경변수 공급원을 지정해 로드 (`None`이면 프로세스 환경변수)
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, CoreError> {
        let defaults = config::Config::try_from(&Self::default_config())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            debug!("설정 파일 적용: {}", path.display());
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 플랫폼별 기본 설정 파일 경로
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "streamsentinel", "streamsentinel")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// 값 검증: 0 주기/용량, 잘못된 백오프 범위 거부
    pub fn validate(&self) -> Result<(), CoreError> {
        fn invalid(field: &str, message: &str) -> CoreError {
            CoreError::Validation {
                field: field.to_string(),
                message: message.to_string(),
            }
        }

        if self.obs.host.trim().is_empty() {
            return Err(invalid("obs.host", "호스트가 비어 있습니다"));
        }
        if self.obs.port == 0 {
            return Err(invalid("obs.port", "포트는 0일 수 없습니다"));
        }
        if self.obs.timeout_secs == 0 {
            return Err(invalid("obs.timeout_secs", "0보다 커야 합니다"));
        }
        if self.obs.poll_interval_ms == 0 {
            return Err(invalid("obs.poll_interval_ms", "0보다 커야 합니다"));
        }
        if self.monitor.ingest_interval_ms == 0 {
            return Err(invalid("monitor.ingest_interval_ms", "0보다 커야 합니다"));
        }
        if self.monitor.report_interval_ms == 0 {
            return Err(invalid("monitor.report_interval_ms", "0보다 커야 합니다"));
        }
        if self.monitor.history_capacity == 0 {
            return Err(invalid("monitor.history_capacity", "0보다 커야 합니다"));
        }
        if self.scoring.window_size == 0 {
            return Err(invalid("scoring.window_size", "0보다 커야 합니다"));
        }
        if !self.scoring.target_bitrate_kbps.is_finite() {
            return Err(invalid("scoring.target_bitrate_kbps", "유한한 값이어야 합니다"));
        }
        if self.health.critical_threshold == 0 || self.health.recovery_threshold == 0 {
            return Err(invalid("health", "임계 샘플 수는 0보다 커야 합니다"));
        }
        if self.health.history_size == 0 {
            return Err(invalid("health.history_size", "0보다 커야 합니다"));
        }
        let r = &self.reconnect;
        if !(r.initial_backoff_secs > 0.0 && r.initial_backoff_secs.is_finite()) {
            return Err(invalid("reconnect.initial_backoff_secs", "0보다 커야 합니다"));
        }
        if !(r.max_backoff_secs.is_finite() && r.max_backoff_secs >= r.initial_backoff_secs) {
            return Err(invalid(
                "reconnect.max_backoff_secs",
                "initial_backoff_secs 이상이어야 합니다",
            ));
        }
        if !(r.cooldown_secs >= 0.0 && r.cooldown_secs.is_finite()) {
            return Err(invalid("reconnect.cooldown_secs", "음수일 수 없습니다"));
        }
        Ok(())
    }

    /// 인제스트 틱 주기를 Duration으로 반환
    pub fn ingest_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.ingest_interval_ms)
    }

    /// 상태 리포트 주기를 Duration으로 반환
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.report_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_obs_host() -> String {
    "127.0.0.1".to_string()
}
fn default_obs_port() -> u16 {
    4455
}
fn default_obs_timeout_secs() -> u64 {
    3
}
fn default_obs_poll_interval_ms() -> u64 {
    1_000
}
fn default_stream_output_name() -> String {
    "adv_stream".to_string()
}
fn default_ingest_interval_ms() -> u64 {
    1_000
}
fn default_history_capacity() -> usize {
    600
}
fn default_report_interval_ms() -> u64 {
    5_000
}
fn default_target_bitrate_kbps() -> f64 {
    6_000.0
}
fn default_window_size() -> usize {
    5
}
fn default_critical_threshold() -> u32 {
    5
}
fn default_recovery_threshold() -> u32 {
    10
}
fn default_health_history_size() -> usize {
    30
}
fn default_initial_backoff_secs() -> f64 {
    1.0
}
fn default_max_backoff_secs() -> f64 {
    30.0
}
fn default_cooldown_secs() -> f64 {
    1.2
}
