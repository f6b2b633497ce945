//! 원격 방송 서버(OBS) 관련 모델.

use serde::{Deserialize, Serialize};
use std::fmt;

const UNKNOWN: &str = "Unknown";

/// 원격 서버 연결 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Polling,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Authenticating => "Authenticating",
            ConnectionState::Polling => "Polling",
        };
        f.write_str(name)
    }
}

/// 출력 설정: 조회 실패한 항목은 `None`이며 표시 시 "Unknown"이 된다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsOutputSettings {
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    pub fps_numerator: Option<u32>,
    pub fps_denominator: Option<u32>,
    /// 송출 비트레이트 (kbps)
    pub bitrate_kbps: Option<u32>,
    /// 인코더 식별자 (예: `obs_x264`, `jim_nvenc`)
    pub encoder: Option<String>,
}

impl ObsOutputSettings {
    /// 아무것도 알 수 없는 설정
    pub fn unknown() -> Self {
        Self::default()
    }

    /// 해상도 문자열 (`1920x1080`)
    pub fn resolution(&self) -> String {
        match (self.output_width, self.output_height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            _ => UNKNOWN.to_string(),
        }
    }

    /// 프레임레이트 값
    pub fn fps_value(&self) -> Option<f64> {
        match (self.fps_numerator, self.fps_denominator) {
            (Some(num), Some(den)) if den > 0 => Some(f64::from(num) / f64::from(den)),
            _ => None,
        }
    }

    /// 프레임레이트 문자열 (`60`, `29.97`)
    pub fn fps(&self) -> String {
        match self.fps_value() {
            Some(fps) if fps.fract() == 0.0 => format!("{fps:.0}"),
            Some(fps) => format!("{fps:.2}"),
            None => UNKNOWN.to_string(),
        }
    }

    /// 비트레이트 문자열 (`6000 kbps`)
    pub fn bitrate(&self) -> String {
        self.bitrate_kbps
            .map(|b| format!("{b} kbps"))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// 인코더 문자열
    pub fn encoder_name(&self) -> &str {
        self.encoder.as_deref().unwrap_or(UNKNOWN)
    }

    /// 하드웨어(NVENC) 인코더 사용 여부
    pub fn uses_hardware_encoder(&self) -> bool {
        self.encoder
            .as_deref()
            .map(|e| e.to_ascii_lowercase().contains("nvenc"))
            .unwrap_or(false)
    }

    /// 모든 항목이 알려져 있지 않은지 여부
    pub fn is_unknown(&self) -> bool {
        self == &Self::default()
    }
}

impl fmt::Display for ObsOutputSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}fps, {}, {}",
            self.resolution(),
            self.fps(),
            self.bitrate(),
            self.encoder_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_placeholders() {
        let settings = ObsOutputSettings::unknown();
        assert!(settings.is_unknown());
        assert_eq!(settings.resolution(), "Unknown");
        assert_eq!(settings.fps(), "Unknown");
        assert_eq!(settings.bitrate(), "Unknown");
        assert_eq!(settings.encoder_name(), "Unknown");
        assert!(!settings.uses_hardware_encoder());
    }

    #[test]
    fn known_settings_render() {
        let settings = ObsOutputSettings {
            output_width: Some(1920),
            output_height: Some(1080),
            fps_numerator: Some(60),
            fps_denominator: Some(1),
            bitrate_kbps: Some(6000),
            encoder: Some("jim_nvenc".to_string()),
        };
        assert_eq!(settings.to_string(), "1920x1080 @ 60fps, 6000 kbps, jim_nvenc");
        assert!(settings.uses_hardware_encoder());
    }

    #[test]
    fn fractional_fps() {
        let settings = ObsOutputSettings {
            fps_numerator: Some(30000),
            fps_denominator: Some(1001),
            ..Default::default()
        };
        assert_eq!(settings.fps(), "29.97");
    }

    #[test]
    fn zero_denominator_is_unknown() {
        let settings = ObsOutputSettings {
            fps_numerator: Some(60),
            fps_denominator: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.fps(), "Unknown");
    }
}
