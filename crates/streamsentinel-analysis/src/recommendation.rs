//! 권장 조치 문구 생성.

use streamsentinel_core::models::metrics::MetricSample;
use streamsentinel_core::models::obs::ObsOutputSettings;

/// 이 점수 이상이면 조치 없음
pub const OPTIMAL_SCORE: f64 = 85.0;

/// 한 번에 보여주는 최대 조치 수
const MAX_ACTIONS: usize = 2;

pub const OPTIMAL_ACTION: &str = "현재 설정이 최적입니다.";
pub const MONITOR_ACTION: &str = "네트워크 상태를 모니터링하고 필요시 설정을 조정하세요.";

const WIRED_ACTION: &str = "와이파이→유선 전환 권장. 공유기 QoS(업로드 우선순위) 확인.";
const DEFAULT_DROPPED_ACTION: &str = "출력 해상도 1080p60→720p60, 또는 인코더 NVENC로 전환.";
const SCENE_ACTION: &str = "필요 시 필터/소스 수 줄이기. 캡처 소스 동시활성 최소화.";

fn bitrate_action(target_kbps: f64) -> String {
    let current = target_kbps.max(0.0) as i64;
    let reduction = (current as f64 * 0.2) as i64;
    format!(
        "비트레이트를 15~25% 낮추세요(예: {current}→{}kbps).",
        current - reduction
    )
}

/// 버린 프레임 대응. 출력 설정을 알면 실제 값 기준으로 제안한다.
fn dropped_action(settings: Option<&ObsOutputSettings>) -> String {
    let Some(settings) = settings.filter(|s| !s.is_unknown()) else {
        return DEFAULT_DROPPED_ACTION.to_string();
    };

    let resolution = match (settings.output_height, settings.fps_value()) {
        (Some(height), Some(fps)) if height > 720 => {
            Some(format!("출력 해상도 {height}p{fps:.0}→720p{fps:.0}"))
        }
        _ => None,
    };
    let encoder = if settings.uses_hardware_encoder() {
        "NVENC 프리셋을 성능 우선(P1~P3)으로 변경"
    } else {
        "인코더 NVENC로 전환"
    };

    match resolution {
        Some(resolution) => format!("{resolution}, 또는 {encoder}."),
        None => format!("{encoder}."),
    }
}

fn cpu_action(settings: Option<&ObsOutputSettings>) -> &'static str {
    if settings.is_some_and(ObsOutputSettings::uses_hardware_encoder) {
        "CPU 부하 높음. 백그라운드 프로그램 정리 권장."
    } else {
        "CPU 부하 높음. x264 프리셋을 ultrafast로 낮추거나 하드웨어 인코더 사용."
    }
}

const GPU_ACTION: &str = "GPU 부하 높음. NVENC 프리셋을 성능 우선으로 변경.";

/// 윈도우 평균과 점수로 권장 조치 문구 생성.
///
/// 해당 조치가 여러 개면 앞의 두 개만 공백으로 이어 붙인다.
pub fn recommend(
    avg: &MetricSample,
    score: f64,
    target_kbps: f64,
    settings: Option<&ObsOutputSettings>,
) -> String {
    if score >= OPTIMAL_SCORE {
        return OPTIMAL_ACTION.to_string();
    }

    let mut actions: Vec<String> = Vec::new();
    if avg.loss_pct > 2.0 {
        actions.push(bitrate_action(target_kbps));
    }
    if avg.rtt_ms > 100.0 {
        actions.push(WIRED_ACTION.to_string());
    }
    if avg.dropped_ratio > 0.03 {
        actions.push(dropped_action(settings));
    }
    if avg.encoding_lag_ms > 15.0 || avg.render_lag_ms > 20.0 {
        actions.push(SCENE_ACTION.to_string());
    }
    if avg.cpu_pct > 85.0 {
        actions.push(cpu_action(settings).to_string());
    }
    if avg.gpu_pct > 85.0 {
        actions.push(GPU_ACTION.to_string());
    }

    if actions.is_empty() {
        return MONITOR_ACTION.to_string();
    }
    actions.truncate(MAX_ACTIONS);
    actions.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetricSample {
        MetricSample::new(1.0)
    }

    fn nvenc_1080p60() -> ObsOutputSettings {
        ObsOutputSettings {
            output_width: Some(1920),
            output_height: Some(1080),
            fps_numerator: Some(60),
            fps_denominator: Some(1),
            bitrate_kbps: Some(6000),
            encoder: Some("jim_nvenc".to_string()),
        }
    }

    #[test]
    fn high_score_is_optimal() {
        let avg = MetricSample {
            loss_pct: 10.0,
            ..sample()
        };
        assert_eq!(recommend(&avg, 85.0, 6000.0, None), OPTIMAL_ACTION);
    }

    #[test]
    fn nothing_triggered_means_monitor() {
        assert_eq!(recommend(&sample(), 70.0, 6000.0, None), MONITOR_ACTION);
    }

    #[test]
    fn loss_suggests_bitrate_reduction() {
        let avg = MetricSample {
            loss_pct: 3.0,
            ..sample()
        };
        assert_eq!(
            recommend(&avg, 50.0, 6000.0, None),
            "비트레이트를 15~25% 낮추세요(예: 6000→4800kbps)."
        );
    }

    #[test]
    fn at_most_two_actions_joined() {
        let avg = MetricSample {
            loss_pct: 6.0,
            rtt_ms: 220.0,
            dropped_ratio: 0.1,
            encoding_lag_ms: 30.0,
            ..sample()
        };
        let action = recommend(&avg, 20.0, 6000.0, None);
        assert_eq!(
            action,
            format!("{} {}", bitrate_action(6000.0), WIRED_ACTION)
        );
    }

    #[test]
    fn dropped_frames_default_advice() {
        let avg = MetricSample {
            dropped_ratio: 0.05,
            ..sample()
        };
        assert_eq!(recommend(&avg, 50.0, 6000.0, None), DEFAULT_DROPPED_ACTION);
        assert_eq!(
            recommend(&avg, 50.0, 6000.0, Some(&ObsOutputSettings::unknown())),
            DEFAULT_DROPPED_ACTION
        );
    }

    #[test]
    fn dropped_frames_use_actual_settings() {
        let avg = MetricSample {
            dropped_ratio: 0.05,
            ..sample()
        };
        let settings = nvenc_1080p60();
        assert_eq!(
            recommend(&avg, 50.0, 6000.0, Some(&settings)),
            "출력 해상도 1080p60→720p60, 또는 NVENC 프리셋을 성능 우선(P1~P3)으로 변경."
        );

        let x264_720 = ObsOutputSettings {
            output_width: Some(1280),
            output_height: Some(720),
            encoder: Some("obs_x264".to_string()),
            ..settings
        };
        assert_eq!(
            recommend(&avg, 50.0, 6000.0, Some(&x264_720)),
            "인코더 NVENC로 전환."
        );
    }

    #[test]
    fn system_load_advice() {
        let avg = MetricSample {
            cpu_pct: 95.0,
            gpu_pct: 90.0,
            ..sample()
        };
        let action = recommend(&avg, 40.0, 6000.0, None);
        assert!(action.contains("ultrafast"));
        assert!(action.contains("GPU 부하 높음"));

        let action = recommend(&avg, 40.0, 6000.0, Some(&nvenc_1080p60()));
        assert!(!action.contains("ultrafast"));
    }
}
