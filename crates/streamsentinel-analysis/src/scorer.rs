//! 품질 점수 계산.
//!
//! 최근 윈도우(기본 5개 샘플)의 평균을 지표별 구간 선형 함수로 0~100에 정규화한 뒤
//! 네트워크/시스템/OBS 하위 점수를 가중 합산한다.
//!
//! | 지표 | 100 | 구간 1 | 구간 2 | 하한 |
//! |---|---|---|---|---|
//! | RTT ms | ≤20 | 60 @ 80 | 30 @ 150 | 0 @ 300 |
//! | 손실 % | ≤0 | 80 @ 0.5 | 40 @ 2 | 0 @ 5 |
//! | 업로드 여유율 % | ≥50 | 70 @ 20 | 40 @ 0 | 10 (음수 구간) |
//! | 버린 프레임 % | ≤0 | 70 @ 1 | 30 @ 3 | 0 @ 5 |
//! | 인코딩 지연 ms | ≤5 | 70 @ 10 | 30 @ 20 | 0 @ 40 |
//! | 렌더 지연 ms | ≤7 | 70 @ 14 | 30 @ 25 | 0 @ 40 |

use std::borrow::Borrow;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use streamsentinel_core::models::metrics::{MetricKey, MetricSample};
use streamsentinel_core::models::obs::ObsOutputSettings;
use streamsentinel_core::models::score::{Grade, ScoreResult};

use crate::recommendation::recommend;

/// 기본 윈도우 크기
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// 하위 점수 키
pub mod subscore {
    pub const RTT: &str = "rtt_ms";
    pub const LOSS: &str = "loss_pct";
    pub const UPLINK_HEADROOM: &str = "uplink_headroom";
    pub const DROPPED: &str = "dropped_ratio";
    pub const ENCODING_LAG: &str = "encoding_lag_ms";
    pub const RENDER_LAG: &str = "render_lag_ms";
    pub const NETWORK: &str = "network";
    pub const SYSTEM: &str = "system";
    pub const OBS: &str = "obs";
}

// ============================================================
// 정규화 함수
// ============================================================

/// RTT (ms): 20=100, 80=60, 150=30, 300=0
pub fn normalize_rtt(rtt_ms: f64) -> f64 {
    if rtt_ms <= 20.0 {
        100.0
    } else if rtt_ms <= 80.0 {
        100.0 - (rtt_ms - 20.0) * 40.0 / 60.0
    } else if rtt_ms <= 150.0 {
        60.0 - (rtt_ms - 80.0) * 30.0 / 70.0
    } else {
        (30.0 - (rtt_ms - 150.0) * 30.0 / 150.0).max(0.0)
    }
}

/// 패킷 손실 (%): 0=100, 0.5=80, 2=40, 5=0
pub fn normalize_loss(loss_pct: f64) -> f64 {
    if loss_pct <= 0.0 {
        100.0
    } else if loss_pct <= 0.5 {
        100.0 - loss_pct * 40.0 / 0.5
    } else if loss_pct <= 2.0 {
        80.0 - (loss_pct - 0.5) * 40.0 / 1.5
    } else {
        (40.0 - (loss_pct - 2.0) * 40.0 / 3.0).max(0.0)
    }
}

/// 업로드 여유율 (%) `(uplink − target) / target · 100`
pub fn uplink_headroom_pct(uplink_kbps: f64, target_kbps: f64) -> Option<f64> {
    (target_kbps > 0.0).then(|| (uplink_kbps - target_kbps) / target_kbps * 100.0)
}

/// 업로드 여유율: 50%=100, 20%=70, 0%=40, 음수 구간은 10에서 멈춤.
/// 목표 비트레이트가 0 이하면 100.
pub fn normalize_uplink_headroom(uplink_kbps: f64, target_kbps: f64) -> f64 {
    let Some(headroom) = uplink_headroom_pct(uplink_kbps, target_kbps) else {
        return 100.0;
    };
    if headroom >= 50.0 {
        100.0
    } else if headroom >= 20.0 {
        70.0 + (headroom - 20.0) * 30.0 / 30.0
    } else if headroom >= 0.0 {
        40.0 + headroom * 30.0 / 20.0
    } else {
        (40.0 + headroom * 30.0 / 20.0).max(10.0)
    }
}

/// 버린 프레임 비율 (0.0 ~ 1.0): 0%=100, 1%=70, 3%=30, 5%=0
pub fn normalize_dropped_ratio(dropped_ratio: f64) -> f64 {
    let pct = dropped_ratio * 100.0;
    if pct <= 0.0 {
        100.0
    } else if pct <= 1.0 {
        100.0 - pct * 30.0
    } else if pct <= 3.0 {
        70.0 - (pct - 1.0) * 40.0 / 2.0
    } else {
        (30.0 - (pct - 3.0) * 30.0 / 2.0).max(0.0)
    }
}

/// 인코딩 지연 (ms): 5=100, 10=70, 20=30, 40=0
pub fn normalize_encoding_lag(lag_ms: f64) -> f64 {
    if lag_ms <= 5.0 {
        100.0
    } else if lag_ms <= 10.0 {
        100.0 - (lag_ms - 5.0) * 30.0 / 5.0
    } else if lag_ms <= 20.0 {
        70.0 - (lag_ms - 10.0) * 40.0 / 10.0
    } else {
        (30.0 - (lag_ms - 20.0) * 30.0 / 20.0).max(0.0)
    }
}

/// 렌더 지연 (ms): 7=100, 14=70, 25=30, 40=0
pub fn normalize_render_lag(lag_ms: f64) -> f64 {
    if lag_ms <= 7.0 {
        100.0
    } else if lag_ms <= 14.0 {
        100.0 - (lag_ms - 7.0) * 30.0 / 7.0
    } else if lag_ms <= 25.0 {
        70.0 - (lag_ms - 14.0) * 40.0 / 11.0
    } else {
        (30.0 - (lag_ms - 25.0) * 30.0 / 15.0).max(0.0)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 윈도우 평균 샘플. 알려진 키만 평균하며 타임스탬프는 마지막 샘플 기준.
pub fn window_average<S: Borrow<MetricSample>>(window: &[S]) -> Option<MetricSample> {
    let last = window.last()?.borrow();
    let n = window.len() as f64;
    let mut avg = MetricSample::new(last.timestamp);
    for key in MetricKey::ALL {
        let sum: f64 = window.iter().map(|s| s.borrow().get(key)).sum();
        avg.set(key, sum / n);
    }
    Some(avg)
}

// ============================================================
// QualityScorer
// ============================================================

/// 품질 점수 계산기 (순수 함수)
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    window_size: usize,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl QualityScorer {
    /// 최근 `window_size`개 샘플을 보는 계산기 (최소 1)
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }

    /// 윈도우 크기
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// 점수 계산. 빈 윈도우면 데이터 없음 결과.
    pub fn compute<S: Borrow<MetricSample>>(&self, window: &[S], target_kbps: f64) -> ScoreResult {
        self.compute_with_settings(window, target_kbps, None)
    }

    /// 출력 설정을 고려한 점수 계산 (권장 문구에만 영향)
    pub fn compute_with_settings<S: Borrow<MetricSample>>(
        &self,
        window: &[S],
        target_kbps: f64,
        settings: Option<&ObsOutputSettings>,
    ) -> ScoreResult {
        let start = window.len().saturating_sub(self.window_size);
        let Some(avg) = window_average(&window[start..]) else {
            return ScoreResult::no_data();
        };

        let rtt = normalize_rtt(avg.rtt_ms);
        let loss = normalize_loss(avg.loss_pct);
        let headroom = normalize_uplink_headroom(avg.uplink_kbps, target_kbps);
        let dropped = normalize_dropped_ratio(avg.dropped_ratio);
        let encoding = normalize_encoding_lag(avg.encoding_lag_ms);
        let render = normalize_render_lag(avg.render_lag_ms);
        let cpu = avg.cpu_pct.clamp(0.0, 100.0);
        let gpu = avg.gpu_pct.clamp(0.0, 100.0);

        let network = 0.5 * rtt + 0.3 * loss + 0.2 * headroom;
        let system = 0.6 * (100.0 - cpu) + 0.4 * (100.0 - gpu);
        let obs = 0.5 * dropped + 0.25 * encoding + 0.25 * render;
        let score = round1(0.4 * network + 0.3 * system + 0.3 * obs).clamp(0.0, 100.0);

        let mut reasons = Vec::new();
        if rtt < 60.0 {
            reasons.push(format!(
                "{} 높음 ({:.1}ms)",
                MetricKey::RttMs.display_name(),
                avg.rtt_ms
            ));
        }
        if loss < 60.0 {
            reasons.push(format!(
                "{} 높음 ({:.2}%)",
                MetricKey::LossPct.display_name(),
                avg.loss_pct
            ));
        }
        if headroom < 60.0 {
            let pct = uplink_headroom_pct(avg.uplink_kbps, target_kbps)
                .unwrap_or(0.0)
                .max(0.0);
            reasons.push(format!("업로드 대역폭 부족 (여유율 {pct:.1}%)"));
        }
        if dropped < 60.0 {
            reasons.push(format!(
                "{} 높음 ({:.1}%)",
                MetricKey::DroppedRatio.display_name(),
                avg.dropped_ratio * 100.0
            ));
        }
        if encoding < 60.0 {
            reasons.push(format!(
                "{} 높음 ({:.1}ms)",
                MetricKey::EncodingLagMs.display_name(),
                avg.encoding_lag_ms
            ));
        }
        if render < 60.0 {
            reasons.push(format!(
                "{} 높음 ({:.1}ms)",
                MetricKey::RenderLagMs.display_name(),
                avg.render_lag_ms
            ));
        }
        if system < 60.0 {
            reasons.push(format!("시스템 부하 높음 (CPU {cpu:.0}%, GPU {gpu:.0}%)"));
        }

        let subscores = BTreeMap::from([
            (subscore::RTT.to_string(), rtt),
            (subscore::LOSS.to_string(), loss),
            (subscore::UPLINK_HEADROOM.to_string(), headroom),
            (subscore::DROPPED.to_string(), dropped),
            (subscore::ENCODING_LAG.to_string(), encoding),
            (subscore::RENDER_LAG.to_string(), render),
            (subscore::NETWORK.to_string(), network),
            (subscore::SYSTEM.to_string(), system),
            (subscore::OBS.to_string(), obs),
        ]);

        ScoreResult {
            score,
            grade: Grade::from_score(score),
            action: recommend(&avg, score, target_kbps, settings),
            reasons,
            subscores,
        }
    }
}

// ============================================================
// ScoringWindow
// ============================================================

/// 점수 계산용 최근 샘플 윈도우 (단일 writer)
#[derive(Debug, Clone)]
pub struct ScoringWindow {
    capacity: usize,
    samples: VecDeque<Arc<MetricSample>>,
}

impl ScoringWindow {
    /// `capacity`개를 보관하는 윈도우 (최소 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// 샘플 추가 (가장 오래된 샘플 밀어냄)
    pub fn push(&mut self, sample: Arc<MetricSample>) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// 복사본 (읽기 측은 이 스냅샷으로 계산)
    pub fn snapshot(&self) -> Vec<Arc<MetricSample>> {
        self.samples.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn good_sample(ts: f64) -> MetricSample {
        MetricSample {
            timestamp: ts,
            rtt_ms: 15.0,
            uplink_kbps: 10_000.0,
            encoding_lag_ms: 2.0,
            render_lag_ms: 3.0,
            ..Default::default()
        }
    }

    #[test]
    fn rtt_breakpoints() {
        assert_eq!(normalize_rtt(0.0), 100.0);
        assert_eq!(normalize_rtt(20.0), 100.0);
        assert!(approx(normalize_rtt(80.0), 60.0));
        assert!(approx(normalize_rtt(150.0), 30.0));
        assert!(approx(normalize_rtt(300.0), 0.0));
        assert_eq!(normalize_rtt(1000.0), 0.0);
    }

    #[test]
    fn loss_breakpoints() {
        assert_eq!(normalize_loss(0.0), 100.0);
        assert!(approx(normalize_loss(0.5), 80.0));
        assert!(approx(normalize_loss(2.0), 40.0));
        assert!(approx(normalize_loss(5.0), 0.0));
        assert_eq!(normalize_loss(50.0), 0.0);
    }

    #[test]
    fn headroom_breakpoints() {
        let target = 6000.0;
        assert_eq!(normalize_uplink_headroom(9000.0, target), 100.0);
        assert!(approx(normalize_uplink_headroom(7200.0, target), 70.0));
        assert!(approx(normalize_uplink_headroom(6000.0, target), 40.0));
        assert!(approx(normalize_uplink_headroom(4800.0, target), 10.0));
        assert_eq!(normalize_uplink_headroom(0.0, target), 10.0);
    }

    #[test]
    fn headroom_without_target_is_perfect() {
        assert_eq!(normalize_uplink_headroom(0.0, 0.0), 100.0);
        assert_eq!(normalize_uplink_headroom(100.0, -5.0), 100.0);
        assert_eq!(uplink_headroom_pct(100.0, 0.0), None);
    }

    #[test]
    fn dropped_breakpoints() {
        assert_eq!(normalize_dropped_ratio(0.0), 100.0);
        assert!(approx(normalize_dropped_ratio(0.01), 70.0));
        assert!(approx(normalize_dropped_ratio(0.03), 30.0));
        assert!(approx(normalize_dropped_ratio(0.05), 0.0));
    }

    #[test]
    fn lag_breakpoints() {
        assert_eq!(normalize_encoding_lag(5.0), 100.0);
        assert!(approx(normalize_encoding_lag(10.0), 70.0));
        assert!(approx(normalize_encoding_lag(20.0), 30.0));
        assert!(approx(normalize_encoding_lag(40.0), 0.0));

        assert_eq!(normalize_render_lag(7.0), 100.0);
        assert!(approx(normalize_render_lag(14.0), 70.0));
        assert!(approx(normalize_render_lag(25.0), 30.0));
        assert!(approx(normalize_render_lag(40.0), 0.0));
    }

    #[test]
    fn normalizations_are_monotonic() {
        let fns: [(&str, fn(f64) -> f64, f64); 6] = [
            ("rtt", normalize_rtt, 400.0),
            ("loss", normalize_loss, 8.0),
            ("dropped", normalize_dropped_ratio, 0.08),
            ("enc", normalize_encoding_lag, 60.0),
            ("render", normalize_render_lag, 60.0),
            ("headroom", |u| normalize_uplink_headroom(12_000.0 - u, 6000.0), 12_000.0),
        ];
        for (name, f, max) in fns {
            let mut prev = f(0.0);
            for i in 1..=1000 {
                let x = max * i as f64 / 1000.0;
                let y = f(x);
                assert!(y <= prev + 1e-9, "{name} increased at {x}: {prev} -> {y}");
                assert!((0.0..=100.0).contains(&y), "{name} out of range at {x}");
                prev = y;
            }
        }
    }

    #[test]
    fn empty_window_gives_no_data() {
        let scorer = QualityScorer::default();
        let window: Vec<MetricSample> = Vec::new();
        let result = scorer.compute(&window, 6000.0);
        assert_eq!(result, ScoreResult::no_data());
    }

    #[test]
    fn perfect_window_scores_full() {
        let scorer = QualityScorer::default();
        let window: Vec<MetricSample> = (0..5).map(|i| good_sample(i as f64)).collect();
        let result = scorer.compute(&window, 6000.0);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.grade, Grade::Good);
        assert_eq!(result.action, "현재 설정이 최적입니다.");
        assert!(result.reasons.is_empty());
        assert_eq!(result.subscores[subscore::NETWORK], 100.0);
    }

    #[test]
    fn composite_weights() {
        // rtt 80 → 60, loss 0.5 → 80, headroom 0% → 40
        // network = 30 + 24 + 8 = 62
        // system: cpu 50, gpu 25 → 30 + 30 = 60
        // obs: dropped 1% → 70, enc 10 → 70, render 14 → 70 → 70
        // final = 24.8 + 18 + 21 = 63.8
        let sample = MetricSample {
            timestamp: 1.0,
            rtt_ms: 80.0,
            loss_pct: 0.5,
            uplink_kbps: 6000.0,
            cpu_pct: 50.0,
            gpu_pct: 25.0,
            dropped_ratio: 0.01,
            encoding_lag_ms: 10.0,
            render_lag_ms: 14.0,
            ..Default::default()
        };
        let result = QualityScorer::default().compute(&[sample], 6000.0);
        assert!(approx(result.subscores[subscore::NETWORK], 62.0));
        assert!(approx(result.subscores[subscore::SYSTEM], 60.0));
        assert!(approx(result.subscores[subscore::OBS], 70.0));
        assert_eq!(result.score, 63.8);
        assert_eq!(result.grade, Grade::Warning);
        assert_eq!(result.reasons, vec!["업로드 대역폭 부족 (여유율 0.0%)".to_string()]);
    }

    #[test]
    fn cpu_and_gpu_are_clamped() {
        let sample = MetricSample {
            cpu_pct: 150.0,
            gpu_pct: -20.0,
            ..good_sample(1.0)
        };
        let result = QualityScorer::default().compute(&[sample], 6000.0);
        // system = 0.6·0 + 0.4·100 = 40
        assert!(approx(result.subscores[subscore::SYSTEM], 40.0));
        assert!(result.reasons.iter().any(|r| r.starts_with("시스템 부하")));
    }

    #[test]
    fn only_last_window_size_samples_count() {
        let mut window: Vec<MetricSample> = (0..10)
            .map(|i| MetricSample {
                rtt_ms: 300.0,
                ..good_sample(i as f64)
            })
            .collect();
        for (i, s) in window.iter_mut().enumerate().skip(5) {
            *s = good_sample(i as f64);
        }
        let result = QualityScorer::new(5).compute(&window, 6000.0);
        assert_eq!(result.score, 100.0);

        let result = QualityScorer::new(10).compute(&window, 6000.0);
        assert!(result.score < 100.0);
    }

    #[test]
    fn compute_is_deterministic() {
        let window: Vec<Arc<MetricSample>> = (0..5)
            .map(|i| {
                Arc::new(MetricSample {
                    rtt_ms: 40.0 + i as f64 * 30.0,
                    loss_pct: 1.0,
                    uplink_kbps: 7000.0,
                    cpu_pct: 70.0,
                    dropped_ratio: 0.02,
                    ..good_sample(i as f64)
                })
            })
            .collect();
        let scorer = QualityScorer::default();
        assert_eq!(scorer.compute(&window, 6000.0), scorer.compute(&window, 6000.0));
    }

    #[test]
    fn window_average_uses_known_keys() {
        let a = MetricSample {
            rtt_ms: 10.0,
            fps: 60.0,
            ..MetricSample::new(1.0)
        };
        let b = MetricSample {
            rtt_ms: 30.0,
            fps: 30.0,
            ..MetricSample::new(2.0)
        };
        let avg = window_average(&[a, b]).unwrap();
        assert_eq!(avg.timestamp, 2.0);
        assert_eq!(avg.rtt_ms, 20.0);
        assert_eq!(avg.fps, 45.0);
        assert!(avg.extra.is_empty());
    }

    #[test]
    fn scoring_window_evicts_oldest() {
        let mut window = ScoringWindow::new(2);
        assert!(window.is_empty());
        for i in 0..3 {
            window.push(Arc::new(MetricSample::new(i as f64)));
        }
        let snapshot = window.snapshot();
        assert_eq!(window.len(), 2);
        assert_eq!(snapshot[0].timestamp, 1.0);
        assert_eq!(snapshot[1].timestamp, 2.0);
    }
}
