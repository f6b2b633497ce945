//! 메트릭별 시계열 저장소.
//!
//! 키마다 고정 용량 링 버퍼를 둔다. 삽입 순서 = 도착 순서이며
//! 용량을 넘으면 가장 오래된 값부터 버린다. 내부 잠금은 없다.

use std::collections::{HashMap, VecDeque};
use streamsentinel_core::models::metrics::{unix_now_secs, MetricKey, MetricSample};

/// 기본 용량 (10Hz 기준 60초)
pub const DEFAULT_CAPACITY: usize = 600;

/// 시계열 저장소
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    capacity: usize,
    series: HashMap<String, VecDeque<(f64, f64)>>,
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// `net.rtt_ms` 같은 접두사 키를 저장 키로 변환
fn canonical(key: &str) -> &str {
    MetricKey::from_name(key).map_or(key, |k| k.as_str())
}

impl TimeSeriesStore {
    /// 키당 `capacity`개를 보관하는 저장소 생성 (최소 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    /// 키당 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 값 추가. 용량 초과 시 가장 오래된 값을 버린다.
    pub fn append(&mut self, key: &str, timestamp: f64, value: f64) {
        let capacity = self.capacity;
        let buf = self
            .series
            .entry(canonical(key).to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if buf.len() == capacity {
            buf.pop_front();
        }
        buf.push_back((timestamp, value));
    }

    /// 샘플의 모든 알려진 키와 추가 키를 기록.
    ///
    /// 알려진 키로 해석되는 추가 키는 건너뛴다 (틱당 키별 한 점).
    pub fn append_sample(&mut self, sample: &MetricSample) {
        for (key, value) in sample.known() {
            self.append(key.as_str(), sample.timestamp, value);
        }
        for (key, value) in &sample.extra {
            if MetricKey::from_name(key).is_some() {
                continue;
            }
            self.append(key, sample.timestamp, *value);
        }
    }

    /// 순서가 보존된 복사본. 모르는 키는 빈 벡터.
    pub fn series(&self, key: &str) -> Vec<(f64, f64)> {
        self.series
            .get(canonical(key))
            .map(|buf| buf.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 가장 최근 값
    pub fn latest(&self, key: &str) -> Option<(f64, f64)> {
        self.series.get(canonical(key)).and_then(|buf| buf.back().copied())
    }

    /// 현재 시각 기준 최근 `window_secs`초 평균
    pub fn recent_average(&self, key: &str, window_secs: f64) -> Option<f64> {
        self.recent_average_at(key, window_secs, unix_now_secs())
    }

    /// `now - ts <= window_secs`인 값들의 평균. 해당 값이 없으면 `None`.
    pub fn recent_average_at(&self, key: &str, window_secs: f64, now: f64) -> Option<f64> {
        let buf = self.series.get(canonical(key))?;
        let (sum, count) = buf
            .iter()
            .filter(|(ts, _)| now - ts <= window_secs)
            .fold((0.0, 0usize), |(sum, count), (_, v)| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// 키의 현재 길이
    pub fn len(&self, key: &str) -> usize {
        self.series.get(canonical(key)).map_or(0, VecDeque::len)
    }

    /// 기록된 값이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    /// 기록된 키 목록 (정렬)
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }
}
