//! # streamsentinel-analysis
//!
//! 스트리밍 메트릭 분석 엔진.
//!
//! ## 구조
//!
//! - [`time_series`]: 메트릭별 고정 용량 링 버퍼
//! - [`scorer`]: 최근 윈도우 기반 0~100 품질 점수
//! - [`recommendation`]: 점수에 따른 권장 조치 문구
//! - [`health`]: 디바운스된 Normal/Warning/Critical 상태 머신
//! - [`gateway`]: 로컬/원격 측정값 융합
//! - [`engine`]: 위 구성요소를 묶는 단일 writer / 다중 reader 엔진

pub mod engine;
pub mod gateway;
pub mod health;
pub mod recommendation;
pub mod scorer;
pub mod time_series;
