//! StreamSentinel 도메인 모델.
//!
//! 수집기, 분석 엔진, 앱 레이어가 공유하는 데이터 구조체를 정의한다.
//! 모든 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod health;
pub mod metrics;
pub mod obs;
pub mod score;
