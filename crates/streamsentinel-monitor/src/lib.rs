//! # streamsentinel-monitor
//!
//! 로컬 텔레메트리 어댑터.
//!
//! - [`feed`]: 외부 측정 프로세스가 한 줄씩 내보내는 JSON 페이로드 파서
//! - [`system`]: 외부 피드가 없을 때 쓰는 sysinfo 기반 CPU/메모리 수집기

pub mod feed;
pub mod system;
