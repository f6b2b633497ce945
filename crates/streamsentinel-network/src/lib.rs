//! # streamsentinel-network
//!
//! OBS Studio WebSocket v5 프로토콜 어댑터.
//! 연결 수립, salt/challenge 기반 인증, `requestId` 상관 요청/응답,
//! 주기적 통계 폴링을 담당한다. 재연결 정책은 포함하지 않는다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use streamsentinel_network::obs_client::ObsClient;
//!
//! let client = ObsClient::new(config.obs.clone());
//! client.connect().await?;
//! let stats = client.poll_stats().await?;
//! ```

pub mod auth;
pub mod error;
pub mod obs_client;
pub mod poller;
pub mod protocol;
pub mod ws_client;
