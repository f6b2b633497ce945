//! OBS 클라이언트 에러 타입.
//!
//! 전송/인증/프로토콜 에러를 구분해 호출자가 비밀번호 재입력 유도와
//! 재연결 백오프를 다르게 처리할 수 있게 한다.

use streamsentinel_core::error::CoreError;
use thiserror::Error;

/// 인증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// 서버가 인증을 요구하지만 비밀번호가 설정되지 않음
    #[error("서버가 비밀번호를 요구하지만 설정되지 않았습니다")]
    PasswordRequired,
    /// 서버가 자격증명을 거부함
    #[error("서버가 인증을 거부했습니다: {0}")]
    Rejected(String),
}

/// OBS 클라이언트 에러
#[derive(Debug, Error)]
pub enum ObsError {
    /// 소켓 연결 실패, 전송 실패, 연결 종료
    #[error("전송 에러: {0}")]
    Transport(String),

    /// 연결/요청 타임아웃
    #[error("{operation} 타임아웃 ({timeout_ms}ms)")]
    Timeout {
        /// 타임아웃된 단계 또는 요청 타입
        operation: String,
        /// 적용된 타임아웃
        timeout_ms: u64,
    },

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Auth(#[from] AuthFailure),

    /// 잘못된 메시지 또는 에러 응답
    #[error("프로토콜 에러: {0}")]
    Protocol(String),
}

/// 에러 분류 (타임아웃은 전송 에러로 취급)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Auth,
    Protocol,
}

impl ObsError {
    /// 에러 분류
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObsError::Transport(_) | ObsError::Timeout { .. } => ErrorKind::Transport,
            ObsError::Auth(_) => ErrorKind::Auth,
            ObsError::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

impl From<serde_json::Error> for ObsError {
    fn from(e: serde_json::Error) -> Self {
        ObsError::Protocol(format!("JSON 처리 실패: {e}"))
    }
}

impl From<ObsError> for CoreError {
    fn from(e: ObsError) -> Self {
        match e.kind() {
            ErrorKind::Transport => CoreError::Network(e.to_string()),
            ErrorKind::Auth => CoreError::Auth(e.to_string()),
            ErrorKind::Protocol => CoreError::Protocol(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn timeout_is_transport_kind() {
        let err = ObsError::Timeout {
            operation: "GetStats".to_string(),
            timeout_ms: 3000,
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "GetStats 타임아웃 (3000ms)");
    }

    #[test]
    fn converts_into_core_error() {
        let auth: CoreError = ObsError::Auth(AuthFailure::PasswordRequired).into();
        assert_matches!(auth, CoreError::Auth(_));

        let net: CoreError = ObsError::Transport("refused".to_string()).into();
        assert_matches!(net, CoreError::Network(_));

        let proto: CoreError = ObsError::Protocol("bad".to_string()).into();
        assert_matches!(proto, CoreError::Protocol(_));
    }
}
