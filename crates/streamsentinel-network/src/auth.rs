//! OBS WebSocket 챌린지-응답 인증.
//!
//! `secret = base64(sha256(password || base64decode(salt)))`
//! `authResponse = base64(sha256(secret || base64decode(challenge)))`

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::ObsError;

/// 서버가 보낸 salt/challenge와 비밀번호로 인증 응답 문자열을 계산한다.
pub fn compute_auth_response(
    password: &str,
    salt: &str,
    challenge: &str,
) -> Result<String, ObsError> {
    let salt_bytes = decode_field("salt", salt)?;
    let challenge_bytes = decode_field("challenge", challenge)?;

    let secret = digest_base64(password.as_bytes(), &salt_bytes);
    Ok(digest_base64(secret.as_bytes(), &challenge_bytes))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, ObsError> {
    STANDARD
        .decode(value)
        .map_err(|e| ObsError::Protocol(format!("{name} base64 디코딩 실패: {e}")))
}

fn digest_base64(head: &[u8], tail: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(head);
    hasher.update(tail);
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn fixed_vector() {
        // salt = base64("abc"), challenge = base64("xyz")
        let response = compute_auth_response("test", "YWJj", "eHl6").unwrap();
        assert_eq!(response, "XzVTDGxybk62yT2nta84ZWJc/aa5etTLGKhOD0dEwYY=");
    }

    #[test]
    fn intermediate_secret() {
        assert_eq!(
            digest_base64(b"test", b"abc"),
            "5oHc/6SClk3bqvW8Wq+qPwVcxetcil04ms4MqGWcdm8="
        );
    }

    #[test]
    fn realistic_salt_and_challenge() {
        let response = compute_auth_response(
            "supersecret",
            "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=",
            "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
        )
        .unwrap();
        assert_eq!(response, "NcEmZ3wexbnVHNfU3gNWbqe33at7yx3KJ4Cj3Knb1lo=");
    }

    #[test]
    fn different_password_changes_response() {
        let a = compute_auth_response("test", "YWJj", "eHl6").unwrap();
        let b = compute_auth_response("test2", "YWJj", "eHl6").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_salt_is_protocol_error() {
        assert_matches!(
            compute_auth_response("test", "not base64!", "eHl6"),
            Err(ObsError::Protocol(_))
        );
    }
}
