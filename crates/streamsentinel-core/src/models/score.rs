//! 품질 점수 모델.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 품질 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// 85점 이상
    Good,
    /// 60점 이상
    Warning,
    /// 60점 미만
    Unstable,
}

impl Grade {
    /// 점수 → 등급
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Grade::Good
        } else if score >= 60.0 {
            Grade::Warning
        } else {
            Grade::Unstable
        }
    }

    /// 사용자 표시 라벨
    pub fn label(self) -> &'static str {
        match self {
            Grade::Good => "양호",
            Grade::Warning => "주의",
            Grade::Unstable => "불안정",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Grade::Good => "Good",
            Grade::Warning => "Warning",
            Grade::Unstable => "Unstable",
        };
        f.write_str(name)
    }
}

/// 점수 계산 결과: 요청 시마다 현재 윈도우에서 다시 계산되며 저장하지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 종합 점수 (0 ~ 100, 소수점 1자리)
    pub score: f64,
    /// 등급
    pub grade: Grade,
    /// 권장 조치 문구
    pub action: String,
    /// 60점 미만 하위 점수별 사유
    pub reasons: Vec<String>,
    /// 하위 점수 (`network`, `system`, `obs`, 개별 정규화 값)
    pub subscores: BTreeMap<String, f64>,
}

impl ScoreResult {
    /// 데이터가 없을 때의 기본 결과
    pub fn no_data() -> Self {
        Self {
            score: 0.0,
            grade: Grade::Unstable,
            action: "백엔드 연결을 확인하세요.".to_string(),
            reasons: vec!["데이터 없음".to_string()],
            subscores: BTreeMap::new(),
        }
    }

    /// 데이터 없음 결과 여부
    pub fn is_no_data(&self) -> bool {
        self.subscores.is_empty()
    }
}
