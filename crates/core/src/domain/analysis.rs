use serde::{Deserialize, Serialize};

use super::input::DocumentInput;

/// multipart フィールド名
pub const FILE_FIELD: &str = "file";
pub const TEXT_FIELD: &str = "text";

/// 解析サービスへの送信リクエスト（1回の転送で file か text のどちらか一方）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub document: DocumentInput,
}

impl AnalysisRequest {
    pub fn new(document: DocumentInput) -> Self {
        Self { document }
    }

    pub fn field_name(&self) -> &'static str {
        match self.document {
            DocumentInput::File(_) => FILE_FIELD,
            DocumentInput::Text { .. } => TEXT_FIELD,
        }
    }
}

/// 解析結果のサマリー。パーセンテージはサーバー算出値をそのまま信頼する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_clauses: u32,
    pub unfair_count: u32,
    pub unfair_percentage: f64,
    pub potentially_unfair_count: u32,
    pub potentially_unfair_percentage: f64,
}

const PERCENT_TOLERANCE: f64 = 0.01;

impl AnalysisSummary {
    /// 件数とパーセンテージの整合性チェック。結果は警告のみで表示は止めない。
    pub fn consistency_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let flagged = u64::from(self.unfair_count) + u64::from(self.potentially_unfair_count);
        if flagged > u64::from(self.total_clauses) {
            warnings.push(format!(
                "unfair ({}) + potentially unfair ({}) exceeds total clauses ({})",
                self.unfair_count, self.potentially_unfair_count, self.total_clauses
            ));
        }

        let mut check = |name: &str, count: u32, reported: f64| {
            let expected = if self.total_clauses == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(self.total_clauses) * 100.0
            };
            if (expected - reported).abs() > PERCENT_TOLERANCE {
                warnings.push(format!(
                    "{name} percentage {reported:.2} does not match {count}/{} ({expected:.2})",
                    self.total_clauses
                ));
            }
        };
        check("unfair", self.unfair_count, self.unfair_percentage);
        check(
            "potentially unfair",
            self.potentially_unfair_count,
            self.potentially_unfair_percentage,
        );

        warnings
    }
}

/// 条項ごとの分類結果。label はワイヤ上の値をそのまま保持する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseFinding {
    pub clause: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

/// 解析結果（受信後は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    pub results: Vec<ClauseFinding>,
}

/// 深刻度ティア（閉じた列挙。未知のラベルは表示時にエラー）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    ClearlyUnfair,
    PotentiallyUnfair,
    Fair,
}

impl SeverityTier {
    /// 分類サービスは公正な条項を "clearly_fair" と返すため別名として受け付ける
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "clearly_unfair" => Some(Self::ClearlyUnfair),
            "potentially_unfair" => Some(Self::PotentiallyUnfair),
            "fair" | "clearly_fair" => Some(Self::Fair),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClearlyUnfair => "clearly_unfair",
            Self::PotentiallyUnfair => "potentially_unfair",
            Self::Fair => "fair",
        }
    }
}
