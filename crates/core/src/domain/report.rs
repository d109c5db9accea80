//! 解析結果の表示モデル。推奨判定と条項ごとのスタイルを決める純粋関数群。

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::analysis::{AnalysisResult, AnalysisSummary, SeverityTier};
use super::error::AppError;

const REJECT_UNFAIR_PERCENT: f64 = 10.0;
const CAUTION_POTENTIALLY_UNFAIR_PERCENT: f64 = 20.0;

/// 総合推奨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Reject,
    Caution,
    Fair,
}

impl Recommendation {
    /// 閾値は厳密な `>`。10 / 20 ちょうどは次の規則へ落ちる。
    pub fn from_percentages(unfair_percentage: f64, potentially_unfair_percentage: f64) -> Self {
        if unfair_percentage > REJECT_UNFAIR_PERCENT {
            Self::Reject
        } else if potentially_unfair_percentage > CAUTION_POTENTIALLY_UNFAIR_PERCENT {
            Self::Caution
        } else {
            Self::Fair
        }
    }

    pub fn from_summary(summary: &AnalysisSummary) -> Self {
        Self::from_percentages(
            summary.unfair_percentage,
            summary.potentially_unfair_percentage,
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Reject => "Do not proceed with these Terms of Service.",
            Self::Caution => "Proceed with caution and seek legal advice.",
            Self::Fair => "These Terms of Service appear to be generally fair.",
        }
    }
}

/// 表示テーマ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme mode: {other}")),
        }
    }
}

/// 条項の表示スタイル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClauseStyle {
    pub tier: SeverityTier,
    pub background: &'static str,
    /// ANSI SGR 前景色コード（端末表示用）
    pub ansi: &'static str,
}

impl ClauseStyle {
    pub fn for_tier(tier: SeverityTier, mode: ThemeMode) -> Self {
        let (light, dark, ansi) = match tier {
            SeverityTier::ClearlyUnfair => ("#ffcdd2", "#5f2120", "31"),
            SeverityTier::PotentiallyUnfair => ("#fff9c4", "#5c4f10", "33"),
            SeverityTier::Fair => ("#c8e6c9", "#1b4332", "32"),
        };
        Self {
            tier,
            background: match mode {
                ThemeMode::Light => light,
                ThemeMode::Dark => dark,
            },
            ansi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClauseView {
    pub clause: String,
    pub label: String,
    pub style: ClauseStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
    /// 次の条項との間に区切り線を引くか（最後の条項は false）
    pub separator_after: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub summary: AnalysisSummary,
    pub recommendation: Recommendation,
    pub recommendation_message: &'static str,
    pub mode: ThemeMode,
    pub clauses: Vec<ClauseView>,
}

/// AnalysisResult から表示モデルを作る。未知のラベルがあれば E_UNKNOWN_LABEL。
pub fn present(result: &AnalysisResult, mode: ThemeMode) -> Result<ResultView, AppError> {
    let recommendation = Recommendation::from_summary(&result.summary);
    let last = result.results.len().saturating_sub(1);

    let clauses = result
        .results
        .iter()
        .enumerate()
        .map(|(index, finding)| -> Result<ClauseView, AppError> {
            let tier = SeverityTier::from_label(&finding.label)
                .ok_or_else(|| AppError::unknown_label(&finding.label, index))?;
            Ok(ClauseView {
                clause: finding.clause.clone(),
                label: finding.label.clone(),
                style: ClauseStyle::for_tier(tier, mode),
                probabilities: finding.probabilities.clone(),
                separator_after: index < last,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResultView {
        summary: result.summary.clone(),
        recommendation,
        recommendation_message: recommendation.message(),
        mode,
        clauses,
    })
}

const SEPARATOR: &str = "----------------------------------------";

/// 端末向けテキストに整形する
pub fn render_text(view: &ResultView, color: bool) -> String {
    let s = &view.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Analysis Results");
    let _ = writeln!(out, "Total Clauses: {}", s.total_clauses);
    let _ = writeln!(
        out,
        "Unfair Clauses: {} ({:.2}%)",
        s.unfair_count, s.unfair_percentage
    );
    let _ = writeln!(
        out,
        "Potentially Unfair Clauses: {} ({:.2}%)",
        s.potentially_unfair_count, s.potentially_unfair_percentage
    );
    let _ = writeln!(out, "Recommendation: {}", view.recommendation_message);

    if !view.clauses.is_empty() {
        out.push('\n');
    }
    for clause in &view.clauses {
        if color {
            let _ = writeln!(out, "\x1b[{}m{}\x1b[0m", clause.style.ansi, clause.clause);
        } else {
            let _ = writeln!(out, "{}", clause.clause);
        }
        let _ = writeln!(out, "  Classification: {}", clause.label);
        if clause.separator_after {
            let _ = writeln!(out, "{SEPARATOR}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::ClauseFinding;
    use crate::domain::error::ErrorCode;

    fn finding(clause: &str, label: &str) -> ClauseFinding {
        ClauseFinding {
            clause: clause.to_string(),
            label: label.to_string(),
            probabilities: None,
        }
    }

    fn result(findings: Vec<ClauseFinding>, unfair_pct: f64, pot_pct: f64) -> AnalysisResult {
        AnalysisResult {
            summary: AnalysisSummary {
                total_clauses: findings.len() as u32,
                unfair_count: 0,
                unfair_percentage: unfair_pct,
                potentially_unfair_count: 0,
                potentially_unfair_percentage: pot_pct,
            },
            results: findings,
        }
    }

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(Recommendation::from_percentages(15.0, 5.0), Recommendation::Reject);
        assert_eq!(Recommendation::from_percentages(10.0, 5.0), Recommendation::Fair);
        assert_eq!(Recommendation::from_percentages(5.0, 25.0), Recommendation::Caution);
        assert_eq!(Recommendation::from_percentages(5.0, 20.0), Recommendation::Fair);
        assert_eq!(Recommendation::from_percentages(0.0, 0.0), Recommendation::Fair);
    }

    #[test]
    fn test_reject_has_priority_over_caution() {
        assert_eq!(Recommendation::from_percentages(10.5, 90.0), Recommendation::Reject);
        assert_eq!(Recommendation::from_percentages(10.0, 20.01), Recommendation::Caution);
    }

    #[test]
    fn test_order_and_distinct_tiers() {
        let r = result(vec![finding("A", "clearly_unfair"), finding("B", "fair")], 50.0, 0.0);
        let view = present(&r, ThemeMode::Light).unwrap();
        assert_eq!(view.clauses[0].clause, "A");
        assert_eq!(view.clauses[1].clause, "B");
        assert_eq!(view.clauses[0].style.tier, SeverityTier::ClearlyUnfair);
        assert_eq!(view.clauses[1].style.tier, SeverityTier::Fair);
        assert_ne!(view.clauses[0].style, view.clauses[1].style);
        assert_eq!(view.recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_separator_only_between_entries() {
        let r = result(
            vec![finding("A", "fair"), finding("B", "potentially_unfair"), finding("C", "fair")],
            0.0,
            0.0,
        );
        let view = present(&r, ThemeMode::Light).unwrap();
        let flags: Vec<bool> = view.clauses.iter().map(|c| c.separator_after).collect();
        assert_eq!(flags, vec![true, true, false]);

        let text = render_text(&view, false);
        assert_eq!(text.matches(SEPARATOR).count(), 2);
        assert!(!text.trim_end().ends_with(SEPARATOR));
    }

    #[test]
    fn test_single_clause_has_no_separator() {
        let view = present(&result(vec![finding("A", "fair")], 0.0, 0.0), ThemeMode::Dark).unwrap();
        assert!(!view.clauses[0].separator_after);
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let r = result(vec![finding("A", "fair"), finding("B", "mostly_fine")], 0.0, 0.0);
        let err = present(&r, ThemeMode::Light).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownLabel);
        assert!(err.message.contains("#2"));
        assert!(err.message.contains("mostly_fine"));
    }

    #[test]
    fn test_theme_changes_background_only() {
        let light = ClauseStyle::for_tier(SeverityTier::PotentiallyUnfair, ThemeMode::Light);
        let dark = ClauseStyle::for_tier(SeverityTier::PotentiallyUnfair, ThemeMode::Dark);
        assert_eq!(light.background, "#fff9c4");
        assert_eq!(dark.background, "#5c4f10");
        assert_eq!(light.tier, dark.tier);
        assert_eq!(ThemeMode::Light.toggled(), ThemeMode::Dark);
    }

    #[test]
    fn test_render_text_summary_lines() {
        let mut r = result(vec![finding("A", "clearly_unfair")], 12.5, 0.0);
        r.summary.unfair_count = 1;
        let text = render_text(&present(&r, ThemeMode::Light).unwrap(), false);
        assert!(text.contains("Total Clauses: 1"));
        assert!(text.contains("Unfair Clauses: 1 (12.50%)"));
        assert!(text.contains("Recommendation: Do not proceed with these Terms of Service."));
        assert!(text.contains("  Classification: clearly_unfair"));
    }

    #[test]
    fn test_render_text_with_color() {
        let r = result(vec![finding("A", "fair")], 0.0, 0.0);
        let view = present(&r, ThemeMode::Light).unwrap();
        assert!(render_text(&view, true).contains("\x1b[32mA\x1b[0m"));
    }
}
