use std::io::Write;

use serde::Serialize;

use ta_core::domain::error::AppError;
use ta_core::domain::report::ResultView;

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text { color: bool },
    Json,
}

/// error ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload<'a> {
    pub code: &'static str,
    pub message: &'a str,
    pub recoverable: bool,
    pub session_id: &'a str,
}

/// report ペイロード
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload<'a> {
    pub session_id: &'a str,
    pub report: &'a ResultView,
}

/// 結果を出力する
pub fn emit_report<W: Write>(
    out: &mut W,
    format: OutputFormat,
    session_id: &str,
    view: &ResultView,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text { color } => {
            write!(out, "{}", ta_core::domain::report::render_text(view, color))
        }
        OutputFormat::Json => {
            let payload = ReportPayload {
                session_id,
                report: view,
            };
            serde_json::to_writer_pretty(&mut *out, &payload)?;
            writeln!(out)
        }
    }
}

pub const PROGRESS_MESSAGE: &str = "Analyzing...";

/// 送信中の表示（テキスト形式のみ。JSON 出力では何も書かない）
pub fn emit_progress<W: Write>(out: &mut W, format: OutputFormat) -> std::io::Result<()> {
    match format {
        OutputFormat::Text { .. } => writeln!(out, "{PROGRESS_MESSAGE}"),
        OutputFormat::Json => Ok(()),
    }
}

/// エラー通知を出力する（ユーザー向けメッセージのみ）
pub fn emit_error<W: Write>(
    out: &mut W,
    format: OutputFormat,
    session_id: &str,
    err: &AppError,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text { .. } => writeln!(out, "{}", err.message),
        OutputFormat::Json => {
            let payload = ErrorPayload {
                code: err.code.as_str(),
                message: &err.message,
                recoverable: err.recoverable,
                session_id,
            };
            serde_json::to_writer(&mut *out, &payload)?;
            writeln!(out)
        }
    }
}
