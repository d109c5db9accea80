use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use ta_core::domain::error::ErrorCode;
use ta_core::domain::input::UploadedFile;
use ta_core::usecase::app_service::AppService;

use crate::events::{self, OutputFormat};

/// `--text -` で標準入力から読む
pub const STDIN_MARKER: &str = "-";

/// ファイルとテキストをフォームに積む（両方あればファイルが優先される）
pub async fn load_input(
    service: &AppService,
    file: Option<&Path>,
    text: Option<String>,
) -> Result<()> {
    if let Some(path) = file {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::debug!("loaded {name} ({} bytes)", bytes.len());
        service.set_file(UploadedFile::new(name, bytes));
    }

    if let Some(text) = text {
        let content = if text == STDIN_MARKER {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read text from stdin")?;
            buf
        } else {
            text
        };
        service.set_text(content);
    }

    Ok(())
}

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_NO_INPUT: u8 = 2;

/// 送信して結果（またはエラー通知）を出力し、終了コードを返す
pub async fn analyze<W: Write, E: Write>(
    service: &AppService,
    format: OutputFormat,
    out: &mut W,
    err_out: &mut E,
) -> Result<u8> {
    let session_id = service.session_id();

    let mut rx = service.subscribe();
    let submit = service.submit();
    tokio::pin!(submit);
    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            Ok(()) = rx.changed() => {
                if rx.borrow_and_update().is_submitting() {
                    events::emit_progress(err_out, format)?;
                }
            }
        }
    };

    if let Err(e) = outcome {
        events::emit_error(err_out, format, &session_id, &e)?;
        return Ok(match e.code {
            ErrorCode::NoInputProvided => EXIT_NO_INPUT,
            _ => EXIT_FAILURE,
        });
    }

    match service.present_current() {
        Ok(Some(view)) => {
            events::emit_report(out, format, &session_id, &view)?;
            Ok(EXIT_OK)
        }
        Ok(None) => {
            log::error!(
                "submission finished without a result in state {}",
                service.state().as_str()
            );
            Ok(EXIT_FAILURE)
        }
        Err(e) => {
            events::emit_error(err_out, format, &session_id, &e)?;
            Ok(EXIT_FAILURE)
        }
    }
}
