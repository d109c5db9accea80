use serde::Serialize;

use super::error::AppError;

/// ファイル選択ダイアログに渡す拡張子ヒント（強制ではない）
pub const ACCEPTED_EXTENSIONS: [&str; 2] = [".pdf", ".txt"];

/// アップロードされたファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// 拡張子がヒントに合致するか。判定はサーバー側が正とする。
    pub fn matches_accept_hint(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

/// 送信対象のドキュメント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentInput {
    File(UploadedFile),
    Text { content: String },
}

impl DocumentInput {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::File(_) => InputKind::File,
            Self::Text { .. } => InputKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    File,
    Text,
}

/// 入力フォーム。ファイルとテキストは互いを消さない。
#[derive(Debug, Clone, Default)]
pub struct InputForm {
    file: Option<UploadedFile>,
    text: String,
}

impl InputForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&mut self, file: UploadedFile) {
        self.file = Some(file);
    }

    pub fn clear_file(&mut self) {
        self.file = None;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 送信対象を決定する: ファイル優先 → テキスト → NoInputProvided
    pub fn validate(&self) -> Result<DocumentInput, AppError> {
        if let Some(file) = &self.file {
            return Ok(DocumentInput::File(file.clone()));
        }
        if !self.text.is_empty() {
            return Ok(DocumentInput::Text {
                content: self.text.clone(),
            });
        }
        Err(AppError::no_input())
    }
}
