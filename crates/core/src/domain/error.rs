use serde::Serialize;

/// 入力が空のときにユーザーへ表示するメッセージ
pub const NO_INPUT_MESSAGE: &str = "Please upload a file or paste text to analyze.";

/// 解析リクエスト失敗時にユーザーへ表示するメッセージ（内部詳細は含めない）
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "An error occurred while analyzing the Terms of Service. Please try again.";

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_NO_INPUT")]
    NoInputProvided,
    #[serde(rename = "E_ANALYSIS_FAILED")]
    AnalysisRequestFailed,
    #[serde(rename = "E_UNKNOWN_LABEL")]
    UnknownLabel,
    #[serde(rename = "E_IN_FLIGHT")]
    SubmissionInFlight,
    #[serde(rename = "E_INVALID_STATE")]
    InvalidState,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoInputProvided => "E_NO_INPUT",
            Self::AnalysisRequestFailed => "E_ANALYSIS_FAILED",
            Self::UnknownLabel => "E_UNKNOWN_LABEL",
            Self::SubmissionInFlight => "E_IN_FLIGHT",
            Self::InvalidState => "E_INVALID_STATE",
            Self::Internal => "E_INTERNAL",
        }
    }
}

/// アプリケーションエラー（表示ペイロード兼用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    pub fn no_input() -> Self {
        Self {
            code: ErrorCode::NoInputProvided,
            message: NO_INPUT_MESSAGE.to_string(),
            recoverable: true,
        }
    }

    /// 常に汎用メッセージを返す。原因はログにのみ出力する。
    pub fn analysis_failed() -> Self {
        Self {
            code: ErrorCode::AnalysisRequestFailed,
            message: ANALYSIS_FAILED_MESSAGE.to_string(),
            recoverable: true,
        }
    }

    pub fn unknown_label(label: &str, index: usize) -> Self {
        Self {
            code: ErrorCode::UnknownLabel,
            message: format!("clause #{} has unrecognized label {label:?}", index + 1),
            recoverable: true,
        }
    }

    pub fn in_flight() -> Self {
        Self {
            code: ErrorCode::SubmissionInFlight,
            message: "an analysis request is already in flight".to_string(),
            recoverable: true,
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidState,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}
