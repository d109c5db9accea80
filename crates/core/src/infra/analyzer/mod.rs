mod canned;
pub mod http;

pub use canned::CannedAnalyzer;
pub use http::HttpAnalyzer;

use async_trait::async_trait;

use crate::domain::analysis::{AnalysisRequest, AnalysisResult};

/// 解析サービスのエラー（ユーザーには表示せずログに残す）
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Analyzer misconfigured: {0}")]
    Config(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response decode error: {0}")]
    Decode(String),
}

/// 分類サービス trait（HTTP 実装とテスト用の固定応答実装がある）
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalyzeError>;

    fn name(&self) -> &str;
}
