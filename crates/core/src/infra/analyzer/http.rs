use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::{AnalyzeError, ClassificationService};
use crate::domain::analysis::{AnalysisRequest, AnalysisResult, FILE_FIELD, TEXT_FIELD};
use crate::domain::input::DocumentInput;
use crate::domain::settings::AppSettings;

/// エラーボディをログに残すときの最大長
const MAX_LOGGED_BODY: usize = 512;

/// `POST /analyze` に multipart で送信する分類サービスクライアント
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AnalyzeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AnalyzeError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self, AnalyzeError> {
        Self::new(
            settings.endpoint.clone(),
            settings.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// file か text のどちらか一方だけを持つフォームを組み立てる
    fn build_form(request: AnalysisRequest) -> Form {
        match request.document {
            DocumentInput::File(file) => {
                let part = Part::bytes(file.bytes).file_name(file.name);
                Form::new().part(FILE_FIELD, part)
            }
            DocumentInput::Text { content } => Form::new().text(TEXT_FIELD, content),
        }
    }
}

#[async_trait]
impl ClassificationService for HttpAnalyzer {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalyzeError> {
        log::debug!("POST {} (field={})", self.endpoint, request.field_name());

        let form = Self::build_form(request);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalyzeError::Transport(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_LOGGED_BODY {
                let mut cut = MAX_LOGGED_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(AnalyzeError::Status { status, body });
        }

        response
            .json::<AnalysisResult>()
            .await
            .map_err(|e| AnalyzeError::Decode(format!("Response parse error: {e}")))
    }

    fn name(&self) -> &str {
        "http"
    }
}
