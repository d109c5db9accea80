use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AnalyzeError, ClassificationService};
use crate::domain::analysis::{AnalysisRequest, AnalysisResult};

/// CannedAnalyzer: 事前に積んだ応答を順に返すモック実装。
/// 受け取ったリクエストは記録され、テストから検査できる。
pub struct CannedAnalyzer {
    responses: Mutex<VecDeque<Result<AnalysisResult, AnalyzeError>>>,
    requests: Mutex<Vec<AnalysisRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CannedAnalyzer {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// 応答前に待機する（送信中状態を観測するため）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, result: AnalysisResult) {
        self.responses.lock().push_back(Ok(result));
    }

    pub fn push_err(&self, err: AnalyzeError) {
        self.responses.lock().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// 同時に処理中だったリクエスト数の最大値
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for CannedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassificationService for CannedAnalyzer {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalyzeError> {
        self.requests.lock().push(request);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(AnalyzeError::Transport("no canned response left".to_string()))
        });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn name(&self) -> &str {
        "canned"
    }
}
