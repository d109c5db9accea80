use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::error::AppError;
use crate::domain::input::{InputForm, UploadedFile};
use crate::domain::report::{self, ResultView, ThemeMode};
use crate::domain::session::{StateTransition, SubmissionController, SubmissionState};
use crate::domain::settings::AppSettings;
use crate::infra::analyzer::ClassificationService;
use crate::infra::metrics::{Metrics, MetricsSummary};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// セッション内で共有される状態（消去タイマーからも参照する）
struct Shared {
    controller: Mutex<SubmissionController>,
    state_tx: watch::Sender<SubmissionState>,
}

impl Shared {
    fn publish(&self, controller: &SubmissionController) {
        self.state_tx.send_replace(controller.state().clone());
    }

    fn dismiss(&self, notice_id: u64) {
        let mut ctl = self.controller.lock();
        if let Some(t) = ctl.dismiss_notice(notice_id, now()) {
            log::info!("notice {notice_id} dismissed: {} -> {}", t.prev_state, t.new_state);
            self.publish(&ctl);
        }
    }
}

/// 応答待ちのまま submit が破棄されたら Submitting を Idle に戻す
struct InFlightGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut ctl = self.shared.controller.lock();
        if let Some(t) = ctl.abandon(now()) {
            log::warn!(
                "session {}: submission dropped before completion: {} -> {}",
                t.session_id,
                t.prev_state,
                t.new_state
            );
            self.shared.publish(&ctl);
        }
    }
}

/// アプリケーションサービス（1ユーザーセッション = 1インスタンス）
pub struct AppService {
    shared: Arc<Shared>,
    form: Mutex<InputForm>,
    theme: Mutex<ThemeMode>,
    dismiss_timer: Mutex<Option<JoinHandle<()>>>,
    analyzer: Arc<dyn ClassificationService>,
    settings: AppSettings,
    metrics: Metrics,
}

impl AppService {
    pub fn new(analyzer: Arc<dyn ClassificationService>, settings: AppSettings) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (state_tx, _) = watch::channel(SubmissionState::Idle);

        log::info!(
            "session {session_id} started (analyzer={}, endpoint={})",
            analyzer.name(),
            settings.endpoint
        );

        Self {
            shared: Arc::new(Shared {
                controller: Mutex::new(SubmissionController::new(session_id)),
                state_tx,
            }),
            form: Mutex::new(InputForm::new()),
            theme: Mutex::new(settings.theme),
            dismiss_timer: Mutex::new(None),
            analyzer,
            settings,
            metrics: Metrics::new(),
        }
    }

    // ==================== Input ====================

    pub fn set_file(&self, file: UploadedFile) {
        if !file.matches_accept_hint() {
            log::warn!(
                "{} is not a .pdf or .txt file; the analysis service may reject it",
                file.name
            );
        }
        self.form.lock().set_file(file);
    }

    pub fn clear_file(&self) {
        self.form.lock().clear_file();
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.form.lock().set_text(text);
    }

    // ==================== Submission ====================

    /// 入力を検証して解析リクエストを送信し、完了まで待つ。
    ///
    /// 送信中の再送は E_IN_FLIGHT で拒否される（リクエストは送られない）。
    /// リクエスト失敗時は Failed に遷移し、消去タイマーを張り直して
    /// E_ANALYSIS_FAILED を返す。
    ///
    /// 応答前に future を破棄した場合、状態は Idle に戻る。
    pub async fn submit(&self) -> Result<StateTransition, AppError> {
        let request = {
            let form = self.form.lock();
            let mut ctl = self.shared.controller.lock();
            let (t, request) = match ctl.submit(&form, now()) {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("submit rejected: {e}");
                    self.metrics.inc_error(e.code);
                    return Err(e);
                }
            };
            log::info!("session {}: {} -> {}", t.session_id, t.prev_state, t.new_state);
            self.shared.publish(&ctl);
            self.cancel_dismiss_timer();
            request
        };
        let mut guard = InFlightGuard {
            shared: &self.shared,
            armed: true,
        };
        self.metrics.inc_submissions_started();

        let start = Instant::now();
        let outcome = self.analyzer.analyze(request).await;
        self.metrics
            .record_latency("analyze", start.elapsed().as_millis() as u64);

        match outcome {
            Ok(result) => {
                for warning in result.summary.consistency_warnings() {
                    log::warn!("summary inconsistency: {warning}");
                }
                let mut ctl = self.shared.controller.lock();
                guard.armed = false;
                let t = ctl.on_success(result, now())?;
                log::info!("session {}: {} -> {}", t.session_id, t.prev_state, t.new_state);
                self.shared.publish(&ctl);
                self.metrics.inc_submissions_succeeded();
                Ok(t)
            }
            Err(e) => {
                log::error!("analysis request failed via {}: {e}", self.analyzer.name());
                let mut ctl = self.shared.controller.lock();
                guard.armed = false;
                let (t, notice_id) = ctl.on_failure(now())?;
                log::info!("session {}: {} -> {}", t.session_id, t.prev_state, t.new_state);
                self.shared.publish(&ctl);
                // 通知とタイマーは同じロック内で対応させる
                self.schedule_dismiss(notice_id);
                drop(ctl);
                self.metrics.inc_submissions_failed();
                Err(AppError::analysis_failed())
            }
        }
    }

    /// 通知消去タイマーを張る。既存のタイマーは破棄して置き換える。
    ///
    /// controller のロックを保持したまま呼ぶこと。
    fn schedule_dismiss(&self, notice_id: u64) {
        let delay = Duration::from_millis(self.settings.error_dismiss_ms);
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.dismiss(notice_id);
            }
        });
        if let Some(prev) = self.dismiss_timer.lock().replace(handle) {
            prev.abort();
        }
    }

    fn cancel_dismiss_timer(&self) {
        if let Some(prev) = self.dismiss_timer.lock().take() {
            prev.abort();
        }
    }

    // ==================== Presentation ====================

    /// 現在の結果を表示モデルに変換する（結果がなければ None）
    pub fn present_current(&self) -> Result<Option<ResultView>, AppError> {
        let theme = *self.theme.lock();
        let ctl = self.shared.controller.lock();
        let Some(result) = ctl.state().result() else {
            return Ok(None);
        };
        match report::present(result, theme) {
            Ok(view) => Ok(Some(view)),
            Err(e) => {
                log::error!("render failed: {e}");
                self.metrics.inc_error(e.code);
                Err(e)
            }
        }
    }

    pub fn theme(&self) -> ThemeMode {
        *self.theme.lock()
    }

    pub fn toggle_theme(&self) -> ThemeMode {
        let mut theme = self.theme.lock();
        *theme = theme.toggled();
        *theme
    }

    // ==================== State Accessors ====================

    pub fn state(&self) -> SubmissionState {
        self.shared.controller.lock().state().clone()
    }

    /// 状態変化の購読（タイマーによる消去も通知される）
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn session_id(&self) -> String {
        self.shared.controller.lock().session_id().to_string()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn get_metrics(&self) -> MetricsSummary {
        self.metrics.summary()
    }
}

impl Drop for AppService {
    fn drop(&mut self) {
        self.cancel_dismiss_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{AnalysisResult, AnalysisSummary, ClauseFinding};
    use crate::domain::error::ErrorCode;
    use crate::domain::input::DocumentInput;
    use crate::infra::analyzer::{AnalyzeError, CannedAnalyzer};

    fn result_of(findings: &[(&str, &str)]) -> AnalysisResult {
        AnalysisResult {
            summary: AnalysisSummary {
                total_clauses: findings.len() as u32,
                unfair_count: 0,
                unfair_percentage: 0.0,
                potentially_unfair_count: 0,
                potentially_unfair_percentage: 0.0,
            },
            results: findings
                .iter()
                .map(|(clause, label)| ClauseFinding {
                    clause: clause.to_string(),
                    label: label.to_string(),
                    probabilities: None,
                })
                .collect(),
        }
    }

    fn server_error() -> AnalyzeError {
        AnalyzeError::Status {
            status: 500,
            body: "Traceback (most recent call last)".to_string(),
        }
    }

    fn setup(analyzer: CannedAnalyzer) -> (Arc<CannedAnalyzer>, AppService) {
        let analyzer = Arc::new(analyzer);
        let service = AppService::new(analyzer.clone(), AppSettings::default());
        (analyzer, service)
    }

    #[tokio::test]
    async fn test_no_input_sends_nothing() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        let err = service.submit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoInputProvided);
        assert_eq!(analyzer.request_count(), 0);
        assert_eq!(service.state(), SubmissionState::Idle);
        assert_eq!(service.get_metrics().error_counts.no_input, 1);
    }

    #[tokio::test]
    async fn test_file_is_sent_instead_of_text() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_ok(result_of(&[]));
        service.set_text("pasted terms");
        service.set_file(UploadedFile::new("tos.txt", b"1. Terms".to_vec()));
        service.submit().await.unwrap();

        let requests = analyzer.requests();
        assert_eq!(requests.len(), 1);
        match &requests[0].document {
            DocumentInput::File(f) => assert_eq!(f.name, "tos.txt"),
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_reaches_succeeded() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_ok(result_of(&[("A", "clearly_unfair"), ("B", "fair")]));
        service.set_text("terms");
        let t = service.submit().await.unwrap();
        assert_eq!(t.prev_state, "submitting");
        assert_eq!(t.new_state, "succeeded");

        let view = service.present_current().unwrap().unwrap();
        let clauses: Vec<_> = view.clauses.iter().map(|c| c.clause.as_str()).collect();
        assert_eq!(clauses, vec!["A", "B"]);
        assert_eq!(service.get_metrics().submissions_succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submit_while_in_flight_is_noop() {
        let analyzer = Arc::new(CannedAnalyzer::new().with_delay(Duration::from_secs(1)));
        analyzer.push_ok(result_of(&[("A", "fair")]));
        let service = Arc::new(AppService::new(analyzer.clone(), AppSettings::default()));
        service.set_text("terms");

        let mut rx = service.subscribe();
        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.submit().await })
        };
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_submitting());

        let err = service.submit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SubmissionInFlight);
        assert_eq!(analyzer.request_count(), 1);

        first.await.unwrap().unwrap();
        assert_eq!(service.state().as_str(), "succeeded");
        assert_eq!(service.get_metrics().error_counts.in_flight, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_notice_dismisses_itself() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_err(server_error());
        service.set_text("terms");

        let err = service.submit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AnalysisRequestFailed);
        assert!(!err.message.contains("Traceback"));
        assert_eq!(service.state().as_str(), "failed");

        tokio::time::sleep(Duration::from_millis(5999)).await;
        assert_eq!(service.state().as_str(), "failed");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(service.state(), SubmissionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_failure_replaces_timer() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_err(server_error());
        analyzer.push_err(AnalyzeError::Transport("connection refused".to_string()));
        service.set_text("terms");

        service.submit().await.unwrap_err();
        let first_id = service.state().notice().unwrap().id;

        tokio::time::sleep(Duration::from_millis(4000)).await;
        service.submit().await.unwrap_err();
        let second_id = service.state().notice().unwrap().id;
        assert_ne!(first_id, second_id);

        // 最初のタイマー期限（6000ms）を過ぎても新しい通知は残る
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(service.state().notice().unwrap().id, second_id);

        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(service.state(), SubmissionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_does_not_clear_later_success() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_err(server_error());
        analyzer.push_ok(result_of(&[("A", "fair")]));
        service.set_text("terms");

        service.submit().await.unwrap_err();
        service.submit().await.unwrap();

        tokio::time::sleep(Duration::from_millis(7000)).await;
        assert_eq!(service.state().as_str(), "succeeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissal_is_published() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_err(server_error());
        service.set_text("terms");
        let mut rx = service.subscribe();

        service.submit().await.unwrap_err();
        assert_eq!(rx.borrow_and_update().as_str(), "failed");

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SubmissionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_leave_no_stuck_notice() {
        let settings = AppSettings {
            error_dismiss_ms: 5,
            ..AppSettings::default()
        };

        for _ in 0..200 {
            let analyzer = Arc::new(CannedAnalyzer::new());
            let service = Arc::new(AppService::new(analyzer.clone(), settings.clone()));
            service.set_text("terms");

            let tasks: Vec<_> = (0..3)
                .map(|_| {
                    let service = service.clone();
                    tokio::spawn(async move {
                        for _ in 0..3 {
                            loop {
                                match service.submit().await {
                                    Err(e) if e.code == ErrorCode::SubmissionInFlight => {
                                        tokio::task::yield_now().await
                                    }
                                    other => {
                                        assert_eq!(
                                            other.unwrap_err().code,
                                            ErrorCode::AnalysisRequestFailed
                                        );
                                        break;
                                    }
                                }
                            }
                        }
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            assert_eq!(analyzer.request_count(), 9);
            assert_eq!(analyzer.max_in_flight(), 1);

            let mut rx = service.subscribe();
            tokio::time::timeout(
                Duration::from_secs(2),
                rx.wait_for(|state| *state == SubmissionState::Idle),
            )
            .await
            .expect("failure notice was never dismissed")
            .unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_submit_returns_to_idle() {
        let analyzer = Arc::new(CannedAnalyzer::new().with_delay(Duration::from_secs(10)));
        let service = AppService::new(analyzer.clone(), AppSettings::default());
        service.set_text("terms");

        let outcome = tokio::time::timeout(Duration::from_secs(1), service.submit()).await;
        assert!(outcome.is_err());
        assert_eq!(service.state(), SubmissionState::Idle);
        assert_eq!(*service.subscribe().borrow(), SubmissionState::Idle);

        // 中断後も再送できる
        analyzer.push_ok(result_of(&[("A", "fair")]));
        let retry = tokio::time::timeout(Duration::from_secs(20), service.submit()).await;
        assert_eq!(retry.unwrap().unwrap().new_state, "succeeded");
    }

    #[tokio::test]
    async fn test_resubmit_discards_previous_result() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_ok(result_of(&[("old-1", "fair"), ("old-2", "clearly_unfair")]));
        analyzer.push_ok(result_of(&[("new", "potentially_unfair")]));
        service.set_text("terms");

        service.submit().await.unwrap();
        service.submit().await.unwrap();

        let view = service.present_current().unwrap().unwrap();
        let clauses: Vec<_> = view.clauses.iter().map(|c| c.clause.as_str()).collect();
        assert_eq!(clauses, vec!["new"]);
    }

    #[tokio::test]
    async fn test_unknown_label_surfaces_on_render() {
        let (analyzer, service) = setup(CannedAnalyzer::new());
        analyzer.push_ok(result_of(&[("A", "fair"), ("B", "unsure")]));
        service.set_text("terms");
        service.submit().await.unwrap();

        let err = service.present_current().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownLabel);
        assert_eq!(service.get_metrics().error_counts.unknown_label, 1);
        // セッションは継続でき、再送できる
        analyzer.push_ok(result_of(&[("C", "fair")]));
        service.submit().await.unwrap();
        assert!(service.present_current().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_present_without_result_is_none() {
        let (_, service) = setup(CannedAnalyzer::new());
        assert!(service.present_current().unwrap().is_none());
    }

    #[test]
    fn test_toggle_theme() {
        let (_, service) = setup(CannedAnalyzer::new());
        assert_eq!(service.theme(), ThemeMode::Light);
        assert_eq!(service.toggle_theme(), ThemeMode::Dark);
        assert_eq!(service.toggle_theme(), ThemeMode::Light);
    }
}
