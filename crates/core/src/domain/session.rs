use serde::Serialize;

use super::analysis::{AnalysisRequest, AnalysisResult};
use super::error::{AppError, ErrorCode};
use super::input::InputForm;

/// 一時的なエラー通知。id でタイマーと紐付ける。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNotice {
    pub id: u64,
    pub code: ErrorCode,
    pub message: String,
}

/// 送信状態（イベントごとに丸ごと置き換える）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded(AnalysisResult),
    Failed(FailureNotice),
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&FailureNotice> {
        match self {
            Self::Failed(notice) => Some(notice),
            _ => None,
        }
    }
}

/// 状態遷移イベントペイロード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub session_id: String,
    pub prev_state: String,
    pub new_state: String,
    pub at: String,
}

/// 送信コントローラー（セッションごとに1つ）
pub struct SubmissionController {
    session_id: String,
    state: SubmissionState,
    next_notice_id: u64,
}

impl SubmissionController {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            state: SubmissionState::Idle,
            next_notice_id: 1,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    fn replace(&mut self, next: SubmissionState, now: String) -> StateTransition {
        let prev = self.state.as_str().to_string();
        self.state = next;
        StateTransition {
            session_id: self.session_id.clone(),
            prev_state: prev,
            new_state: self.state.as_str().to_string(),
            at: now,
        }
    }

    /// submit: Idle/Succeeded/Failed → Submitting
    ///
    /// 送信中なら E_IN_FLIGHT、入力が空なら E_NO_INPUT を返し、状態は変えない。
    pub fn submit(
        &mut self,
        form: &InputForm,
        now: String,
    ) -> Result<(StateTransition, AnalysisRequest), AppError> {
        if self.state.is_submitting() {
            return Err(AppError::in_flight());
        }
        let document = form.validate()?;
        let transition = self.replace(SubmissionState::Submitting, now);
        Ok((transition, AnalysisRequest::new(document)))
    }

    /// 成功: Submitting → Succeeded
    pub fn on_success(
        &mut self,
        result: AnalysisResult,
        now: String,
    ) -> Result<StateTransition, AppError> {
        match &self.state {
            SubmissionState::Submitting => {
                Ok(self.replace(SubmissionState::Succeeded(result), now))
            }
            other => Err(AppError::invalid_state(format!(
                "on_success cannot run in state {}",
                other.as_str()
            ))),
        }
    }

    /// 失敗: Submitting → Failed。新しい通知 id を返す。
    pub fn on_failure(&mut self, now: String) -> Result<(StateTransition, u64), AppError> {
        match &self.state {
            SubmissionState::Submitting => {
                let id = self.next_notice_id;
                self.next_notice_id += 1;
                let err = AppError::analysis_failed();
                let notice = FailureNotice {
                    id,
                    code: err.code,
                    message: err.message,
                };
                Ok((self.replace(SubmissionState::Failed(notice), now), id))
            }
            other => Err(AppError::invalid_state(format!(
                "on_failure cannot run in state {}",
                other.as_str()
            ))),
        }
    }

    /// 送信の中断: Submitting → Idle。応答を待たずに送信が破棄された場合に使う。
    pub fn abandon(&mut self, now: String) -> Option<StateTransition> {
        match &self.state {
            SubmissionState::Submitting => Some(self.replace(SubmissionState::Idle, now)),
            _ => None,
        }
    }

    /// 通知の自動消去: Failed(id) → Idle。別の状態・別の通知なら何もしない。
    pub fn dismiss_notice(&mut self, notice_id: u64, now: String) -> Option<StateTransition> {
        match &self.state {
            SubmissionState::Failed(notice) if notice.id == notice_id => {
                Some(self.replace(SubmissionState::Idle, now))
            }
            _ => None,
        }
    }
}
