//! 对话引擎：一次助手问答的生命周期
//!
//! Idle → Sending → (成功 | 失败) → Idle。
//! 发送时先乐观追加用户消息、清空输入、启动进度计时器，再派发请求；
//! 无论成功失败都只追加一条助手消息，保证 user/assistant 一一对应。
//! 每次发送带代际号，重置对话后迟到的响应会被丢弃。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{AppEvent, AppState, ChatMessage, GatewayError, ProgressState};
use crate::api::{AssistantAnswer, AuthHeaders, MiniAppBackend, GENERIC_ASK_FAILURE};
use crate::config::ConversationSection;

/// 等待回答时依次显示的进度提示
pub const PROGRESS_CAPTIONS: [&str; 4] = [
    "Изучаю вопрос…",
    "Подбираю программы из каталога…",
    "Сверяю детали…",
    "Формулирую ответ…",
];

/// 失败时追加到对话里的助手消息
pub const ASK_FAILURE_REPLY: &str =
    "Извините, сейчас не получилось ответить. Попробуйте ещё раз или напишите менеджеру.";

/// 一次问答的结局（供控制器决定触感反馈）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AskOutcome {
    Succeeded,
    Failed,
}

fn with_request_id(text: &str, request_id: Option<&str>) -> String {
    match request_id {
        Some(id) => format!("{text} (ID запроса: {id})"),
        None => text.to_string(),
    }
}

/// 处理说明 + 关联 ID；两者都没有时为 None
fn answer_meta(note: Option<&str>, request_id: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(note) = note.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(note.to_string());
    }
    if let Some(id) = request_id {
        parts.push(format!("ID запроса: {id}"));
    }
    (!parts.is_empty()).then(|| parts.join(" · "))
}

pub struct ConversationEngine {
    backend: Arc<dyn MiniAppBackend>,
    events: mpsc::UnboundedSender<AppEvent>,
    tick_interval: Duration,
    caption_step_secs: u32,
    generation: u64,
    ticker: Option<CancellationToken>,
}

impl ConversationEngine {
    pub fn new(
        backend: Arc<dyn MiniAppBackend>,
        events: mpsc::UnboundedSender<AppEvent>,
        settings: &ConversationSection,
    ) -> Self {
        Self {
            backend,
            events,
            tick_interval: Duration::from_millis(settings.tick_interval_ms.max(1)),
            caption_step_secs: settings.caption_step_secs,
            generation: 0,
            ticker: None,
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// 发送当前输入；输入为空或已有请求在途时不做任何事，返回 false
    pub fn submit(&mut self, state: &mut AppState) -> bool {
        if state.chat_loading {
            tracing::debug!("Ask already in flight, ignoring submit");
            return false;
        }
        let question = state.chat_input.trim().to_string();
        if question.is_empty() {
            return false;
        }

        state.chat_messages.push(ChatMessage::user(question.clone()));
        state.chat_input.clear();
        state.chat_loading = true;
        state.error = None;
        state.status = None;
        state.progress = ProgressState::default();

        self.generation += 1;
        let generation = self.generation;
        self.start_ticker(generation);

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let criteria = state.criteria.clone();
        let auth = AuthHeaders::from_init_data(state.session.init_data.as_deref());
        tracing::info!(generation, chars = question.chars().count(), "Assistant ask started");
        tokio::spawn(async move {
            let result = backend.ask_assistant(&question, &criteria, &auth).await;
            let _ = events.send(AppEvent::AskFinished { generation, result });
        });
        true
    }

    /// 计时器一跳；返回是否需要重新渲染
    pub fn tick(&mut self, state: &mut AppState, generation: u64) -> bool {
        if generation != self.generation || !state.chat_loading {
            return false;
        }
        state
            .progress
            .advance(self.tick_interval, self.caption_step_secs, PROGRESS_CAPTIONS.len());
        true
    }

    /// 请求结束；迟到的（代际不符）返回 None 且不改动状态
    pub fn finish(
        &mut self,
        state: &mut AppState,
        generation: u64,
        result: Result<AssistantAnswer, GatewayError>,
    ) -> Option<AskOutcome> {
        if generation != self.generation || !state.chat_loading {
            tracing::debug!(generation, current = self.generation, "Dropping stale ask completion");
            return None;
        }

        let outcome = match result {
            Ok(answer) => {
                self.apply_answer(state, answer);
                AskOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!("Assistant ask failed: {}", e);
                let request_id = e.request_id();
                state.error = Some(with_request_id(&e.user_message(GENERIC_ASK_FAILURE), request_id));
                let reply = match request_id {
                    Some(id) => format!("{ASK_FAILURE_REPLY} ID запроса: {id}."),
                    None => ASK_FAILURE_REPLY.to_string(),
                };
                state.chat_messages.push(ChatMessage::assistant(reply, Vec::new(), None));
                AskOutcome::Failed
            }
        };

        self.leave_sending(state);
        Some(outcome)
    }

    fn apply_answer(&self, state: &mut AppState, answer: AssistantAnswer) {
        let meta = answer_meta(answer.processing_note.as_deref(), answer.request_id.as_deref());
        state
            .chat_messages
            .push(ChatMessage::assistant(answer.answer_text, answer.sources, meta));
        if !answer.recommended_products.is_empty() {
            state.results = answer.recommended_products;
        }
        if let Some(offer) = answer.manager_offer {
            state.manager_offer = Some(offer);
        }
    }

    /// 清空对话；在途请求的结果会因代际变化被丢弃
    pub fn reset(&mut self, state: &mut AppState) {
        self.generation += 1;
        state.chat_messages.clear();
        state.chat_input.clear();
        self.leave_sending(state);
    }

    fn leave_sending(&mut self, state: &mut AppState) {
        self.stop_ticker();
        state.progress = ProgressState::default();
        state.chat_loading = false;
    }

    fn start_ticker(&mut self, generation: u64) {
        self.stop_ticker();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let events = self.events.clone();
        let period = self.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if events.send(AppEvent::ProgressTick { generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.ticker = Some(token);
    }

    fn stop_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }
}

impl Drop for ConversationEngine {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
