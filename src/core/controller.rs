//! 主控循环：持有 AppState，消费事件，每次修改后整体重新渲染
//!
//! 用户操作与异步完成都以 AppEvent 的形式进入同一个 mpsc 通道；
//! 网络请求与计时器在独立任务中运行，只往通道里投递事件，从不直接触碰状态。
//! 渲染结果通过 watch 通道发布给终端壳，同时同步宿主主按钮。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::conversation::{AskOutcome, ConversationEngine};
use super::{AppState, CriteriaChoice, GatewayError, IdentityState, View};
use crate::api::{AssistantAnswer, CatalogSearchResult, IdentityOutcome, MiniAppBackend, MiniAppMeta};
use crate::config::AppConfig;
use crate::handoff::{Escalation, HandoffComposer, HandoffFlow};
use crate::host::{HapticKind, HostBridge};
use crate::storage::{onboarding_dismissed, remember_onboarding_dismissed, PreferenceStore};
use crate::view::{self, Frame};

pub const SEARCH_FAILURE: &str = "Не удалось загрузить подборку. Попробуйте ещё раз.";
pub const LINK_FAILURE: &str = "Не удалось открыть ссылку.";
pub const ESCALATION_LINK_OPENED: &str = "Открываем чат с менеджером.";
pub const ESCALATION_SUBMITTED: &str = "Заявка отправлена менеджеру.";
pub const SELECTION_SUBMITTED: &str = "Подборка отправлена в чат.";

/// 用户操作
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Navigate(View),
    Back,
    Select(CriteriaChoice),
    ResetCriteria,
    Search,
    InputChanged(String),
    /// 终端壳逐键输入；以事件循环里的当前输入为准
    InputChar(char),
    InputBackspace,
    SubmitQuestion,
    ResetChat,
    DismissOnboarding,
    DismissError,
    /// 转接人工（直连优先，结构化兜底）
    ContactManager,
    /// 把当前选择直接交回宿主
    SendSelection,
    OpenResult(usize),
}

/// 进入事件循环的一切
#[derive(Debug)]
pub enum AppEvent {
    Action(Action),
    MetaLoaded(Result<MiniAppMeta, GatewayError>),
    IdentityResolved(Result<IdentityOutcome, GatewayError>),
    SearchFinished {
        generation: u64,
        result: Result<CatalogSearchResult, GatewayError>,
    },
    AskFinished {
        generation: u64,
        result: Result<AssistantAnswer, GatewayError>,
    },
    ProgressTick { generation: u64 },
    Quit,
}

pub struct App {
    state: AppState,
    bridge: HostBridge,
    backend: Arc<dyn MiniAppBackend>,
    store: Arc<dyn PreferenceStore>,
    conversation: ConversationEngine,
    handoff: HandoffComposer,
    events: mpsc::UnboundedSender<AppEvent>,
    frames: watch::Sender<Frame>,
    search_generation: u64,
    render_count: u64,
}

impl App {
    /// 从宿主会话与持久化的引导标记创建应用；返回事件接收端供 run 使用
    pub fn new(
        cfg: &AppConfig,
        bridge: HostBridge,
        backend: Arc<dyn MiniAppBackend>,
        store: Arc<dyn PreferenceStore>,
    ) -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (events, inbox) = mpsc::unbounded_channel();
        let session = bridge.init_session();
        let mut state = AppState::new(cfg.app.brand.clone(), session, onboarding_dismissed(store.as_ref()));
        state.host_has_main_button = bridge.has_main_button();
        let (frames, _) = watch::channel(view::render(&state));

        let app = Self {
            conversation: ConversationEngine::new(backend.clone(), events.clone(), &cfg.conversation),
            handoff: HandoffComposer::new(&cfg.handoff),
            state,
            bridge,
            backend,
            store,
            events,
            frames,
            search_generation: 0,
            render_count: 0,
        };
        (app, inbox)
    }

    pub fn events(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Frame> {
        self.frames.subscribe()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// 首次渲染并在后台拉取元信息与身份；失败只记日志
    pub fn boot(&mut self) {
        self.render();

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = backend.fetch_meta().await;
            let _ = events.send(AppEvent::MetaLoaded(result));
        });

        match self.state.session.init_data.clone() {
            Some(init_data) => {
                let backend = Arc::clone(&self.backend);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = backend.fetch_identity(&init_data).await;
                    let _ = events.send(AppEvent::IdentityResolved(result));
                });
            }
            None => {
                self.state.identity = IdentityState::Demo(None);
                self.render();
            }
        }
    }

    /// 处理一个事件；返回 false 表示退出
    pub fn handle(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Action(action) => self.dispatch(action),
            AppEvent::MetaLoaded(result) => {
                match result {
                    Ok(meta) => self.state.meta = meta,
                    Err(e) => tracing::debug!("Meta fetch failed, keeping defaults: {}", e),
                }
                self.render();
            }
            AppEvent::IdentityResolved(result) => {
                self.state.identity = match result {
                    Ok(IdentityOutcome::Verified(user)) => IdentityState::Verified(user),
                    Ok(IdentityOutcome::Demo { reason }) => IdentityState::Demo(reason),
                    Err(e) => {
                        tracing::debug!("Identity check failed, running as demo: {}", e);
                        IdentityState::Demo(None)
                    }
                };
                self.render();
            }
            AppEvent::SearchFinished { generation, result } => self.finish_search(generation, result),
            AppEvent::AskFinished { generation, result } => {
                if let Some(outcome) = self.conversation.finish(&mut self.state, generation, result) {
                    self.bridge.trigger_haptic(match outcome {
                        AskOutcome::Succeeded => HapticKind::Success,
                        AskOutcome::Failed => HapticKind::Error,
                    });
                    self.render();
                }
            }
            AppEvent::ProgressTick { generation } => {
                if self.conversation.tick(&mut self.state, generation) {
                    self.render();
                }
            }
            AppEvent::Quit => {
                tracing::info!("Quit requested");
                return false;
            }
        }
        true
    }

    pub fn dispatch(&mut self, action: Action) {
        tracing::debug!(?action, view = ?self.state.view, "dispatch");
        match action {
            Action::Navigate(view) => {
                self.bridge.trigger_haptic(HapticKind::Light);
                self.navigate_to(view);
            }
            Action::Back => self.go_back(),
            Action::Select(choice) => {
                // 条件变了，在途搜索的结果不再对应当前条件
                self.abandon_search();
                self.clear_messages();
                self.state.criteria.apply(choice);
                self.state.advance_onboarding();
                self.bridge.trigger_haptic(HapticKind::Selection);
                self.render();
            }
            Action::ResetCriteria => {
                self.abandon_search();
                self.clear_messages();
                self.state.reset_picker();
                self.render();
            }
            Action::Search => self.start_search(),
            Action::InputChanged(text) => {
                if !self.state.chat_loading {
                    self.state.chat_input = text;
                }
                self.render();
            }
            Action::InputChar(c) => {
                if !self.state.chat_loading {
                    self.state.chat_input.push(c);
                }
                self.render();
            }
            Action::InputBackspace => {
                if !self.state.chat_loading {
                    self.state.chat_input.pop();
                }
                self.render();
            }
            Action::SubmitQuestion => {
                if self.conversation.submit(&mut self.state) {
                    self.bridge.trigger_haptic(HapticKind::Light);
                }
                self.render();
            }
            Action::ResetChat => {
                self.clear_messages();
                self.conversation.reset(&mut self.state);
                self.render();
            }
            Action::DismissOnboarding => {
                self.state.dismiss_onboarding();
                remember_onboarding_dismissed(self.store.as_ref());
                self.render();
            }
            Action::DismissError => {
                self.state.error = None;
                self.render();
            }
            Action::ContactManager => self.escalate(),
            Action::SendSelection => self.send_selection(),
            Action::OpenResult(idx) => self.open_result(idx),
        }
    }

    /// 离开选课页时放弃在途搜索，迟到的结果不会把用户拉回结果页
    pub fn navigate_to(&mut self, view: View) {
        if view != View::Picker {
            self.abandon_search();
        }
        self.clear_messages();
        self.state.view = view;
        self.render();
    }

    /// 固定的返回映射；Home 上返回仍然重新渲染
    pub fn go_back(&mut self) {
        let target = self.state.view.back_target(!self.state.results.is_empty());
        self.navigate_to(target);
    }

    /// 丢弃旧 Frame，从状态完整重建并发布，再同步宿主主按钮
    pub fn render(&mut self) {
        let frame = view::render(&self.state);
        self.bridge.sync_primary_action(frame.primary.as_ref(), &self.events);
        self.frames.send_replace(frame);
        self.render_count += 1;
    }

    fn clear_messages(&mut self) {
        self.state.error = None;
        self.state.status = None;
    }

    /// 作废在途搜索：推进代际并解除加载状态；没有在途搜索时只推进代际
    fn abandon_search(&mut self) {
        self.search_generation += 1;
        if self.state.loading {
            tracing::debug!(generation = self.search_generation, "In-flight search abandoned");
            self.state.loading = false;
        }
    }

    fn start_search(&mut self) {
        if !self.state.can_search() {
            tracing::debug!("Search ignored: criteria incomplete or search running");
            self.render();
            return;
        }
        self.clear_messages();
        self.state.loading = true;
        self.search_generation += 1;
        let generation = self.search_generation;

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let criteria = self.state.criteria.clone();
        tracing::info!(generation, "Catalog search started");
        tokio::spawn(async move {
            let result = backend.search_catalog(&criteria).await;
            let _ = events.send(AppEvent::SearchFinished { generation, result });
        });
        self.render();
    }

    fn finish_search(&mut self, generation: u64, result: Result<CatalogSearchResult, GatewayError>) {
        if generation != self.search_generation {
            tracing::debug!(generation, current = self.search_generation, "Dropping stale search completion");
            return;
        }
        self.state.loading = false;
        match result {
            Ok(found) => {
                tracing::info!(items = found.items.len(), quality = ?found.match_quality, "Catalog search finished");
                self.state.results = found.items;
                self.state.match_quality = found.match_quality;
                self.state.manager_offer = found.manager_offer;
                self.bridge.trigger_haptic(HapticKind::Success);
                self.navigate_to(View::Results);
            }
            Err(e) => {
                tracing::warn!("Catalog search failed: {}", e);
                let message = e.user_message(SEARCH_FAILURE);
                self.state.error = Some(match e.request_id() {
                    Some(id) => format!("{message} (ID запроса: {id})"),
                    None => message,
                });
                self.bridge.trigger_haptic(HapticKind::Error);
                self.render();
            }
        }
    }

    fn escalate(&mut self) {
        self.clear_messages();
        match self.handoff.escalate(&self.state, &self.bridge) {
            Ok(Escalation::DirectLink) => self.state.status = Some(ESCALATION_LINK_OPENED.to_string()),
            Ok(Escalation::Submitted) => {
                self.state.status = Some(ESCALATION_SUBMITTED.to_string());
                self.bridge.trigger_haptic(HapticKind::Success);
            }
            Err(e) => {
                tracing::warn!("Escalation failed: {}", e);
                self.state.error = Some(e.user_message().to_string());
                self.bridge.trigger_haptic(HapticKind::Error);
            }
        }
        self.render();
    }

    fn send_selection(&mut self) {
        self.clear_messages();
        let question = self.state.recent_user_questions(1).first().map(|q| q.to_string());
        match self
            .handoff
            .submit(HandoffFlow::Catalog, &self.state, None, question.as_deref(), &self.bridge)
        {
            Ok(()) => {
                self.state.status = Some(SELECTION_SUBMITTED.to_string());
                self.bridge.trigger_haptic(HapticKind::Success);
            }
            Err(e) => {
                tracing::warn!("Selection submission failed: {}", e);
                self.state.error = Some(e.user_message().to_string());
                self.bridge.trigger_haptic(HapticKind::Error);
            }
        }
        self.render();
    }

    fn open_result(&mut self, idx: usize) {
        self.clear_messages();
        let url = self.state.results.get(idx).and_then(|item| item.url.clone());
        if let Some(url) = url {
            if !self.bridge.open_external_link(&url) {
                self.state.error = Some(LINK_FAILURE.to_string());
            }
        }
        self.render();
    }

    /// 事件循环：直到收到 Quit 或所有发送端关闭
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<AppEvent>) {
        self.boot();
        while let Some(event) = inbox.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        tracing::info!(renders = self.render_count, "Event loop stopped");
    }
}
