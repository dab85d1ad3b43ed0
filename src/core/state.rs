//! 应用状态：AppState
//!
//! 一次会话只有一个 AppState，由控制器独占持有；事件处理与异步完成是唯一的修改入口，
//! 每次修改后整体重新渲染。不序列化，不做全局变量。

use std::time::Duration;

use crate::api::{CatalogItem, ManagerOffer, MatchQuality, MiniAppMeta, UserProfile};
use crate::core::Criteria;
use crate::host::HostSession;

/// 四个页面；back 的目标只由当前页面和是否有结果决定
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum View {
    #[default]
    Home,
    Picker,
    Results,
    Chat,
}

impl View {
    /// 固定的返回映射，不维护历史栈
    pub fn back_target(self, has_results: bool) -> View {
        match self {
            View::Chat if has_results => View::Results,
            View::Chat => View::Picker,
            View::Results => View::Picker,
            View::Picker => View::Home,
            View::Home => View::Home,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Home => "Главная",
            View::Picker => "Подбор программы",
            View::Results => "Подборка",
            View::Chat => "Консультант",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// 对话记录中的一条消息；追加后不再修改
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub sources: Vec<String>,
    pub meta: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            sources: Vec::new(),
            meta: None,
        }
    }

    pub fn assistant(text: impl Into<String>, sources: Vec<String>, meta: Option<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            sources,
            meta,
        }
    }
}

/// 模拟进度：已等待时长与当前提示语下标
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub elapsed_ms: u64,
    pub elapsed_secs: u32,
    pub caption_index: usize,
}

impl ProgressState {
    /// 计时器跳一次，按实际间隔累加；每 step_secs 秒前进一条提示语，停在最后一条
    pub fn advance(&mut self, tick: Duration, step_secs: u32, caption_count: usize) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(tick.as_millis() as u64);
        self.elapsed_secs = u32::try_from(self.elapsed_ms / 1000).unwrap_or(u32::MAX);
        let step = step_secs.max(1);
        let last = caption_count.saturating_sub(1);
        self.caption_index = ((self.elapsed_secs / step) as usize).min(last);
    }
}

/// 后端身份校验结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IdentityState {
    #[default]
    Unknown,
    Verified(UserProfile),
    Demo(Option<String>),
}

/// 引导提示：-1 表示已永久关闭
pub const ONBOARDING_DISMISSED: i8 = -1;

#[derive(Clone, Debug)]
pub struct AppState {
    pub view: View,
    pub criteria: Criteria,
    pub results: Vec<CatalogItem>,
    pub match_quality: MatchQuality,
    pub manager_offer: Option<ManagerOffer>,
    pub chat_messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_loading: bool,
    pub loading: bool,
    pub progress: ProgressState,
    pub onboarding_step: i8,
    pub error: Option<String>,
    /// 非错误的提示（如「已发送给经理」）
    pub status: Option<String>,
    pub meta: MiniAppMeta,
    pub session: HostSession,
    pub identity: IdentityState,
    /// 宿主没有主按钮时，主操作渲染为页面内按钮
    pub host_has_main_button: bool,
}

impl AppState {
    pub fn new(brand: impl Into<String>, session: HostSession, onboarding_dismissed: bool) -> Self {
        Self {
            view: View::Home,
            criteria: Criteria::new(brand),
            results: Vec::new(),
            match_quality: MatchQuality::None,
            manager_offer: None,
            chat_messages: Vec::new(),
            chat_input: String::new(),
            chat_loading: false,
            loading: false,
            progress: ProgressState::default(),
            onboarding_step: if onboarding_dismissed { ONBOARDING_DISMISSED } else { 0 },
            error: None,
            status: None,
            meta: MiniAppMeta::default(),
            session,
            identity: IdentityState::Unknown,
            host_has_main_button: false,
        }
    }

    /// 条件变化后推进引导：先年级（0→1），再目标（1→2）；不回退
    pub fn advance_onboarding(&mut self) {
        if self.onboarding_step == 0 && self.criteria.grade.is_some() {
            self.onboarding_step = 1;
        }
        if self.onboarding_step == 1 && self.criteria.goal.is_some() {
            self.onboarding_step = 2;
        }
    }

    pub fn dismiss_onboarding(&mut self) {
        self.onboarding_step = ONBOARDING_DISMISSED;
    }

    pub fn onboarding_visible(&self) -> bool {
        self.onboarding_step >= 0 && !self.criteria.is_complete()
    }

    pub fn can_search(&self) -> bool {
        self.criteria.is_complete() && !self.loading
    }

    pub fn top_result(&self) -> Option<&CatalogItem> {
        self.results.first()
    }

    pub fn manager_recommended(&self) -> bool {
        self.manager_offer.as_ref().is_some_and(|o| o.recommended)
    }

    pub fn manager_message(&self) -> Option<&str> {
        self.manager_offer
            .as_ref()
            .map(|o| o.message.as_str())
            .filter(|m| !m.trim().is_empty())
    }

    pub fn manager_call_to_action(&self) -> Option<&str> {
        self.manager_offer
            .as_ref()
            .map(|o| o.call_to_action.as_str())
            .filter(|m| !m.trim().is_empty())
    }

    /// 最近 n 条用户提问（按时间顺序）
    pub fn recent_user_questions(&self, n: usize) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .chat_messages
            .iter()
            .rev()
            .filter(|m| m.role == ChatRole::User)
            .take(n)
            .map(|m| m.text.as_str())
            .collect();
        out.reverse();
        out
    }

    /// 身份来源：后端校验过的优先，其次宿主提供的
    pub fn known_user(&self) -> Option<&UserProfile> {
        match &self.identity {
            IdentityState::Verified(user) => Some(user),
            _ => self.session.user.as_ref(),
        }
    }

    /// 清空选课条件与结果
    pub fn reset_picker(&mut self) {
        self.criteria.clear();
        self.results.clear();
        self.match_quality = MatchQuality::None;
        self.manager_offer = None;
        self.loading = false;
    }
}
