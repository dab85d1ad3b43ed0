//! 视图树：由 AppState 纯函数式生成
//!
//! 每次状态变化都整体重建 Frame，旧的 Frame 直接丢弃；终端壳与宿主主按钮都只读 Frame。

use crate::api::MatchQuality;
use crate::core::{
    Action, AppState, ChatMessage, CriteriaChoice, Format, Goal, Grade, IdentityState, Subject, View,
    PROGRESS_CAPTIONS,
};

/// 页面内的一个可选项
#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub label: String,
    pub selected: bool,
    pub action: Action,
}

/// 视图节点
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Heading(String),
    Text(String),
    /// 引导提示，带关闭操作
    Hint { text: String, dismiss: Action },
    Choices { label: String, options: Vec<Choice> },
    Card {
        title: String,
        lines: Vec<String>,
        highlighted: bool,
        action: Option<Action>,
    },
    Message(ChatMessage),
    Progress { caption: String, elapsed_secs: u32 },
    Input {
        value: String,
        placeholder: String,
        enabled: bool,
    },
    Button { label: String, action: Action, enabled: bool },
    Status { text: String, is_error: bool },
}

/// 当前页面的主操作（宿主主按钮或页面内按钮）
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryAction {
    pub label: String,
    pub enabled: bool,
    pub action: Action,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub view: View,
    pub title: String,
    pub nodes: Vec<Node>,
    pub primary: Option<PrimaryAction>,
}

impl Frame {
    /// 按顺序列出所有可交互节点的操作（供终端壳做焦点切换）
    pub fn actions(&self) -> Vec<(String, Action, bool)> {
        let mut out = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Hint { dismiss, .. } => out.push(("Скрыть подсказку".to_string(), dismiss.clone(), true)),
                Node::Choices { options, .. } => {
                    out.extend(options.iter().map(|c| (c.label.clone(), c.action.clone(), true)));
                }
                Node::Card {
                    title,
                    action: Some(action),
                    ..
                } => out.push((title.clone(), action.clone(), true)),
                Node::Button { label, action, enabled } => out.push((label.clone(), action.clone(), *enabled)),
                _ => {}
            }
        }
        out
    }
}

pub const CONTACT_MANAGER_LABEL: &str = "Связаться с менеджером";
pub const SEARCH_LABEL: &str = "Показать варианты";
pub const SEARCH_LOADING_LABEL: &str = "Ищем варианты…";
pub const ONBOARDING_HINTS: [&str; 3] = [
    "Начните с класса: так мы поймём уровень программы.",
    "Теперь выберите цель: экзамен, олимпиада, лагерь или успеваемость.",
    "Осталось выбрать предмет и формат занятий.",
];

pub fn primary_action(state: &AppState) -> Option<PrimaryAction> {
    match state.view {
        View::Home => Some(PrimaryAction {
            label: "Подобрать программу".to_string(),
            enabled: true,
            action: Action::Navigate(View::Picker),
        }),
        View::Picker => Some(PrimaryAction {
            label: if state.loading { SEARCH_LOADING_LABEL } else { SEARCH_LABEL }.to_string(),
            enabled: state.can_search(),
            action: Action::Search,
        }),
        View::Results => Some(PrimaryAction {
            label: CONTACT_MANAGER_LABEL.to_string(),
            enabled: true,
            action: Action::ContactManager,
        }),
        View::Chat => None,
    }
}

pub fn render(state: &AppState) -> Frame {
    let mut nodes = Vec::new();
    if let Some(error) = &state.error {
        nodes.push(Node::Status {
            text: error.clone(),
            is_error: true,
        });
    } else if let Some(status) = &state.status {
        nodes.push(Node::Status {
            text: status.clone(),
            is_error: false,
        });
    }

    match state.view {
        View::Home => render_home(state, &mut nodes),
        View::Picker => render_picker(state, &mut nodes),
        View::Results => render_results(state, &mut nodes),
        View::Chat => render_chat(state, &mut nodes),
    }

    let primary = primary_action(state);
    if !state.host_has_main_button {
        if let Some(p) = &primary {
            nodes.push(Node::Button {
                label: p.label.clone(),
                action: p.action.clone(),
                enabled: p.enabled,
            });
        }
    }

    Frame {
        view: state.view,
        title: format!("{} · {}", state.meta.brand_name, state.view.title()),
        nodes,
        primary,
    }
}

fn render_home(state: &AppState, nodes: &mut Vec<Node>) {
    let name = state
        .known_user()
        .and_then(|u| u.first_name.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let greeting = match name {
        Some(name) => format!("Здравствуйте, {name}!"),
        None => "Здравствуйте!".to_string(),
    };
    nodes.push(Node::Heading(greeting));
    nodes.push(Node::Text(format!(
        "Я {}. Помогу подобрать программу {} и отвечу на вопросы.",
        state.meta.advisor_name, state.meta.brand_name
    )));
    if let IdentityState::Demo(reason) = &state.identity {
        let text = match reason {
            Some(reason) => format!("Демо-режим: {reason}"),
            None => "Демо-режим: откройте приложение из чата с ботом, чтобы менеджер увидел ваш профиль.".to_string(),
        };
        nodes.push(Node::Text(text));
    }
    nodes.push(Node::Button {
        label: "Задать вопрос".to_string(),
        action: Action::Navigate(View::Chat),
        enabled: true,
    });
}

fn choices<T: Copy + PartialEq>(
    label: &str,
    values: impl IntoIterator<Item = T>,
    current: Option<T>,
    title: impl Fn(T) -> String,
    choice: impl Fn(T) -> CriteriaChoice,
) -> Node {
    Node::Choices {
        label: label.to_string(),
        options: values
            .into_iter()
            .map(|v| Choice {
                label: title(v),
                selected: current == Some(v),
                action: Action::Select(choice(v)),
            })
            .collect(),
    }
}

fn render_picker(state: &AppState, nodes: &mut Vec<Node>) {
    if state.onboarding_visible() {
        let step = usize::try_from(state.onboarding_step).unwrap_or(0);
        nodes.push(Node::Hint {
            text: ONBOARDING_HINTS[step.min(ONBOARDING_HINTS.len() - 1)].to_string(),
            dismiss: Action::DismissOnboarding,
        });
    }
    let c = &state.criteria;
    nodes.push(choices("Класс", Grade::all(), c.grade, Grade::label, CriteriaChoice::Grade));
    nodes.push(choices("Цель", Goal::ALL, c.goal, |g| g.label().to_string(), CriteriaChoice::Goal));
    nodes.push(choices(
        "Предмет",
        Subject::ALL,
        c.subject,
        |s| s.label().to_string(),
        CriteriaChoice::Subject,
    ));
    nodes.push(choices(
        "Формат",
        Format::ALL,
        c.format,
        |f| f.label().to_string(),
        CriteriaChoice::Format,
    ));
    if state.loading {
        nodes.push(Node::Text(SEARCH_LOADING_LABEL.to_string()));
    }
    nodes.push(Node::Button {
        label: "Сбросить".to_string(),
        action: Action::ResetCriteria,
        enabled: !state.loading,
    });
}

fn match_quality_text(quality: MatchQuality, has_results: bool) -> &'static str {
    match (quality, has_results) {
        (MatchQuality::Strong, true) => "Нашли программы, которые точно подходят.",
        (MatchQuality::Limited, true) => "Точных совпадений нет, но эти программы близки к запросу.",
        (_, true) => "Вот что нашлось в каталоге.",
        (_, false) => "Подходящих программ не нашлось. Менеджер поможет подобрать вариант вручную.",
    }
}

fn render_results(state: &AppState, nodes: &mut Vec<Node>) {
    nodes.push(Node::Text(state.criteria.summary()));
    nodes.push(Node::Heading(
        match_quality_text(state.match_quality, !state.results.is_empty()).to_string(),
    ));

    for (idx, item) in state.results.iter().enumerate() {
        let lines = [&item.summary, &item.price_text, &item.next_start]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect();
        nodes.push(Node::Card {
            title: item.title.clone(),
            lines,
            highlighted: idx == 0,
            action: item.url.as_ref().map(|_| Action::OpenResult(idx)),
        });
    }

    if let Some(message) = state.manager_message() {
        nodes.push(Node::Text(message.to_string()));
    }
    if state.manager_recommended() {
        nodes.push(Node::Button {
            label: state
                .manager_call_to_action()
                .unwrap_or("Написать менеджеру")
                .to_string(),
            action: Action::ContactManager,
            enabled: true,
        });
    }
    if !state.results.is_empty() {
        nodes.push(Node::Button {
            label: "Отправить подборку в чат".to_string(),
            action: Action::SendSelection,
            enabled: state.session.in_host,
        });
    }
    nodes.push(Node::Button {
        label: "Спросить консультанта".to_string(),
        action: Action::Navigate(View::Chat),
        enabled: true,
    });
}

fn render_chat(state: &AppState, nodes: &mut Vec<Node>) {
    if state.chat_messages.is_empty() {
        nodes.push(Node::Text(format!(
            "Спросите {} о программах, расписании или поступлении.",
            state.meta.advisor_name
        )));
    }
    nodes.extend(state.chat_messages.iter().cloned().map(Node::Message));
    if state.chat_loading {
        let idx = state.progress.caption_index.min(PROGRESS_CAPTIONS.len() - 1);
        nodes.push(Node::Progress {
            caption: PROGRESS_CAPTIONS[idx].to_string(),
            elapsed_secs: state.progress.elapsed_secs,
        });
    }
    nodes.push(Node::Input {
        value: state.chat_input.clone(),
        placeholder: "Ваш вопрос…".to_string(),
        enabled: !state.chat_loading,
    });
    nodes.push(Node::Button {
        label: "Отправить".to_string(),
        action: Action::SubmitQuestion,
        enabled: !state.chat_loading && !state.chat_input.trim().is_empty(),
    });
    nodes.push(Node::Button {
        label: "Новый диалог".to_string(),
        action: Action::ResetChat,
        enabled: !state.chat_messages.is_empty() || state.chat_loading,
    });
    nodes.push(Node::Button {
        label: CONTACT_MANAGER_LABEL.to_string(),
        action: Action::ContactManager,
        enabled: true,
    });
}
