//! 转接人工：有界的结构化数据与上下文摘要
//!
//! 顺序：先尝试直接打开经理聊天链接（摘要放在 text 参数里）；失败或没有链接时
//! 把结构化数据交回宿主；再失败就把错误交给调用方，不再有其他兜底。

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::config::HandoffSection;
use crate::core::{AppState, Criteria, HandoffError};
use crate::host::HostBridge;

pub const NO_QUESTIONS_FILLER: &str = "Вопросов в чате пока не было.";
pub const MANAGER_REQUEST_NOTE: &str = "manager_request";

const TOP_ITEMS: usize = 3;
const RECENT_QUESTIONS: usize = 2;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn normalize_whitespace(text: &str) -> String {
    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"));
    re.replace_all(text.trim(), " ").into_owned()
}

/// 超长时硬切：保留前 max-1 个字符再加省略号
fn truncate_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffFlow {
    Catalog,
    ConsultationRequest,
}

#[derive(Serialize)]
struct PayloadItem<'a> {
    id: &'a str,
    title: &'a str,
    url: Option<&'a str>,
}

#[derive(Serialize)]
struct HandoffPayload<'a> {
    flow: HandoffFlow,
    criteria: &'a Criteria,
    top: Vec<PayloadItem<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    question: Option<&'a str>,
}

/// 转接走了哪条路
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Escalation {
    DirectLink,
    Submitted,
}

#[derive(Clone, Debug)]
pub struct HandoffComposer {
    max_payload_bytes: usize,
    summary_max_chars: usize,
    close_after_send: bool,
}

impl HandoffComposer {
    pub fn new(settings: &HandoffSection) -> Self {
        Self {
            max_payload_bytes: settings.max_payload_bytes,
            summary_max_chars: settings.summary_max_chars.max(1),
            close_after_send: settings.close_after_send,
        }
    }

    /// 序列化结构化数据；达到上限直接拒绝，不截断
    pub fn build_payload(
        &self,
        flow: HandoffFlow,
        state: &AppState,
        note: Option<&str>,
        question: Option<&str>,
    ) -> Result<String, HandoffError> {
        let payload = HandoffPayload {
            flow,
            criteria: &state.criteria,
            top: state
                .results
                .iter()
                .take(TOP_ITEMS)
                .map(|item| PayloadItem {
                    id: &item.id,
                    title: &item.title,
                    url: item.url.as_deref(),
                })
                .collect(),
            note,
            question,
        };
        let raw = serde_json::to_string(&payload)?;
        if raw.len() >= self.max_payload_bytes {
            tracing::warn!(size = raw.len(), limit = self.max_payload_bytes, "Handoff payload rejected");
            return Err(HandoffError::PayloadTooLarge {
                size: raw.len(),
                limit: self.max_payload_bytes,
            });
        }
        Ok(raw)
    }

    /// 给经理的可读摘要
    pub fn compose_context_message(&self, state: &AppState) -> String {
        let mut lines = vec![format!(
            "Здравствуйте! Пишу из мини-приложения «{}».",
            state.meta.brand_name
        )];
        if let Some(user) = state.known_user() {
            lines.push(format!("Пользователь: {}", user.fragments().join(", ")));
        }
        lines.push(state.criteria.summary());

        let titles: Vec<&str> = state.results.iter().take(TOP_ITEMS).map(|i| i.title.as_str()).collect();
        if !titles.is_empty() {
            lines.push(format!("Подобранные программы: {}", titles.join("; ")));
        }

        let questions: Vec<String> = state
            .recent_user_questions(RECENT_QUESTIONS)
            .into_iter()
            .map(normalize_whitespace)
            .filter(|q| !q.is_empty())
            .collect();
        if questions.is_empty() {
            lines.push(NO_QUESTIONS_FILLER.to_string());
        } else {
            lines.push(format!("Вопросы из чата: {}", questions.join(" | ")));
        }

        truncate_chars(lines.join("\n"), self.summary_max_chars)
    }

    /// 经理聊天链接，摘要作为 text 参数；没有配置或地址无效时为 None
    pub fn manager_link(&self, state: &AppState) -> Option<String> {
        let base = state.meta.manager_chat_url.as_deref()?.trim();
        if base.is_empty() {
            return None;
        }
        let mut url = match Url::parse(base) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Invalid manager chat url {}: {}", base, e);
                return None;
            }
        };
        url.query_pairs_mut()
            .append_pair("text", &self.compose_context_message(state));
        Some(url.to_string())
    }

    pub fn escalate(&self, state: &AppState, bridge: &HostBridge) -> Result<Escalation, HandoffError> {
        if let Some(link) = self.manager_link(state) {
            if bridge.open_external_link(&link) {
                tracing::info!("Escalated via direct manager link");
                return Ok(Escalation::DirectLink);
            }
            tracing::info!("Direct manager link failed, trying structured submission");
        }
        let flow = if state.results.is_empty() {
            HandoffFlow::ConsultationRequest
        } else {
            HandoffFlow::Catalog
        };
        let question = state.recent_user_questions(1).first().copied();
        self.submit(flow, state, Some(MANAGER_REQUEST_NOTE), question, bridge)?;
        Ok(Escalation::Submitted)
    }

    pub fn submit(
        &self,
        flow: HandoffFlow,
        state: &AppState,
        note: Option<&str>,
        question: Option<&str>,
        bridge: &HostBridge,
    ) -> Result<(), HandoffError> {
        let payload = self.build_payload(flow, state, note, question)?;
        bridge.send_structured_payload(&payload, self.close_after_send)
    }
}
