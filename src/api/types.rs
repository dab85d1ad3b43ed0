//! 后端接口的数据结构（JSON）
//!
//! 字段缺失时尽量取默认值，保证老版本后端也能解析。

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::Criteria;

/// 目录条目；存入状态后不再修改，只会被整体替换
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub price_text: Option<String>,
    #[serde(default)]
    pub next_start: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// 匹配质量；未知取值按 None 处理
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    Strong,
    Limited,
    #[default]
    #[serde(other)]
    None,
}

/// 「转人工」建议
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOffer {
    pub recommended: bool,
    pub message: String,
    pub call_to_action: String,
}

/// Mini App 元信息：品牌与角色文案、人工客服链接
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MiniAppMeta {
    pub brand_name: String,
    pub advisor_name: String,
    pub manager_label: String,
    pub manager_chat_url: Option<String>,
}

impl Default for MiniAppMeta {
    fn default() -> Self {
        Self {
            brand_name: "Учебный центр".to_string(),
            advisor_name: "Консультант".to_string(),
            manager_label: "менеджер".to_string(),
            manager_chat_url: None,
        }
    }
}

/// 用户资料（宿主 initData 中的 user 与 whoami 返回的 user 结构一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserProfile {
    /// 姓名、@用户名、数字 ID：有什么拼什么
    pub fn fragments(&self) -> Vec<String> {
        let mut out = Vec::new();
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            out.push(name);
        }
        if let Some(handle) = self.username.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            out.push(format!("@{}", handle.trim_start_matches('@')));
        }
        out.push(format!("id {}", self.id));
        out
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WhoAmIResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// whoami 结果：校验通过，或进入演示模式（401 / ok=false）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityOutcome {
    Verified(UserProfile),
    Demo { reason: Option<String> },
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<CatalogItem>,
    #[serde(default)]
    pub match_quality: MatchQuality,
    #[serde(default)]
    pub manager_recommended: bool,
    #[serde(default)]
    pub manager_message: Option<String>,
    #[serde(default)]
    pub manager_call_to_action: Option<String>,
}

/// 目录搜索结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogSearchResult {
    pub items: Vec<CatalogItem>,
    pub match_quality: MatchQuality,
    pub manager_offer: Option<ManagerOffer>,
}

impl From<SearchResponse> for CatalogSearchResult {
    fn from(raw: SearchResponse) -> Self {
        let message = raw.manager_message.unwrap_or_default();
        let manager_offer = (raw.manager_recommended || !message.trim().is_empty()).then(|| ManagerOffer {
            recommended: raw.manager_recommended,
            message,
            call_to_action: raw.manager_call_to_action.unwrap_or_default(),
        });
        Self {
            items: raw.items,
            match_quality: raw.match_quality,
            manager_offer,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AskRequest<'a> {
    pub question: &'a str,
    pub criteria: &'a Criteria,
}

/// 来源既可能是纯字符串，也可能是 {title, url}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SourceRef {
    Plain(String),
    Titled {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl SourceRef {
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            SourceRef::Plain(s) => Some(s),
            SourceRef::Titled { title, url } => match (title, url) {
                (Some(t), Some(u)) => Some(format!("{t} ({u})")),
                (Some(t), None) => Some(t),
                (None, u) => u,
            },
        };
        text.filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AskResponse {
    pub answer_text: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub recommended_products: Vec<CatalogItem>,
    #[serde(default)]
    pub manager_offer: Option<ManagerOffer>,
    #[serde(default)]
    pub processing_note: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// 助手回答
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssistantAnswer {
    pub answer_text: String,
    pub sources: Vec<String>,
    pub recommended_products: Vec<CatalogItem>,
    pub manager_offer: Option<ManagerOffer>,
    pub processing_note: Option<String>,
    pub request_id: Option<String>,
}

impl AskResponse {
    /// header 中的关联 ID 优先于响应体
    pub fn into_answer(self, header_request_id: Option<String>) -> AssistantAnswer {
        AssistantAnswer {
            answer_text: self.answer_text,
            sources: self.sources.into_iter().filter_map(SourceRef::into_text).collect(),
            recommended_products: self.recommended_products,
            manager_offer: self.manager_offer,
            processing_note: self.processing_note,
            request_id: header_request_id.or(self.request_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_item_numeric_id() {
        let item: CatalogItem = serde_json::from_str(r#"{"id": 17, "title": "Физтех-ЕГЭ"}"#).unwrap();
        assert_eq!(item.id, "17");
        assert!(item.url.is_none());
    }

    #[test]
    fn test_unknown_match_quality_is_none() {
        let raw: SearchResponse = serde_json::from_str(r#"{"items": [], "match_quality": "weird"}"#).unwrap();
        assert_eq!(raw.match_quality, MatchQuality::None);
    }

    #[test]
    fn test_manager_offer_from_search_fields() {
        let raw: SearchResponse = serde_json::from_str(
            r#"{"items": [], "manager_recommended": true, "manager_message": "Поможем", "manager_call_to_action": "Написать"}"#,
        )
        .unwrap();
        let result = CatalogSearchResult::from(raw);
        let offer = result.manager_offer.unwrap();
        assert!(offer.recommended);
        assert_eq!(offer.call_to_action, "Написать");

        let raw: SearchResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(CatalogSearchResult::from(raw).manager_offer.is_none());
    }

    #[test]
    fn test_meta_partial_keeps_defaults() {
        let meta: MiniAppMeta = serde_json::from_str(r#"{"brand_name": "КМИПТ"}"#).unwrap();
        assert_eq!(meta.brand_name, "КМИПТ");
        assert_eq!(meta.advisor_name, MiniAppMeta::default().advisor_name);
    }

    #[test]
    fn test_user_fragments() {
        let user = UserProfile {
            id: 42,
            first_name: Some("Анна".into()),
            last_name: None,
            username: Some("anna_k".into()),
        };
        assert_eq!(user.fragments(), vec!["Анна", "@anna_k", "id 42"]);
    }

    #[test]
    fn test_header_request_id_wins() {
        let raw: AskResponse = serde_json::from_str(
            r#"{"answer_text": "ok", "request_id": "body-1", "sources": ["a", {"title": "b", "url": "https://x"}]}"#,
        )
        .unwrap();
        let answer = raw.into_answer(Some("hdr-1".into()));
        assert_eq!(answer.request_id.as_deref(), Some("hdr-1"));
        assert_eq!(answer.sources, vec!["a".to_string(), "b (https://x)".to_string()]);
    }
}
