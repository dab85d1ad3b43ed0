//! 非 2xx 响应体的错误文案提取
//!
//! 提取器按固定优先级依次尝试，第一个给出结果的生效：
//! 1. 顶层 `user_message`
//! 2. 字符串 `detail`（仅 status < 500；5xx 的 detail 不视为可展示文案）
//! 3. 对象 `detail` 中的 `user_message` / `message`
//!
//! 都没有时用兜底文案。

use serde_json::Value;

/// 助手请求失败时的兜底文案
pub const GENERIC_ASK_FAILURE: &str = "Не удалось получить ответ ассистента. Попробуйте ещё раз.";

/// 关联 ID 的响应头
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 一次失败响应的上下文
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub status: u16,
    pub body: Option<&'a Value>,
}

pub type Extractor = fn(&ErrorContext<'_>) -> Option<String>;

/// 提取器列表（顺序即优先级）
pub const USER_MESSAGE_EXTRACTORS: [Extractor; 3] =
    [top_level_user_message, trusted_string_detail, nested_detail_message];

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub fn top_level_user_message(ctx: &ErrorContext<'_>) -> Option<String> {
    non_blank(ctx.body?.get("user_message"))
}

pub fn trusted_string_detail(ctx: &ErrorContext<'_>) -> Option<String> {
    if ctx.status >= 500 {
        return None;
    }
    non_blank(ctx.body?.get("detail"))
}

pub fn nested_detail_message(ctx: &ErrorContext<'_>) -> Option<String> {
    let detail = ctx.body?.get("detail")?;
    if !detail.is_object() {
        return None;
    }
    non_blank(detail.get("user_message")).or_else(|| non_blank(detail.get("message")))
}

/// 按优先级提取可展示文案
pub fn extract_user_message(ctx: &ErrorContext<'_>) -> String {
    USER_MESSAGE_EXTRACTORS
        .iter()
        .find_map(|extract| extract(ctx))
        .unwrap_or_else(|| GENERIC_ASK_FAILURE.to_string())
}

fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 关联 ID：响应头 > body.request_id > body.detail.request_id
pub fn extract_request_id(header: Option<&str>, body: Option<&Value>) -> Option<String> {
    header
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| id_value(body.and_then(|b| b.get("request_id"))))
        .or_else(|| id_value(body.and_then(|b| b.get("detail")).and_then(|d| d.get("request_id"))))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(status: u16, body: Value) -> String {
        extract_user_message(&ErrorContext {
            status,
            body: Some(&body),
        })
    }

    #[test]
    fn test_user_message_wins_over_detail() {
        let body = json!({"user_message": "Слишком частые запросы", "detail": "rate limited"});
        assert_eq!(message(429, body), "Слишком частые запросы");
    }

    #[test]
    fn test_5xx_string_detail_not_trusted() {
        assert_eq!(message(500, json!({"detail": "internal"})), GENERIC_ASK_FAILURE);
        assert_eq!(message(502, json!({"detail": "bad gateway"})), GENERIC_ASK_FAILURE);
    }

    #[test]
    fn test_4xx_string_detail_trusted() {
        assert_eq!(message(422, json!({"detail": "question too long"})), "question too long");
    }

    #[test]
    fn test_nested_detail_object() {
        let body = json!({"detail": {"user_message": "Сервис перегружен", "message": "overload"}});
        assert_eq!(message(503, body), "Сервис перегружен");
        let body = json!({"detail": {"message": "Нет доступа"}});
        assert_eq!(message(403, body), "Нет доступа");
    }

    #[test]
    fn test_blank_and_missing_fall_back() {
        assert_eq!(message(400, json!({"user_message": "   "})), GENERIC_ASK_FAILURE);
        assert_eq!(message(400, json!({"detail": ["list"]})), GENERIC_ASK_FAILURE);
        let ctx = ErrorContext { status: 400, body: None };
        assert_eq!(extract_user_message(&ctx), GENERIC_ASK_FAILURE);
    }

    #[test]
    fn test_request_id_priority() {
        let body = json!({"request_id": "body", "detail": {"request_id": "nested"}});
        assert_eq!(extract_request_id(Some("hdr"), Some(&body)).as_deref(), Some("hdr"));
        assert_eq!(extract_request_id(None, Some(&body)).as_deref(), Some("body"));
        let body = json!({"detail": {"request_id": 981}});
        assert_eq!(extract_request_id(Some(" "), Some(&body)).as_deref(), Some("981"));
        assert_eq!(extract_request_id(None, None), None);
    }
}
