//! 错误类型
//!
//! 按边界划分：后端请求（GatewayError）、宿主能力（HostError）、转接人工（HandoffError）。
//! 所有异步入口在自己的边界捕获错误并转成状态变更，不会逃逸到顶层。

use thiserror::Error;

/// 后端请求失败（网络、非 2xx、响应体无法解析）
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status}")]
    Status { status: u16 },

    /// 后端返回了结构化错误体，message 已按优先级提取为可展示文案
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        request_id: Option<String>,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Catalog search requires complete criteria")]
    IncompleteCriteria,

    #[error("Invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    /// 关联 ID（仅结构化错误体携带）
    pub fn request_id(&self) -> Option<&str> {
        match self {
            GatewayError::Api { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// 面向用户的文案：结构化错误用提取结果，其余一律用兜底文案
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            GatewayError::Api { message, .. } => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// 宿主 SDK 调用失败；Unsupported 表示宿主缺少该能力（或完全不在宿主内）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Host capability unavailable: {0}")]
    Unsupported(&'static str),

    #[error("Host call failed: {0}")]
    Failed(String),
}

/// 转接人工失败
#[derive(Error, Debug)]
pub enum HandoffError {
    /// 超限直接拒绝，不做截断
    #[error("Payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Structured submission is unavailable outside the host")]
    SubmissionUnavailable,

    #[error("Host submission failed: {0}")]
    Host(HostError),

    #[error("Payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HandoffError {
    pub fn user_message(&self) -> &'static str {
        match self {
            HandoffError::PayloadTooLarge { .. } => {
                "Слишком много данных для отправки. Сократите вопрос и попробуйте снова."
            }
            HandoffError::SubmissionUnavailable => {
                "Отправка доступна только внутри Telegram. Откройте приложение из чата с ботом."
            }
            HandoffError::Host(_) | HandoffError::Serialize(_) => {
                "Не удалось отправить данные менеджеру. Попробуйте ещё раз."
            }
        }
    }
}

impl From<HostError> for HandoffError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Unsupported(_) => HandoffError::SubmissionUnavailable,
            other => HandoffError::Host(other),
        }
    }
}
