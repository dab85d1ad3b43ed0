//! 后端请求层
//!
//! 所有后端实现 MiniAppBackend：meta / whoami / 目录搜索 / 助手问答。
//! 每个调用只尝试一次，不重试、不设客户端超时；重试由用户手动再次操作。

pub mod error_body;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::core::{Criteria, GatewayError};

pub use error_body::{extract_request_id, extract_user_message, ErrorContext, GENERIC_ASK_FAILURE};
pub use mock::MockBackend;
pub use types::{
    AssistantAnswer, CatalogItem, CatalogSearchResult, IdentityOutcome, ManagerOffer, MatchQuality,
    MiniAppMeta, UserProfile,
};

use types::{AskRequest, AskResponse, SearchResponse, WhoAmIResponse};

/// 宿主 initData 透传给后端的请求头
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

const META_PATH: &str = "api/miniapp/meta";
const WHOAMI_PATH: &str = "api/auth/whoami";
const SEARCH_PATH: &str = "api/catalog/search";
const ASK_PATH: &str = "api/assistant/ask";

/// 由宿主 initData 派生的鉴权头；不在宿主内时为空
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    init_data: Option<String>,
}

impl AuthHeaders {
    pub fn from_init_data(init_data: Option<&str>) -> Self {
        Self {
            init_data: init_data
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    pub fn init_data(&self) -> Option<&str> {
        self.init_data.as_deref()
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.init_data {
            Some(value) => request.header(INIT_DATA_HEADER, value),
            None => request,
        }
    }
}

/// 后端抽象：真实 HTTP（RequestGateway）与测试用 MockBackend
#[async_trait]
pub trait MiniAppBackend: Send + Sync {
    /// 品牌与文案；调用方吞掉失败，保留默认值
    async fn fetch_meta(&self) -> Result<MiniAppMeta, GatewayError>;

    /// 401 视为演示模式而不是错误
    async fn fetch_identity(&self, init_data: &str) -> Result<IdentityOutcome, GatewayError>;

    /// 调用前必须已通过完整性检查
    async fn search_catalog(&self, criteria: &Criteria) -> Result<CatalogSearchResult, GatewayError>;

    async fn ask_assistant(
        &self,
        question: &str,
        criteria: &Criteria,
        auth: &AuthHeaders,
    ) -> Result<AssistantAnswer, GatewayError>;
}

/// reqwest 实现
#[derive(Clone, Debug)]
pub struct RequestGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl RequestGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let mut base_url = Url::parse(base_url)?;
        // 保证 join 相对路径时不丢掉最后一段前缀
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base_url.join(path)?)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))
}

#[async_trait]
impl MiniAppBackend for RequestGateway {
    async fn fetch_meta(&self) -> Result<MiniAppMeta, GatewayError> {
        let response = self.http.get(self.endpoint(META_PATH)?).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::Status {
                status: response.status().as_u16(),
            });
        }
        decode(response).await
    }

    async fn fetch_identity(&self, init_data: &str) -> Result<IdentityOutcome, GatewayError> {
        let auth = AuthHeaders::from_init_data(Some(init_data));
        let request = auth.apply(self.http.get(self.endpoint(WHOAMI_PATH)?));
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("whoami returned 401, running in demo mode");
            return Ok(IdentityOutcome::Demo { reason: None });
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }
        let body: WhoAmIResponse = decode(response).await?;
        Ok(match (body.ok, body.user) {
            (true, Some(user)) => IdentityOutcome::Verified(user),
            _ => IdentityOutcome::Demo {
                reason: body.reason,
            },
        })
    }

    async fn search_catalog(&self, criteria: &Criteria) -> Result<CatalogSearchResult, GatewayError> {
        let query = criteria.query_pairs().ok_or(GatewayError::IncompleteCriteria)?;
        let response = self
            .http
            .get(self.endpoint(SEARCH_PATH)?)
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = response.status().as_u16(), "catalog search failed");
            return Err(GatewayError::Status {
                status: response.status().as_u16(),
            });
        }
        let raw: SearchResponse = decode(response).await?;
        let result = CatalogSearchResult::from(raw);
        tracing::info!(
            items = result.items.len(),
            quality = ?result.match_quality,
            "catalog search completed"
        );
        Ok(result)
    }

    async fn ask_assistant(
        &self,
        question: &str,
        criteria: &Criteria,
        auth: &AuthHeaders,
    ) -> Result<AssistantAnswer, GatewayError> {
        let body = AskRequest { question, criteria };
        let request = auth.apply(self.http.post(self.endpoint(ASK_PATH)?).json(&body));
        let response = request.send().await?;
        let status = response.status();
        let header_id = response
            .headers()
            .get(error_body::REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = response.text().await?;

        if !status.is_success() {
            let parsed: Option<serde_json::Value> = serde_json::from_str(&text).ok();
            let ctx = ErrorContext {
                status: status.as_u16(),
                body: parsed.as_ref(),
            };
            let message = extract_user_message(&ctx);
            let request_id = extract_request_id(header_id.as_deref(), parsed.as_ref());
            tracing::warn!(
                status = status.as_u16(),
                request_id = request_id.as_deref().unwrap_or("-"),
                "assistant ask failed"
            );
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
                request_id,
            });
        }

        let raw: AskResponse =
            serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(raw.into_answer(header_id))
    }
}
