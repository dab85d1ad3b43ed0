//! Mock 后端（用于测试与离线预览，无需真实服务）
//!
//! 响应按队列给出，队列为空时：搜索返回空结果，问答回显问题；同时记录每次调用的参数。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    AssistantAnswer, AuthHeaders, CatalogSearchResult, IdentityOutcome, MatchQuality, MiniAppBackend,
    MiniAppMeta,
};
use crate::core::{Criteria, GatewayError};

/// 一次问答调用的记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AskCall {
    pub question: String,
    pub criteria: Criteria,
    pub init_data: Option<String>,
}

#[derive(Default)]
pub struct MockBackend {
    meta: Mutex<Option<Result<MiniAppMeta, GatewayError>>>,
    identity: Mutex<Option<Result<IdentityOutcome, GatewayError>>>,
    searches: Mutex<VecDeque<Result<CatalogSearchResult, GatewayError>>>,
    answers: Mutex<VecDeque<Result<AssistantAnswer, GatewayError>>>,
    search_calls: Mutex<Vec<Criteria>>,
    ask_calls: Mutex<Vec<AskCall>>,
    ask_delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 问答在返回前等待一段时间（配合暂停时钟测试进度计时器）
    pub fn with_ask_delay(mut self, delay: Duration) -> Self {
        self.ask_delay = Some(delay);
        self
    }

    pub fn set_meta(&self, meta: Result<MiniAppMeta, GatewayError>) {
        *lock(&self.meta) = Some(meta);
    }

    pub fn set_identity(&self, identity: Result<IdentityOutcome, GatewayError>) {
        *lock(&self.identity) = Some(identity);
    }

    pub fn push_search(&self, result: Result<CatalogSearchResult, GatewayError>) {
        lock(&self.searches).push_back(result);
    }

    pub fn push_answer(&self, result: Result<AssistantAnswer, GatewayError>) {
        lock(&self.answers).push_back(result);
    }

    pub fn search_calls(&self) -> Vec<Criteria> {
        lock(&self.search_calls).clone()
    }

    pub fn ask_calls(&self) -> Vec<AskCall> {
        lock(&self.ask_calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl MiniAppBackend for MockBackend {
    async fn fetch_meta(&self) -> Result<MiniAppMeta, GatewayError> {
        lock(&self.meta).take().unwrap_or_else(|| Ok(MiniAppMeta::default()))
    }

    async fn fetch_identity(&self, _init_data: &str) -> Result<IdentityOutcome, GatewayError> {
        lock(&self.identity)
            .take()
            .unwrap_or(Ok(IdentityOutcome::Demo { reason: None }))
    }

    async fn search_catalog(&self, criteria: &Criteria) -> Result<CatalogSearchResult, GatewayError> {
        if !criteria.is_complete() {
            return Err(GatewayError::IncompleteCriteria);
        }
        lock(&self.search_calls).push(criteria.clone());
        let queued = lock(&self.searches).pop_front();
        queued.unwrap_or_else(|| {
            Ok(CatalogSearchResult {
                items: Vec::new(),
                match_quality: MatchQuality::None,
                manager_offer: None,
            })
        })
    }

    async fn ask_assistant(
        &self,
        question: &str,
        criteria: &Criteria,
        auth: &AuthHeaders,
    ) -> Result<AssistantAnswer, GatewayError> {
        lock(&self.ask_calls).push(AskCall {
            question: question.to_string(),
            criteria: criteria.clone(),
            init_data: auth.init_data().map(String::from),
        });
        if let Some(delay) = self.ask_delay {
            tokio::time::sleep(delay).await;
        }
        let queued = lock(&self.answers).pop_front();
        queued.unwrap_or_else(|| {
            Ok(AssistantAnswer {
                answer_text: format!("Echo from Mock: {question}"),
                ..AssistantAnswer::default()
            })
        })
    }
}
