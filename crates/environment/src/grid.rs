//! Selenium Grid `/status` 조회
//!
//! 진단용 조회는 치명적이지 않습니다. 호출자는 [`GridClient::fetch_status`]의 에러를
//! 실패 안내로 출력하고 정상 종료합니다.

use std::time::Duration;

use gridharness_core::config::GridConfig;
use gridharness_core::error::GridError;
use gridharness_core::types::{GridStatus, HealthCheckSpec, active_sessions};
use serde::Serialize;
use tracing::{debug, warn};

use crate::probe::{Readiness, poll_until};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Grid hub HTTP 클라이언트
#[derive(Debug, Clone)]
pub struct GridClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    request_timeout: Duration,
}

impl GridClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        let client = Self::new(config.url.clone());
        match config.credentials() {
            Some((user, pass)) => client.with_basic_auth(user, pass),
            None => client,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn status_url(&self) -> String {
        format!("{}/status", self.base_url)
    }

    pub fn ui_url(&self) -> String {
        format!("{}/ui", self.base_url)
    }

    /// `/status`를 한 번 조회합니다.
    pub async fn fetch_status(&self) -> Result<GridStatus, GridError> {
        self.fetch_with_timeout(self.request_timeout).await
    }

    async fn fetch_with_timeout(&self, timeout: Duration) -> Result<GridStatus, GridError> {
        let url = self.status_url();
        let mut request = self.client.get(&url).timeout(timeout);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await.map_err(|e| GridError::Unreachable {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GridError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GridError::InvalidPayload(e.to_string()))?;
        Ok(GridStatus::reachable(payload))
    }

    /// `/status` 조회. 실패는 `reachable == false`로 접습니다.
    pub async fn status(&self) -> GridStatus {
        match self.fetch_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "grid status query failed");
                GridStatus::unreachable()
            }
        }
    }

    /// Grid가 `value.ready == true`를 보고할 때까지 폴링합니다.
    pub async fn wait_until_ready(&self, spec: &HealthCheckSpec) -> Readiness {
        poll_until(spec, move |timeout| async move {
            match self.fetch_with_timeout(timeout).await {
                Ok(status) => {
                    let ready = status.is_ready();
                    debug!(ready, nodes = status.node_count(), "grid status");
                    ready
                }
                Err(e) => {
                    debug!(error = %e, "grid not reachable yet");
                    false
                }
            }
        })
        .await
    }
}

/// 노드 한 개의 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub uri: String,
    pub availability: String,
    /// 슬롯에 등록된 브라우저 이름 (중복 제거, 정렬)
    pub browsers: Vec<String>,
    pub max_sessions: u64,
    pub active_sessions: usize,
}

impl NodeSummary {
    /// `/status` 페이로드의 노드 하나를 요약합니다. 누락된 필드는 빈 값이 됩니다.
    pub fn from_node(node: &serde_json::Value) -> Self {
        let text = |key: &str| {
            node.get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or("")
                .to_owned()
        };

        let mut browsers: Vec<String> = node
            .get("slots")
            .and_then(serde_json::Value::as_array)
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(|slot| {
                        slot.pointer("/stereotype/browserName")
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_owned)
                    })
                    .collect()
            })
            .unwrap_or_default();
        browsers.sort();
        browsers.dedup();

        Self {
            uri: text("uri"),
            availability: text("availability"),
            browsers,
            max_sessions: node
                .get("maxSessions")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
            active_sessions: active_sessions(node),
        }
    }

    pub fn from_status(status: &GridStatus) -> Vec<Self> {
        status.nodes().iter().map(Self::from_node).collect()
    }
}
