//! 헬스 프로브 -- 제한된 예산 안에서 HTTP 엔드포인트를 폴링
//!
//! 고정 sleep 대신 일정 간격 폴링과 명시적 타임아웃을 사용합니다.
//! 네트워크 에러는 "아직 준비 안 됨"으로 취급하며 예산이 끝나기 전에는 치명적이지 않습니다.

use std::future::Future;
use std::time::Duration;

use gridharness_core::types::HealthCheckSpec;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 요청 한 번의 최대 대기 시간. 남은 예산이 더 짧으면 그 값을 사용합니다.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// 폴링 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    /// 예산 안에 준비됨
    Ready { attempts: u32 },
    /// 예산 소진
    NotReady { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts } | Self::NotReady { attempts } => *attempts,
        }
    }
}

/// `check`가 `true`를 돌려줄 때까지 `spec.interval` 간격으로 호출합니다.
///
/// `check`에는 이번 시도에 허용된 타임아웃(남은 예산 이하)이 전달됩니다.
/// 예산이 0이면 한 번도 시도하지 않고 `NotReady`를 돌려줍니다.
pub async fn poll_until<F, Fut>(spec: &HealthCheckSpec, mut check: F) -> Readiness
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        let remaining = spec.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Readiness::NotReady { attempts };
        }

        attempts += 1;
        if check(remaining.min(MAX_REQUEST_TIMEOUT)).await {
            return Readiness::Ready { attempts };
        }

        let remaining = spec.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Readiness::NotReady { attempts };
        }
        tokio::time::sleep(spec.interval.min(remaining)).await;
    }
}

/// HTTP 라이브니스 프로브
#[derive(Debug, Clone, Default)]
pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// `GET target` 한 번. 상태 코드 < 400 이면 준비된 것으로 봅니다.
    pub async fn probe_once(&self, target: &str, timeout: Duration) -> bool {
        match self.client.get(target).timeout(timeout).send().await {
            Ok(resp) => {
                let status = resp.status();
                debug!(target, status = status.as_u16(), "probe response");
                status.as_u16() < 400
            }
            Err(e) => {
                debug!(target, error = %e, "probe failed");
                false
            }
        }
    }

    /// 대상이 응답할 때까지 예산 안에서 폴링합니다.
    pub async fn wait_until_ready(&self, spec: &HealthCheckSpec) -> Readiness {
        info!(
            target = %spec.target,
            timeout_secs = spec.timeout.as_secs(),
            "waiting for endpoint"
        );
        let readiness = poll_until(spec, move |timeout| self.probe_once(&spec.target, timeout)).await;
        match readiness {
            Readiness::Ready { attempts } => {
                info!(target = %spec.target, attempts, "endpoint ready");
            }
            Readiness::NotReady { attempts } => {
                warn!(target = %spec.target, attempts, "endpoint not ready within budget");
            }
        }
        readiness
    }
}
