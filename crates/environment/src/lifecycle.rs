//! 환경 수명주기 -- 스코프 기반 기동/정리
//!
//! [`Environment::acquire`]는 프로파일을 기동하고 guard를 돌려줍니다.
//! 정상 경로에서는 [`Environment::release`]로 비동기 정리를 하고,
//! guard가 release 없이 drop되면 (패닉, 조기 반환) `Drop`에서 동기 정리를 시도합니다.
//! 어떤 경로로 끝나든 `down`은 정확히 한 번 호출됩니다.

use std::sync::Arc;
use std::time::Duration;

use gridharness_core::config::EnvironmentConfig;
use gridharness_core::error::EnvironmentError;
use gridharness_core::types::ServiceProfile;
use tracing::{debug, info, warn};

use crate::compose::ComposeRuntime;

/// 기동 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// 기동 전에 같은 프로파일을 먼저 내릴지 여부
    pub stop_before_start: bool,
    /// 기동 직후 고정 대기
    pub settle: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            stop_before_start: true,
            settle: Duration::ZERO,
        }
    }
}

impl LifecycleOptions {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            stop_before_start: config.stop_before_start,
            settle: Duration::from_secs(config.settle_secs),
        }
    }
}

/// 기동된 compose 프로파일의 guard
#[must_use = "dropping the guard tears the environment down immediately"]
pub struct Environment<R: ComposeRuntime> {
    runtime: Arc<R>,
    profile: ServiceProfile,
    released: bool,
}

impl<R: ComposeRuntime> std::fmt::Debug for Environment<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("profile", &self.profile)
            .field("released", &self.released)
            .finish()
    }
}

impl<R: ComposeRuntime> Environment<R> {
    /// 프로파일을 기동하고 guard를 돌려줍니다.
    ///
    /// 기동이 실패하면 부분적으로 올라온 서비스를 정리한 뒤 에러를 돌려줍니다.
    pub async fn acquire(
        runtime: Arc<R>,
        profile: ServiceProfile,
        options: LifecycleOptions,
    ) -> Result<Self, EnvironmentError> {
        let version = runtime.version().await?;
        debug!(%version, "container runtime available");

        if options.stop_before_start {
            // 이전 실행의 잔여물 정리. 실패해도 기동은 시도
            if let Err(e) = runtime.down(profile).await {
                warn!(%profile, error = %e, "pre-start cleanup failed");
            }
        }

        info!(%profile, "starting environment");
        if let Err(e) = runtime.up(profile).await {
            if let Err(stop_err) = runtime.down(profile).await {
                warn!(%profile, error = %stop_err, "cleanup after failed start also failed");
            }
            return Err(e);
        }

        let env = Self {
            runtime,
            profile,
            released: false,
        };

        if !options.settle.is_zero() {
            info!(settle_secs = options.settle.as_secs_f64(), "waiting for services to settle");
            tokio::time::sleep(options.settle).await;
        }

        Ok(env)
    }

    pub fn profile(&self) -> ServiceProfile {
        self.profile
    }

    /// 환경을 정리합니다.
    pub async fn release(mut self) -> Result<(), EnvironmentError> {
        self.released = true;
        info!(profile = %self.profile, "stopping environment");
        self.runtime.down(self.profile).await
    }
}

impl<R: ComposeRuntime> Drop for Environment<R> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(profile = %self.profile, "environment dropped without release, stopping synchronously");
        if let Err(e) = self.runtime.down_blocking(self.profile) {
            warn!(profile = %self.profile, error = %e, "synchronous teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 호출 기록용 mock 런타임
    #[derive(Default)]
    struct RecordingCompose {
        calls: Mutex<Vec<String>>,
        fail_up: bool,
        unavailable: bool,
    }

    impl RecordingCompose {
        fn failing_up() -> Self {
            Self {
                fail_up: true,
                ..Self::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ComposeRuntime for RecordingCompose {
        async fn up(&self, profile: ServiceProfile) -> Result<(), EnvironmentError> {
            self.record(format!("up {profile}"));
            if self.fail_up {
                Err(EnvironmentError::StartFailed {
                    profile: profile.to_string(),
                    reason: "port is already allocated".to_owned(),
                })
            } else {
                Ok(())
            }
        }

        async fn down(&self, profile: ServiceProfile) -> Result<(), EnvironmentError> {
            self.record(format!("down {profile}"));
            Ok(())
        }

        async fn version(&self) -> Result<String, EnvironmentError> {
            if self.unavailable {
                Err(EnvironmentError::RuntimeUnavailable("docker: not found".to_owned()))
            } else {
                Ok("mock".to_owned())
            }
        }

        fn down_blocking(&self, profile: ServiceProfile) -> Result<(), EnvironmentError> {
            self.record(format!("down_blocking {profile}"));
            Ok(())
        }
    }

    fn no_pre_stop() -> LifecycleOptions {
        LifecycleOptions {
            stop_before_start: false,
            settle: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn acquire_then_release_stops_once() {
        let runtime = Arc::new(RecordingCompose::default());
        let env = Environment::acquire(runtime.clone(), ServiceProfile::Test, no_pre_stop())
            .await
            .unwrap();
        assert_eq!(env.profile(), ServiceProfile::Test);
        env.release().await.unwrap();

        assert_eq!(runtime.calls(), ["up test", "down test"]);
    }

    #[tokio::test]
    async fn stop_before_start_issues_down_first() {
        let runtime = Arc::new(RecordingCompose::default());
        let env = Environment::acquire(runtime.clone(), ServiceProfile::Grid, LifecycleOptions::default())
            .await
            .unwrap();
        env.release().await.unwrap();

        assert_eq!(runtime.calls(), ["down grid", "up grid", "down grid"]);
    }

    #[tokio::test]
    async fn drop_without_release_tears_down_synchronously() {
        let runtime = Arc::new(RecordingCompose::default());
        {
            let _env = Environment::acquire(runtime.clone(), ServiceProfile::None, no_pre_stop())
                .await
                .unwrap();
        }
        assert_eq!(runtime.calls(), ["up none", "down_blocking none"]);
    }

    #[tokio::test]
    async fn failed_start_cleans_partial_environment() {
        let runtime = Arc::new(RecordingCompose::failing_up());
        let err = Environment::acquire(runtime.clone(), ServiceProfile::Grid, no_pre_stop())
            .await
            .unwrap_err();

        assert!(matches!(err, EnvironmentError::StartFailed { .. }));
        assert_eq!(runtime.calls(), ["up grid", "down grid"]);
    }

    #[tokio::test]
    async fn unavailable_runtime_fails_before_any_compose_call() {
        let runtime = Arc::new(RecordingCompose {
            unavailable: true,
            ..RecordingCompose::default()
        });
        let err = Environment::acquire(runtime.clone(), ServiceProfile::Test, LifecycleOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EnvironmentError::RuntimeUnavailable(_)));
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_is_applied() {
        let runtime = Arc::new(RecordingCompose::default());
        let options = LifecycleOptions {
            stop_before_start: false,
            settle: Duration::from_secs(10),
        };
        let started = tokio::time::Instant::now();
        let env = Environment::acquire(runtime, ServiceProfile::Test, options)
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(10));
        env.release().await.unwrap();
    }

    #[test]
    fn options_from_config() {
        let config = EnvironmentConfig {
            stop_before_start: false,
            settle_secs: 3,
            ..EnvironmentConfig::default()
        };
        let options = LifecycleOptions::from_config(&config);
        assert!(!options.stop_before_start);
        assert_eq!(options.settle, Duration::from_secs(3));
    }
}
