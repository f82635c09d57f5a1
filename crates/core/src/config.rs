//! 설정 관리 -- gridharness.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 모든 구성요소의 설정을 담는 최상위 구조체입니다.
//! 포트와 토폴로지(8080, 4444)는 전역 규약이 아니라 여기서 주입됩니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GRIDHARNESS_APP_URL=http://app:8080/` 형식)
//! 3. 설정 파일 (`gridharness.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), gridharness_core::error::HarnessError> {
//! use gridharness_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("gridharness.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[app]\nurl = \"http://localhost:8080/\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, HarnessError};
use crate::types::HealthCheckSpec;

/// gridharness 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 컨테이너 환경 설정
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// 대상 애플리케이션 설정
    #[serde(default)]
    pub app: AppConfig,
    /// Selenium Grid 설정
    #[serde(default)]
    pub grid: GridConfig,
    /// 테스트 러너 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 결과 출력 설정
    #[serde(default)]
    pub report: ReportConfig,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    ///
    /// 파일이 있지만 파싱에 실패하면 에러를 돌려줍니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        match Self::load(path).await {
            Err(HarnessError::Config(ConfigError::FileNotFound { .. })) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HarnessError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str).map_err(|e| {
            HarnessError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GRIDHARNESS_{SECTION}_{FIELD}`
    /// 예: `GRIDHARNESS_GRID_URL=http://hub:4444`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GRIDHARNESS_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "GRIDHARNESS_GENERAL_LOG_FORMAT",
        );

        // Environment
        override_string(
            &mut self.environment.runtime,
            "GRIDHARNESS_ENVIRONMENT_RUNTIME",
        );
        override_string(
            &mut self.environment.compose_file,
            "GRIDHARNESS_ENVIRONMENT_COMPOSE_FILE",
        );
        override_string(
            &mut self.environment.project_name,
            "GRIDHARNESS_ENVIRONMENT_PROJECT_NAME",
        );
        override_bool(&mut self.environment.build, "GRIDHARNESS_ENVIRONMENT_BUILD");
        override_bool(
            &mut self.environment.stop_before_start,
            "GRIDHARNESS_ENVIRONMENT_STOP_BEFORE_START",
        );
        override_u64(
            &mut self.environment.settle_secs,
            "GRIDHARNESS_ENVIRONMENT_SETTLE_SECS",
        );

        // App
        override_string(&mut self.app.url, "GRIDHARNESS_APP_URL");
        override_u64(
            &mut self.app.health_timeout_secs,
            "GRIDHARNESS_APP_HEALTH_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.app.poll_interval_ms,
            "GRIDHARNESS_APP_POLL_INTERVAL_MS",
        );

        // Grid
        override_string(&mut self.grid.url, "GRIDHARNESS_GRID_URL");
        override_string(&mut self.grid.username, "GRIDHARNESS_GRID_USERNAME");
        override_string(&mut self.grid.password, "GRIDHARNESS_GRID_PASSWORD");
        override_u64(
            &mut self.grid.health_timeout_secs,
            "GRIDHARNESS_GRID_HEALTH_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.grid.monitor_interval_secs,
            "GRIDHARNESS_GRID_MONITOR_INTERVAL_SECS",
        );

        // Runner
        override_words(&mut self.runner.command, "GRIDHARNESS_RUNNER_COMMAND");
        override_string(
            &mut self.runner.timeout_program,
            "GRIDHARNESS_RUNNER_TIMEOUT_PROGRAM",
        );
        override_string(&mut self.runner.report_dir, "GRIDHARNESS_RUNNER_REPORT_DIR");
        override_string(
            &mut self.runner.test_selector,
            "GRIDHARNESS_RUNNER_TEST_SELECTOR",
        );
        override_string(
            &mut self.runner.grid_selector,
            "GRIDHARNESS_RUNNER_GRID_SELECTOR",
        );
        override_usize(
            &mut self.runner.grid_concurrency,
            "GRIDHARNESS_RUNNER_GRID_CONCURRENCY",
        );
        override_usize(
            &mut self.runner.load_concurrency,
            "GRIDHARNESS_RUNNER_LOAD_CONCURRENCY",
        );
        override_u64(
            &mut self.runner.load_duration_secs,
            "GRIDHARNESS_RUNNER_LOAD_DURATION_SECS",
        );

        // Report
        override_string(&mut self.report.language, "GRIDHARNESS_REPORT_LANGUAGE");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.environment.runtime.trim().is_empty() {
            return Err(invalid(
                "environment.runtime",
                "container runtime program must not be empty",
            ));
        }

        validate_http_url("app.url", &self.app.url)?;
        validate_http_url("grid.url", &self.grid.url)?;

        if self.app.health_timeout_secs == 0 {
            return Err(invalid("app.health_timeout_secs", "must be greater than 0"));
        }
        if self.app.poll_interval_ms == 0 {
            return Err(invalid("app.poll_interval_ms", "must be greater than 0"));
        }
        if self.grid.health_timeout_secs == 0 {
            return Err(invalid("grid.health_timeout_secs", "must be greater than 0"));
        }
        if self.grid.monitor_interval_secs == 0 {
            return Err(invalid(
                "grid.monitor_interval_secs",
                "must be greater than 0",
            ));
        }

        // 사용자명만 있고 비밀번호가 없는 조합은 basic auth로 표현할 수 없음
        if self.grid.username.is_empty() && !self.grid.password.is_empty() {
            return Err(invalid(
                "grid.username",
                "username is required when a password is set",
            ));
        }

        if self.runner.command.is_empty() || self.runner.command[0].trim().is_empty() {
            return Err(invalid("runner.command", "runner command must not be empty"));
        }
        if self.runner.grid_concurrency == 0 {
            return Err(invalid("runner.grid_concurrency", "must be greater than 0"));
        }
        if self.runner.load_concurrency == 0 {
            return Err(invalid("runner.load_concurrency", "must be greater than 0"));
        }
        if self.runner.load_duration_secs == 0 {
            return Err(invalid("runner.load_duration_secs", "must be greater than 0"));
        }

        let valid_languages = ["en", "ja"];
        if !valid_languages.contains(&self.report.language.as_str()) {
            return Err(invalid(
                "report.language",
                format!("must be one of: {}", valid_languages.join(", ")),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> HarnessError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn validate_http_url(field: &str, url: &str) -> Result<(), HarnessError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(invalid(field, format!("'{url}' is not an http(s) URL"))),
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 컨테이너 환경 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// 컨테이너 런타임 실행 파일 (`docker`, `podman`)
    pub runtime: String,
    /// compose 파일 경로 (비어 있으면 런타임 기본값)
    pub compose_file: String,
    /// compose 프로젝트 이름 (비어 있으면 런타임 기본값)
    pub project_name: String,
    /// 기동 시 이미지 빌드 여부 (`up --build`)
    pub build: bool,
    /// 기동 전에 같은 프로파일을 먼저 내릴지 여부
    pub stop_before_start: bool,
    /// 기동 직후 고정 대기 시간 (초). 헬스 게이트가 있으므로 보통 0
    pub settle_secs: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_owned(),
            compose_file: String::new(),
            project_name: String::new(),
            build: false,
            stop_before_start: true,
            settle_secs: 0,
        }
    }
}

/// 대상 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 라이브니스 프로브 URL
    pub url: String,
    /// 헬스 게이트 대기 예산 (초)
    pub health_timeout_secs: u64,
    /// 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/".to_owned(),
            health_timeout_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

impl AppConfig {
    /// 애플리케이션 헬스 게이트 명세
    pub fn health_check(&self) -> HealthCheckSpec {
        HealthCheckSpec::new(
            self.url.clone(),
            Duration::from_secs(self.health_timeout_secs),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

/// Selenium Grid 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Grid hub 기본 URL
    pub url: String,
    /// basic auth 사용자명 (비어 있으면 인증 없음)
    pub username: String,
    /// basic auth 비밀번호
    pub password: String,
    /// Grid 준비 대기 예산 (초)
    pub health_timeout_secs: u64,
    /// monitor 모드 폴링 간격 (초)
    pub monitor_interval_secs: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4444".to_owned(),
            username: String::new(),
            password: String::new(),
            health_timeout_secs: 120,
            monitor_interval_secs: 5,
        }
    }
}

impl GridConfig {
    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// `/status` 엔드포인트
    pub fn status_url(&self) -> String {
        format!("{}/status", self.base())
    }

    /// Grid 웹 UI
    pub fn ui_url(&self) -> String {
        format!("{}/ui", self.base())
    }

    /// WebDriver 엔드포인트. 자격 증명이 있으면 URL에 포함합니다.
    pub fn hub_url(&self) -> String {
        let hub = format!("{}/wd/hub", self.base());
        match self.credentials() {
            Some((user, pass)) => embed_credentials(&hub, user, pass),
            None => hub,
        }
    }

    /// basic auth 자격 증명 (사용자명이 비어 있으면 `None`)
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }

    /// Grid 준비 게이트 명세
    pub fn health_check(&self) -> HealthCheckSpec {
        HealthCheckSpec::new(
            self.status_url(),
            Duration::from_secs(self.health_timeout_secs),
            Duration::from_secs(1),
        )
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

fn embed_credentials(url: &str, user: &str, pass: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => format!("{scheme}://{user}:{pass}@{rest}"),
        None => url.to_owned(),
    }
}

/// 테스트 러너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 러너 명령 (실행 파일 + 고정 인자)
    pub command: Vec<String>,
    /// 시간 예산을 강제할 래퍼 프로그램 (coreutils `timeout`)
    pub timeout_program: String,
    /// 리포트 디렉토리
    pub report_dir: String,
    /// `run-tests` 기본 선택자
    pub test_selector: String,
    /// `run-grid-tests` / `run-load-test` 기본 선택자
    pub grid_selector: String,
    /// `run-grid-tests` 기본 병렬도
    pub grid_concurrency: usize,
    /// `run-load-test` 기본 병렬도
    pub load_concurrency: usize,
    /// `run-load-test` 기본 지속 시간 (초)
    pub load_duration_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_owned(), "-m".to_owned(), "pytest".to_owned()],
            timeout_program: "timeout".to_owned(),
            report_dir: "tests/reports".to_owned(),
            test_selector: "tests/test_photo_app.py".to_owned(),
            grid_selector: "tests/test_parallel_grid.py".to_owned(),
            grid_concurrency: 20,
            load_concurrency: 20,
            load_duration_secs: 300,
        }
    }
}

/// 결과 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 결과 배너 언어 (en, ja)
    pub language: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

/// 공백으로 구분된 명령을 단어 목록으로 오버라이드합니다.
fn override_words(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let words: Vec<String> = val.split_whitespace().map(str::to_owned).collect();
        if words.is_empty() {
            warn!(env_key, "empty command in env var, ignoring");
        } else {
            *target = words;
        }
    }
}
