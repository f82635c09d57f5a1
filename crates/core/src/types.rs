//! 도메인 타입 -- 한 번의 실행 동안만 존재하는 값들
//!
//! 어느 것도 영속화되지 않습니다. 컨테이너 상태는 컨테이너 런타임이 소유하며
//! 여기서는 프로파일 이름으로만 참조합니다.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// 실행할 서비스 묶음 (compose 프로파일)
///
/// 한 번의 실행에는 정확히 하나의 프로파일만 활성화됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceProfile {
    /// 프로파일 없음 -- 애플리케이션 서비스만 기동
    #[default]
    None,
    /// 단독 브라우저 컨테이너 (standalone)
    Test,
    /// Selenium Grid (hub + 노드)
    Grid,
}

impl ServiceProfile {
    /// `docker compose --profile` 에 넘길 이름. `None` 이면 플래그를 생략합니다.
    pub fn compose_profile(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Test => Some("test"),
            Self::Grid => Some("grid"),
        }
    }
}

impl fmt::Display for ServiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Test => write!(f, "test"),
            Self::Grid => write!(f, "grid"),
        }
    }
}

/// 병렬 워커에 테스트를 나누는 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionMode {
    /// 파일 단위 분배 (`--dist loadfile`)
    #[default]
    ByFile,
    /// 테스트 단위 분배 (`--dist load`)
    ByTest,
}

impl DistributionMode {
    /// pytest-xdist `--dist` 인자 값
    pub fn as_runner_arg(&self) -> &'static str {
        match self {
            Self::ByFile => "loadfile",
            Self::ByTest => "load",
        }
    }
}

impl FromStr for DistributionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "by-file" | "file" | "loadfile" => Ok(Self::ByFile),
            "by-test" | "test" | "load" => Ok(Self::ByTest),
            other => Err(format!(
                "unknown distribution mode '{other}' (expected: by-file, by-test)"
            )),
        }
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByFile => write!(f, "by-file"),
            Self::ByTest => write!(f, "by-test"),
        }
    }
}

/// 헬스 체크 대상과 대기 예산
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    /// 폴링할 URL
    pub target: String,
    /// 전체 대기 예산
    pub timeout: Duration,
    /// 폴링 간격
    pub interval: Duration,
}

impl HealthCheckSpec {
    pub fn new(target: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
            interval,
        }
    }
}

/// 테스트 러너 한 번의 호출 명세
///
/// 한 번 만들어지면 변경되지 않습니다. `with_*` 메서드는 새 값을 돌려줍니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunSpec {
    /// 테스트 선택자 (파일, 클래스, 메서드 패턴)
    pub selector: String,
    /// 병렬 워커 수
    pub concurrency: NonZeroUsize,
    /// 분배 방식
    pub distribution: DistributionMode,
    /// HTML 리포트 출력 경로
    pub report_path: PathBuf,
    /// 러너에 그대로 전달할 추가 인자
    pub extra_args: Vec<String>,
    /// 러너 프로세스에 설정할 환경변수
    pub env: Vec<(String, String)>,
    /// 벽시계 시간 예산 (부하 테스트 지속 시간)
    pub time_budget: Option<Duration>,
}

impl TestRunSpec {
    pub fn new(selector: impl Into<String>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            selector: selector.into(),
            concurrency: NonZeroUsize::MIN,
            distribution: DistributionMode::default(),
            report_path: report_path.into(),
            extra_args: Vec::new(),
            env: Vec::new(),
            time_budget: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_distribution(mut self, distribution: DistributionMode) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// 테스트 실행 결과
///
/// Result Reporter가 소비하며, `exit_code`는 그대로 프로세스 종료 코드가 됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// 실행 식별자 (로그 상관관계용)
    pub run_id: Uuid,
    /// 러너의 원본 종료 코드
    pub exit_code: i32,
    /// 러너 실행 시간
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
    /// 리포트 경로
    pub report_path: PathBuf,
    /// 종료 시점에 리포트 파일이 존재했는지 여부
    pub report_exists: bool,
}

impl RunResult {
    pub fn new(exit_code: i32, duration: Duration, report_path: &Path) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            exit_code,
            duration,
            report_path: report_path.to_path_buf(),
            report_exists: report_path.is_file(),
        }
    }

    /// 모든 테스트가 통과했는지 여부
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Grid `/status` 조회 결과
///
/// 폴링마다 새로 가져오며 이력은 보관하지 않습니다.
#[derive(Debug, Clone, Serialize)]
pub struct GridStatus {
    /// 엔드포인트 응답 여부
    pub reachable: bool,
    /// 원본 응답 본문 (불투명 JSON)
    pub payload: Option<serde_json::Value>,
}

impl GridStatus {
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            payload: None,
        }
    }

    pub fn reachable(payload: serde_json::Value) -> Self {
        Self {
            reachable: true,
            payload: Some(payload),
        }
    }

    fn value(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref().and_then(|p| p.get("value"))
    }

    /// Grid가 새 세션을 받을 준비가 되었는지 (`value.ready`)
    pub fn is_ready(&self) -> bool {
        self.value()
            .and_then(|v| v.get("ready"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Grid가 보고한 메시지 (`value.message`)
    pub fn message(&self) -> Option<&str> {
        self.value()
            .and_then(|v| v.get("message"))
            .and_then(serde_json::Value::as_str)
    }

    /// 등록된 노드 목록 (`value.nodes`)
    pub fn nodes(&self) -> &[serde_json::Value] {
        self.value()
            .and_then(|v| v.get("nodes"))
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// 모든 노드에서 세션이 점유된 슬롯 수
    pub fn session_count(&self) -> usize {
        self.nodes().iter().map(active_sessions).sum()
    }
}

/// 노드 하나에서 세션이 점유된 슬롯 수
pub fn active_sessions(node: &serde_json::Value) -> usize {
    node.get("slots")
        .and_then(serde_json::Value::as_array)
        .map(|slots| {
            slots
                .iter()
                .filter(|slot| slot.get("session").is_some_and(|s| !s.is_null()))
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_compose_names() {
        assert_eq!(ServiceProfile::None.compose_profile(), None);
        assert_eq!(ServiceProfile::Test.compose_profile(), Some("test"));
        assert_eq!(ServiceProfile::Grid.compose_profile(), Some("grid"));
    }

    #[test]
    fn distribution_runner_args() {
        assert_eq!(DistributionMode::ByFile.as_runner_arg(), "loadfile");
        assert_eq!(DistributionMode::ByTest.as_runner_arg(), "load");
    }

    #[test]
    fn distribution_from_str() {
        assert_eq!(
            "by-file".parse::<DistributionMode>(),
            Ok(DistributionMode::ByFile)
        );
        assert_eq!(
            "load".parse::<DistributionMode>(),
            Ok(DistributionMode::ByTest)
        );
        assert!("round-robin".parse::<DistributionMode>().is_err());
    }

    #[test]
    fn test_run_spec_defaults() {
        let spec = TestRunSpec::new("tests/test_photo_app.py", "tests/reports/report.html");
        assert_eq!(spec.concurrency.get(), 1);
        assert_eq!(spec.distribution, DistributionMode::ByFile);
        assert!(spec.extra_args.is_empty());
        assert!(spec.time_budget.is_none());
    }

    #[test]
    fn test_run_spec_builders() {
        let spec = TestRunSpec::new("tests", "report.html")
            .with_concurrency(NonZeroUsize::new(20).unwrap())
            .with_distribution(DistributionMode::ByTest)
            .with_extra_args(vec!["-v".to_owned()])
            .with_env("PHOTO_APP_URL", "http://app:8080")
            .with_time_budget(Duration::from_secs(300));
        assert_eq!(spec.concurrency.get(), 20);
        assert_eq!(spec.distribution, DistributionMode::ByTest);
        assert_eq!(spec.extra_args, vec!["-v"]);
        assert_eq!(spec.env[0].0, "PHOTO_APP_URL");
        assert_eq!(spec.time_budget, Some(Duration::from_secs(300)));
    }

    #[test]
    fn run_result_passed_only_on_zero() {
        let path = Path::new("/nonexistent/report.html");
        assert!(RunResult::new(0, Duration::ZERO, path).passed());
        assert!(!RunResult::new(1, Duration::ZERO, path).passed());
        assert!(!RunResult::new(124, Duration::ZERO, path).passed());
    }

    #[test]
    fn run_result_detects_missing_report() {
        let result = RunResult::new(0, Duration::ZERO, Path::new("/nonexistent/report.html"));
        assert!(!result.report_exists);
    }

    #[test]
    fn run_result_detects_existing_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        std::fs::write(&path, "<html></html>").unwrap();
        let result = RunResult::new(1, Duration::from_secs(3), &path);
        assert!(result.report_exists);
    }

    #[test]
    fn run_result_serializes_duration_as_seconds() {
        let result = RunResult::new(
            0,
            Duration::from_millis(1500),
            Path::new("report.html"),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration_secs"].as_f64(), Some(1.5));
        assert_eq!(json["exit_code"].as_i64(), Some(0));
    }

    fn sample_status() -> serde_json::Value {
        json!({
            "value": {
                "ready": true,
                "message": "Selenium Grid ready.",
                "nodes": [
                    {
                        "uri": "http://172.18.0.4:5555",
                        "availability": "UP",
                        "maxSessions": 2,
                        "slots": [
                            {"session": {"sessionId": "a1"}, "stereotype": {"browserName": "chrome"}},
                            {"session": null, "stereotype": {"browserName": "chrome"}}
                        ]
                    },
                    {
                        "uri": "http://172.18.0.5:5555",
                        "availability": "UP",
                        "maxSessions": 1,
                        "slots": [
                            {"session": {"sessionId": "b2"}, "stereotype": {"browserName": "firefox"}}
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn grid_status_counts_nodes_and_sessions() {
        let status = GridStatus::reachable(sample_status());
        assert!(status.is_ready());
        assert_eq!(status.node_count(), 2);
        assert_eq!(status.session_count(), 2);
        assert_eq!(status.message(), Some("Selenium Grid ready."));
    }

    #[test]
    fn grid_status_unreachable_is_empty() {
        let status = GridStatus::unreachable();
        assert!(!status.reachable);
        assert!(!status.is_ready());
        assert_eq!(status.node_count(), 0);
        assert_eq!(status.session_count(), 0);
    }

    #[test]
    fn grid_status_tolerates_unexpected_payload() {
        let status = GridStatus::reachable(json!({"unexpected": [1, 2, 3]}));
        assert!(status.reachable);
        assert!(!status.is_ready());
        assert_eq!(status.node_count(), 0);
    }
}
