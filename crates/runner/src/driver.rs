//! 러너 프로세스 실행
//!
//! 러너의 출력은 그대로 흘려보내고 (상속된 stdio) 종료 코드는 가공하지 않습니다.
//! 재시도는 없습니다.
//!
//! unix 에서는 러너를 자체 프로세스 그룹으로 띄웁니다. `timeout` 래퍼 아래의
//! 실제 러너까지 포함해, 대기 중인 실행이 취소되면 그룹 전체에 시그널을 보냅니다.

use std::future::Future;
use std::path::Path;
use std::process::ExitStatus;
#[cfg(unix)]
use std::time::Duration;

use gridharness_core::config::RunnerConfig;
use gridharness_core::error::RunnerError;
use gridharness_core::types::{RunResult, TestRunSpec};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::invocation::TestInvocation;

/// Trait abstracting a test-runner execution.
///
/// # Implementations
///
/// - [`ProcessDriver`]: spawns the configured runner command
/// - test mocks returning a canned exit code
pub trait TestDriver: Send + Sync + 'static {
    /// Runs the suite described by `spec` and returns its raw exit status.
    ///
    /// A non-zero exit is a successful `RunResult`, not an error.
    fn run(&self, spec: &TestRunSpec) -> impl Future<Output = Result<RunResult, RunnerError>> + Send;
}

/// 설정된 러너 명령을 자식 프로세스로 실행하는 드라이버
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    config: RunnerConfig,
}

impl ProcessDriver {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn invocation(&self, spec: &TestRunSpec) -> Result<TestInvocation, RunnerError> {
        TestInvocation::from_spec(&self.config, spec)
    }
}

impl TestDriver for ProcessDriver {
    async fn run(&self, spec: &TestRunSpec) -> Result<RunResult, RunnerError> {
        let invocation = self.invocation(spec)?;
        prepare_report_dir(&invocation.report_path).await?;

        info!(
            command = %invocation,
            concurrency = spec.concurrency.get(),
            distribution = %spec.distribution,
            "launching test runner"
        );

        let started = Instant::now();
        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| RunnerError::Spawn {
            program: invocation.program.clone(),
            reason: e.to_string(),
        })?;
        // child 보다 먼저 드롭됨: 그룹 시그널이 리더의 SIGKILL 보다 앞선다
        #[cfg(unix)]
        let mut group = ProcessGroup::new(child.id());

        let status = child
            .wait()
            .await
            .map_err(|e| RunnerError::Wait(e.to_string()))?;
        #[cfg(unix)]
        group.disarm();
        let exit_code = exit_code(status);
        let result = RunResult::new(exit_code, started.elapsed(), &invocation.report_path);

        if result.passed() {
            info!(run_id = %result.run_id, duration_secs = result.duration.as_secs_f64(), "test runner finished");
        } else {
            warn!(run_id = %result.run_id, exit_code, "test runner reported failures");
        }
        if !result.report_exists {
            warn!(path = %invocation.report_path.display(), "runner did not produce a report");
        }
        Ok(result)
    }
}

/// SIGTERM 후 남은 프로세스에 SIGKILL 을 보내기까지의 유예
#[cfg(unix)]
const KILL_GRACE: Duration = Duration::from_secs(3);

/// 러너 프로세스 그룹 가드
///
/// 러너가 끝나기 전에 드롭되면 (인터럽트로 실행 future 가 취소된 경우)
/// 그룹 전체에 SIGTERM 을 보내고, [`KILL_GRACE`] 뒤에도 남아 있으면 SIGKILL.
/// `timeout` 은 SIGKILL 을 전달하지 못하므로 리더만 죽여서는 러너가 고아로 남습니다.
#[cfg(unix)]
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

#[cfg(unix)]
impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            pgid: leader.and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    /// 러너가 정상적으로 끝났음
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        warn!(pgid, "test runner cancelled, terminating its process group");
        if !signal_group(pgid, libc::SIGTERM) {
            return;
        }
        std::thread::spawn(move || {
            std::thread::sleep(KILL_GRACE);
            // 시그널 0: 그룹에 살아 있는 프로세스가 있는지만 확인
            if signal_group(pgid, 0) {
                warn!(pgid, "test runner ignored SIGTERM, killing its process group");
                signal_group(pgid, libc::SIGKILL);
            }
        });
    }
}

/// `kill(-pgid, signal)`. 대상이 하나라도 있었으면 `true`
#[cfg(unix)]
fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> bool {
    // SAFETY: kill(2) 은 메모리를 건드리지 않으며 음수 pid 는 프로세스 그룹을 뜻함
    unsafe { libc::kill(-pgid, signal) == 0 }
}

/// 리포트 파일의 상위 디렉토리를 만듭니다.
async fn prepare_report_dir(report_path: &Path) -> Result<(), RunnerError> {
    match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RunnerError::Report {
                path: parent.display().to_string(),
                reason: e.to_string(),
            }),
        _ => Ok(()),
    }
}

/// 종료 상태 → 종료 코드. 시그널로 끝난 경우 셸 관례대로 128 + 시그널 번호
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
