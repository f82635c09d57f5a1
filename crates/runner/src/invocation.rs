//! 러너 명령줄 구성
//!
//! ```text
//! [timeout SECS] <runner command...> <selector> -n <N> --dist <loadfile|load>
//!     --html=<report> --self-contained-html <extra...>
//! ```

use std::fmt;
use std::path::PathBuf;

use gridharness_core::config::RunnerConfig;
use gridharness_core::error::RunnerError;
use gridharness_core::types::TestRunSpec;

/// 실행 가능한 형태로 풀어낸 러너 호출
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub report_path: PathBuf,
}

impl TestInvocation {
    pub fn from_spec(config: &RunnerConfig, spec: &TestRunSpec) -> Result<Self, RunnerError> {
        let Some((runner, runner_args)) = config.command.split_first() else {
            return Err(RunnerError::InvalidSpec(
                "runner command is empty".to_owned(),
            ));
        };
        if spec.selector.trim().is_empty() {
            return Err(RunnerError::InvalidSpec(
                "test selector is empty".to_owned(),
            ));
        }

        let mut program = runner.clone();
        let mut args = Vec::new();

        if let Some(budget) = spec.time_budget {
            let secs = budget.as_secs();
            if secs == 0 {
                return Err(RunnerError::InvalidSpec(
                    "time budget must be at least 1s".to_owned(),
                ));
            }
            if config.timeout_program.is_empty() {
                return Err(RunnerError::InvalidSpec(
                    "a time budget needs runner.timeout_program".to_owned(),
                ));
            }
            program = config.timeout_program.clone();
            args.push(secs.to_string());
            args.push(runner.clone());
        }

        args.extend(runner_args.iter().cloned());
        args.push(spec.selector.clone());
        args.push("-n".to_owned());
        args.push(spec.concurrency.to_string());
        args.push("--dist".to_owned());
        args.push(spec.distribution.as_runner_arg().to_owned());
        args.push(format!("--html={}", spec.report_path.display()));
        args.push("--self-contained-html".to_owned());
        args.extend(spec.extra_args.iter().cloned());

        Ok(Self {
            program,
            args,
            env: spec.env.clone(),
            report_path: spec.report_path.clone(),
        })
    }

    /// 프로그램 이름을 포함한 전체 명령줄
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for TestInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line().join(" "))
    }
}
