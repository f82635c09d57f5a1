//! Compose CLI abstraction for testability.
//!
//! The [`ComposeRuntime`] trait abstracts `docker compose`, allowing
//! production code to use [`DockerCompose`] while tests use a recording mock.
//!
//! # Command shapes
//!
//! ```text
//! start: docker compose [-f FILE] [-p PROJECT] [--profile P] up -d [--build]
//! stop:  docker compose [-f FILE] [-p PROJECT] [--profile P] down --remove-orphans
//! ```
//!
//! `ServiceProfile::None` renders no `--profile` flag.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Output;

use gridharness_core::config::EnvironmentConfig;
use gridharness_core::error::EnvironmentError;
use gridharness_core::types::ServiceProfile;
use tracing::debug;

/// 에러 메시지에 포함할 stderr 최대 줄 수
const STDERR_TAIL_LINES: usize = 5;

/// Trait abstracting compose operations.
///
/// All lifecycle calls go through this trait. The trait is `Send + Sync + 'static`
/// so a runtime can be shared behind an `Arc` by the guard and the pipeline.
///
/// # Implementations
///
/// - [`DockerCompose`]: drives the container runtime's `compose` subcommand
/// - test mocks recording every call
pub trait ComposeRuntime: Send + Sync + 'static {
    /// Brings up the services of `profile` in detached mode.
    ///
    /// # Errors
    ///
    /// - `EnvironmentError::RuntimeUnavailable`: the runtime binary cannot be executed
    /// - `EnvironmentError::StartFailed`: non-zero exit (port bound, missing image, ...)
    fn up(
        &self,
        profile: ServiceProfile,
    ) -> impl Future<Output = Result<(), EnvironmentError>> + Send;

    /// Tears down the services of `profile`.
    ///
    /// Must succeed when nothing is running.
    fn down(
        &self,
        profile: ServiceProfile,
    ) -> impl Future<Output = Result<(), EnvironmentError>> + Send;

    /// Returns the compose version string. Used as an availability check.
    fn version(&self) -> impl Future<Output = Result<String, EnvironmentError>> + Send;

    /// Synchronous teardown for `Drop` paths where no executor is available.
    fn down_blocking(&self, profile: ServiceProfile) -> Result<(), EnvironmentError>;
}

/// `docker compose` (or `podman compose`) driven through its CLI.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    program: String,
    compose_file: Option<PathBuf>,
    project_name: Option<String>,
    build: bool,
}

impl Default for DockerCompose {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCompose {
    /// `program compose ...` 형태로 실행할 런타임을 만듭니다.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            compose_file: None,
            project_name: None,
            build: false,
        }
    }

    /// `[environment]` 설정에서 만듭니다. 빈 문자열은 "지정 안 함"입니다.
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let mut compose = Self::new(config.runtime.clone()).with_build(config.build);
        if !config.compose_file.is_empty() {
            compose = compose.with_compose_file(&config.compose_file);
        }
        if !config.project_name.is_empty() {
            compose = compose.with_project_name(&config.project_name);
        }
        compose
    }

    pub fn with_compose_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.compose_file = Some(path.into());
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn with_build(mut self, build: bool) -> Self {
        self.build = build;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn base_args(&self, profile: ServiceProfile) -> Vec<String> {
        let mut args = vec!["compose".to_owned()];
        if let Some(file) = &self.compose_file {
            args.push("-f".to_owned());
            args.push(file.display().to_string());
        }
        if let Some(project) = &self.project_name {
            args.push("-p".to_owned());
            args.push(project.clone());
        }
        if let Some(name) = profile.compose_profile() {
            args.push("--profile".to_owned());
            args.push(name.to_owned());
        }
        args
    }

    /// `up` 인자 목록 (프로그램 이름 제외)
    pub fn up_args(&self, profile: ServiceProfile) -> Vec<String> {
        let mut args = self.base_args(profile);
        args.extend(["up".to_owned(), "-d".to_owned()]);
        if self.build {
            args.push("--build".to_owned());
        }
        args
    }

    /// `down` 인자 목록 (프로그램 이름 제외)
    pub fn down_args(&self, profile: ServiceProfile) -> Vec<String> {
        let mut args = self.base_args(profile);
        args.extend(["down".to_owned(), "--remove-orphans".to_owned()]);
        args
    }

    async fn run(&self, args: &[String]) -> Result<Output, EnvironmentError> {
        debug!(program = %self.program, args = ?args, "running compose command");
        tokio::process::Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, e: io::Error) -> EnvironmentError {
        EnvironmentError::RuntimeUnavailable(format!("{}: {e}", self.program))
    }
}

impl ComposeRuntime for DockerCompose {
    async fn up(&self, profile: ServiceProfile) -> Result<(), EnvironmentError> {
        let output = self.run(&self.up_args(profile)).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(EnvironmentError::StartFailed {
                profile: profile.to_string(),
                reason: failure_reason(&output),
            })
        }
    }

    async fn down(&self, profile: ServiceProfile) -> Result<(), EnvironmentError> {
        let output = self.run(&self.down_args(profile)).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(EnvironmentError::StopFailed {
                profile: profile.to_string(),
                reason: failure_reason(&output),
            })
        }
    }

    async fn version(&self) -> Result<String, EnvironmentError> {
        let output = self
            .run(&["compose".to_owned(), "version".to_owned()])
            .await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
        } else {
            Err(EnvironmentError::RuntimeUnavailable(failure_reason(
                &output,
            )))
        }
    }

    fn down_blocking(&self, profile: ServiceProfile) -> Result<(), EnvironmentError> {
        let output = std::process::Command::new(&self.program)
            .args(self.down_args(profile))
            .output()
            .map_err(|e| self.unavailable(e))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(EnvironmentError::StopFailed {
                profile: profile.to_string(),
                reason: failure_reason(&output),
            })
        }
    }
}

/// 종료 코드와 stderr 마지막 몇 줄로 실패 사유를 만듭니다.
fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("; ");
    match (output.status.code(), tail.is_empty()) {
        (Some(code), true) => format!("exit code {code}"),
        (Some(code), false) => format!("exit code {code}: {tail}"),
        (None, true) => "terminated by signal".to_owned(),
        (None, false) => format!("terminated by signal: {tail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_args_for_each_profile() {
        let compose = DockerCompose::default();
        assert_eq!(compose.up_args(ServiceProfile::None), ["compose", "up", "-d"]);
        assert_eq!(
            compose.up_args(ServiceProfile::Test),
            ["compose", "--profile", "test", "up", "-d"]
        );
        assert_eq!(
            compose.up_args(ServiceProfile::Grid),
            ["compose", "--profile", "grid", "up", "-d"]
        );
    }

    #[test]
    fn down_args_remove_orphans() {
        let compose = DockerCompose::default();
        assert_eq!(
            compose.down_args(ServiceProfile::Grid),
            ["compose", "--profile", "grid", "down", "--remove-orphans"]
        );
    }

    #[test]
    fn file_project_and_build_flags() {
        let compose = DockerCompose::new("podman")
            .with_compose_file("deploy/compose.yml")
            .with_project_name("photo")
            .with_build(true);
        assert_eq!(compose.program(), "podman");
        assert_eq!(
            compose.up_args(ServiceProfile::Test),
            [
                "compose",
                "-f",
                "deploy/compose.yml",
                "-p",
                "photo",
                "--profile",
                "test",
                "up",
                "-d",
                "--build"
            ]
        );
        // --build 는 up 에만
        assert!(!compose.down_args(ServiceProfile::Test).contains(&"--build".to_owned()));
    }

    #[test]
    fn from_config_treats_empty_as_unset() {
        let config = EnvironmentConfig::default();
        let compose = DockerCompose::from_config(&config);
        assert_eq!(compose.program(), "docker");
        assert_eq!(compose.up_args(ServiceProfile::None), ["compose", "up", "-d"]);
    }

    #[tokio::test]
    async fn missing_runtime_is_unavailable() {
        let compose = DockerCompose::new("gridharness-no-such-runtime");
        let err = compose.up(ServiceProfile::Test).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::RuntimeUnavailable(_)));

        let err = compose.down_blocking(ServiceProfile::Test).unwrap_err();
        assert!(matches!(err, EnvironmentError::RuntimeUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_start_failure() {
        // `false compose ... up -d` 는 1로 종료
        let compose = DockerCompose::new("false");
        let err = compose.up(ServiceProfile::Grid).await.unwrap_err();
        match err {
            EnvironmentError::StartFailed { profile, reason } => {
                assert_eq!(profile, "grid");
                assert!(reason.contains("exit code 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// 프로젝트 상태를 파일로 흉내 내는 compose 스텁.
    /// 실제 런타임처럼, 올라온 것이 없을 때의 down 은 경고만 남기고 성공합니다.
    #[cfg(unix)]
    fn stateful_runtime(dir: &std::path::Path) -> DockerCompose {
        use std::os::unix::fs::PermissionsExt;

        let state = dir.join("running");
        let script = dir.join("fake-docker");
        let body = format!(
            r#"#!/bin/sh
case " $* " in
  *" up "*) touch '{state}' ;;
  *" down "*)
    if [ -e '{state}' ]; then rm '{state}'; else
      echo "Warning: No resource found to remove" >&2
    fi ;;
esac
"#,
            state = state.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        DockerCompose::new(script.display().to_string())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_is_idempotent_for_every_profile() {
        let dir = tempfile::tempdir().unwrap();
        let compose = stateful_runtime(dir.path());
        let running = dir.path().join("running");

        for profile in [ServiceProfile::None, ServiceProfile::Test, ServiceProfile::Grid] {
            // 아무것도 없을 때
            compose.down(profile).await.unwrap();
            compose.down_blocking(profile).unwrap();

            compose.up(profile).await.unwrap();
            assert!(running.exists());
            compose.down(profile).await.unwrap();
            assert!(!running.exists());
            compose.down(profile).await.unwrap();
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_stop_is_stop_failure() {
        let compose = DockerCompose::new("false");
        let err = compose.down(ServiceProfile::Test).await.unwrap_err();
        assert!(matches!(err, EnvironmentError::StopFailed { ref profile, .. } if profile == "test"));
        let err = compose.down_blocking(ServiceProfile::Test).unwrap_err();
        assert!(matches!(err, EnvironmentError::StopFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn acquire_and_release_against_runtime() {
        use crate::lifecycle::{Environment, LifecycleOptions};

        let dir = tempfile::tempdir().unwrap();
        let runtime = std::sync::Arc::new(stateful_runtime(dir.path()));
        let env = Environment::acquire(runtime, ServiceProfile::Test, LifecycleOptions::default())
            .await
            .unwrap();
        assert!(dir.path().join("running").exists());

        env.release().await.unwrap();
        assert!(!dir.path().join("running").exists());
    }
}
