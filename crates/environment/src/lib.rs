//! gridharness 컨테이너 환경 크레이트
//!
//! # Module Structure
//!
//! - [`compose`]: compose CLI 추상화 (`ComposeRuntime` trait, `DockerCompose`)
//! - [`lifecycle`]: 스코프 기반 환경 수명주기 (`Environment` guard)
//! - [`probe`]: 제한된 예산 안에서의 HTTP 헬스 폴링 (`HealthProber`)
//! - [`grid`]: Selenium Grid `/status` 조회 (`GridClient`, `NodeSummary`)
//!
//! # Architecture
//!
//! ```text
//! Environment::acquire(profile)
//!        |
//!   ComposeRuntime.up()  ──>  docker compose --profile P up -d
//!        |
//!   HealthProber.wait_until_ready()  ──>  GET <app>/
//!        |
//!   (test run)
//!        |
//!   Environment::release()  ──>  docker compose --profile P down
//! ```

pub mod compose;
pub mod grid;
pub mod lifecycle;
pub mod probe;

// --- Public API Re-exports ---

pub use compose::{ComposeRuntime, DockerCompose};
pub use grid::{GridClient, NodeSummary};
pub use lifecycle::{Environment, LifecycleOptions};
pub use probe::{HealthProber, Readiness, poll_until};
