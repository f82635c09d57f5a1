//! gridharness 공통 크레이트
//!
//! 환경, 러너, 오케스트레이터, CLI가 공유하는 도메인 타입과 에러, 설정을 정의합니다.
//!
//! - [`config`]: `gridharness.toml` 로딩과 환경변수 오버라이드
//! - [`error`]: 도메인별 에러 타입
//! - [`types`]: 서비스 프로파일, 실행 명세, 실행 결과, Grid 상태

pub mod config;
pub mod error;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, EnvironmentError, GateError, GridError, HarnessError, PerfError, RunnerError,
};

// 설정
pub use config::HarnessConfig;

// 도메인 타입
pub use types::{
    DistributionMode, GridStatus, HealthCheckSpec, RunResult, ServiceProfile, TestRunSpec,
};
