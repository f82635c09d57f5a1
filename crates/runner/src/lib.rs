//! gridharness 테스트 러너 크레이트
//!
//! - [`invocation`]: `TestRunSpec` → 러너 명령줄
//! - [`driver`]: 러너 프로세스 실행 (`TestDriver` trait, `ProcessDriver`)
//! - [`perf`]: 러너가 남긴 `execution_*.json` 실행 로그 통계
//! - [`trends`]: `performance_report_*.json` 액션별 통계와 HTML 리포트

pub mod driver;
pub mod invocation;
pub mod perf;
pub mod trends;

pub use driver::{ProcessDriver, TestDriver};
pub use invocation::TestInvocation;
pub use perf::{PerfAnalysis, TimeStats};
pub use trends::TrendAnalysis;
