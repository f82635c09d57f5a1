//! 에러 타입 -- 도메인별 에러 정의

/// gridharness 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 환경 기동/정리 에러
    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// 헬스 게이트 실패
    #[error("health gate failed: {0}")]
    Gate(#[from] GateError),

    /// 테스트 러너 실행 에러
    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    /// Grid 상태 조회 에러
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// 성능 로그 분석 에러
    #[error("perf error: {0}")]
    Perf(#[from] PerfError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 환경 에러
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    /// 컨테이너 런타임을 실행할 수 없음
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// 프로파일 기동 실패 (포트 충돌, 이미지 누락 등)
    #[error("failed to start profile '{profile}': {reason}")]
    StartFailed { profile: String, reason: String },

    /// 프로파일 정리 실패
    #[error("failed to stop profile '{profile}': {reason}")]
    StopFailed { profile: String, reason: String },
}

/// 헬스 게이트 에러
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// 예산 내에 대상이 준비되지 않음
    #[error("{target} did not become ready within {waited_secs}s")]
    Timeout { target: String, waited_secs: u64 },
}

/// 테스트 러너 에러
///
/// 러너가 0이 아닌 코드로 종료하는 것은 에러가 아닙니다. 그 코드는 그대로 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// 러너 프로세스를 시작할 수 없음
    #[error("failed to launch '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// 러너 종료 대기 실패
    #[error("failed to wait for runner: {0}")]
    Wait(String),

    /// 잘못된 실행 명세
    #[error("invalid run spec: {0}")]
    InvalidSpec(String),

    /// 리포트 디렉토리 준비 실패
    #[error("cannot prepare report path {path}: {reason}")]
    Report { path: String, reason: String },
}

/// Grid 조회 에러
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// 엔드포인트에 연결할 수 없음
    #[error("{url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// 에러 상태 코드 응답
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// 응답 본문이 JSON이 아님
    #[error("invalid status payload: {0}")]
    InvalidPayload(String),
}

/// 성능 로그 분석 에러
#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    /// 로그 디렉토리를 읽을 수 없음
    #[error("cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    /// 로그 파일 파싱 실패
    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// 분석 결과 저장 실패
    #[error("cannot write {path}: {reason}")]
    Write { path: String, reason: String },
}
