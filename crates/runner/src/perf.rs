//! 실행 로그 분석
//!
//! 테스트 스위트의 시간 추적기는 워커마다 `execution_*.json` 파일을 남깁니다.
//! 여기서는 그 파일들을 모아 전체 실행 시간과 체크포인트별 통계를 계산합니다.
//!
//! 읽을 수 없거나 형식이 틀린 파일은 건너뛰고 [`PerfAnalysis::skipped`]에 기록합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use gridharness_core::error::PerfError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const LOG_PREFIX: &str = "execution_";

/// 실행 로그 한 개 (`execution_*.json`)
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionLog {
    #[serde(default = "unknown")]
    pub test_name: String,
    #[serde(default = "unknown")]
    pub task_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub total_execution_time: f64,
    /// 체크포인트 이름 → 기록. 객체가 아닌 항목은 분석에서 무시됩니다.
    #[serde(default)]
    pub checkpoints: BTreeMap<String, serde_json::Value>,
}

fn unknown() -> String {
    "unknown".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
struct CheckpointRecord {
    #[serde(default)]
    time_since_last: f64,
    #[serde(default)]
    total_elapsed: f64,
}

/// 표본 통계
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    /// 표본 표준편차. 표본이 하나면 0
    pub std_dev: f64,
}

impl TimeStats {
    /// 비어 있으면 `None`
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let mean = sum / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        let std_dev = if count > 1 {
            let var = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            sum,
            mean,
            median,
            std_dev,
        })
    }
}

/// 실행 한 건의 요약
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionDetail {
    pub test_name: String,
    pub task_id: String,
    pub timestamp: String,
    pub total_time: f64,
}

/// 체크포인트 하나의 통계
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointStats {
    pub name: String,
    pub count: usize,
    pub time_since_last: TimeStats,
    pub total_elapsed: TimeStats,
}

/// 누적 시간 평균 순위 항목
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointRank {
    pub name: String,
    pub avg_time_since_last: f64,
    pub avg_total_elapsed: f64,
    pub count: usize,
}

/// 건너뛴 파일
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// 분석 결과
#[derive(Debug, Clone, Serialize)]
pub struct PerfAnalysis {
    pub analysis_timestamp: String,
    pub total_executions: usize,
    pub execution_details: Vec<ExecutionDetail>,
    pub overall_statistics: TimeStats,
    pub checkpoint_statistics: Vec<CheckpointStats>,
    /// 누적 시간 평균 오름차순
    pub ranking: Vec<CheckpointRank>,
    pub skipped: Vec<SkippedFile>,
}

/// 저장된 파일 경로
#[derive(Debug, Clone, Serialize)]
pub struct SavedAnalysis {
    pub json_path: PathBuf,
    pub report_path: PathBuf,
}

/// `dir` 에서 `<prefix>*.json` 파일을 이름순으로 읽어 역직렬화합니다.
///
/// 디렉토리 자체를 읽을 수 없으면 에러, 개별 파일 실패는 `skipped`로 돌려줍니다.
pub(crate) async fn load_json_files<T: DeserializeOwned>(
    dir: &Path,
    prefix: &str,
) -> Result<(Vec<T>, Vec<SkippedFile>), PerfError> {
    let read_err = |e: std::io::Error| PerfError::Read {
        path: dir.display().to_string(),
        reason: e.to_string(),
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".json"));
        if matches && tokio::fs::metadata(entry.path()).await.is_ok_and(|m| m.is_file()) {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut loaded = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();
    for path in paths {
        match read_json(&path).await {
            Ok(value) => {
                debug!(path = %path.display(), "loaded");
                loaded.push(value);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok((loaded, skipped))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PerfError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PerfError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&content).map_err(|e| PerfError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// 파일 하나를 씁니다. 상위 디렉토리가 없으면 만듭니다.
pub(crate) async fn write_file(path: &Path, contents: String) -> Result<(), PerfError> {
    let write_err = |e: std::io::Error| PerfError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, contents).await.map_err(write_err)
}

/// 디렉토리의 `execution_*.json` 파일을 이름순으로 읽습니다.
pub async fn load_execution_logs(
    dir: &Path,
) -> Result<(Vec<ExecutionLog>, Vec<SkippedFile>), PerfError> {
    load_json_files(dir, LOG_PREFIX).await
}

/// 로그 목록을 분석합니다. 로그가 없으면 `None`
pub fn analyze(logs: &[ExecutionLog]) -> Option<PerfAnalysis> {
    let totals: Vec<f64> = logs.iter().map(|l| l.total_execution_time).collect();
    let overall_statistics = TimeStats::from_samples(&totals)?;

    let mut samples: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for log in logs {
        for (name, raw) in &log.checkpoints {
            if !raw.is_object() {
                continue;
            }
            let Ok(record) = serde_json::from_value::<CheckpointRecord>(raw.clone()) else {
                continue;
            };
            let entry = samples.entry(name.as_str()).or_default();
            entry.0.push(record.time_since_last);
            entry.1.push(record.total_elapsed);
        }
    }

    let checkpoint_statistics: Vec<CheckpointStats> = samples
        .into_iter()
        .filter_map(|(name, (since_last, elapsed))| {
            Some(CheckpointStats {
                name: name.to_owned(),
                count: since_last.len(),
                time_since_last: TimeStats::from_samples(&since_last)?,
                total_elapsed: TimeStats::from_samples(&elapsed)?,
            })
        })
        .collect();

    let mut ranking: Vec<CheckpointRank> = checkpoint_statistics
        .iter()
        .map(|cp| CheckpointRank {
            name: cp.name.clone(),
            avg_time_since_last: cp.time_since_last.mean,
            avg_total_elapsed: cp.total_elapsed.mean,
            count: cp.count,
        })
        .collect();
    ranking.sort_by(|a, b| a.avg_total_elapsed.total_cmp(&b.avg_total_elapsed));

    Some(PerfAnalysis {
        analysis_timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        total_executions: logs.len(),
        execution_details: logs
            .iter()
            .map(|l| ExecutionDetail {
                test_name: l.test_name.clone(),
                task_id: l.task_id.clone(),
                timestamp: l.timestamp.clone(),
                total_time: l.total_execution_time,
            })
            .collect(),
        overall_statistics,
        checkpoint_statistics,
        ranking,
        skipped: Vec::new(),
    })
}

/// 디렉토리를 읽어 분석합니다. 유효한 로그가 하나도 없으면 `None`
pub async fn analyze_dir(dir: &Path) -> Result<Option<PerfAnalysis>, PerfError> {
    let (logs, skipped) = load_execution_logs(dir).await?;
    info!(dir = %dir.display(), logs = logs.len(), skipped = skipped.len(), "analyzing execution logs");
    Ok(analyze(&logs).map(|mut analysis| {
        analysis.skipped = skipped;
        analysis
    }))
}

impl PerfAnalysis {
    /// `parallel_analysis_<ts>.json`과 `parallel_report_<ts>.txt`를 `dir`에 저장합니다.
    pub async fn save(&self, dir: &Path) -> Result<SavedAnalysis, PerfError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let json_path = dir.join(format!("parallel_analysis_{stamp}.json"));
        let report_path = dir.join(format!("parallel_report_{stamp}.txt"));

        let json = serde_json::to_string_pretty(self).map_err(|e| PerfError::Write {
            path: json_path.display().to_string(),
            reason: e.to_string(),
        })?;
        write_file(&json_path, json).await?;
        write_file(&report_path, self.to_string()).await?;

        info!(json = %json_path.display(), report = %report_path.display(), "saved analysis");
        Ok(SavedAnalysis {
            json_path,
            report_path,
        })
    }
}

/// 사람이 읽는 텍스트 리포트
impl fmt::Display for PerfAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(f, "{rule}")?;
        writeln!(f, "Parallel execution performance report")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Analyzed at: {}", self.analysis_timestamp)?;
        writeln!(f, "Executions:  {}", self.total_executions)?;

        let o = &self.overall_statistics;
        writeln!(f)?;
        writeln!(f, "Overall execution time:")?;
        writeln!(f, "  mean:    {:.3}s", o.mean)?;
        writeln!(f, "  min:     {:.3}s", o.min)?;
        writeln!(f, "  max:     {:.3}s", o.max)?;
        writeln!(f, "  median:  {:.3}s", o.median)?;
        writeln!(f, "  std dev: {:.3}s", o.std_dev)?;
        writeln!(f, "  total:   {:.3}s", o.sum)?;

        if !self.ranking.is_empty() {
            writeln!(f)?;
            writeln!(f, "Checkpoints by mean cumulative time:")?;
            for (i, cp) in self.ranking.iter().enumerate() {
                writeln!(
                    f,
                    "  {:2}. {:<30} mean: {:.3}s (since last: {:.3}s) runs: {}",
                    i + 1,
                    cp.name,
                    cp.avg_total_elapsed,
                    cp.avg_time_since_last,
                    cp.count
                )?;
            }

            writeln!(f)?;
            writeln!(f, "Checkpoint details:")?;
            for cp in &self.checkpoint_statistics {
                writeln!(f)?;
                writeln!(f, "  {} (runs: {})", cp.name, cp.count)?;
                for (label, stats) in [
                    ("since last", &cp.time_since_last),
                    ("cumulative", &cp.total_elapsed),
                ] {
                    writeln!(
                        f,
                        "     {label:<10} mean {:.3}s  range {:.3}s ~ {:.3}s  std dev {:.3}s",
                        stats.mean, stats.min, stats.max, stats.std_dev
                    )?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "Executions:")?;
        for (i, d) in self.execution_details.iter().enumerate() {
            writeln!(
                f,
                "  {:2}. test: {:<20} task: {:<15} time: {:.3}s",
                i + 1,
                d.test_name,
                d.task_id,
                d.total_time
            )?;
        }

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped files:")?;
            for s in &self.skipped {
                writeln!(f, "  {}: {}", s.path.display(), s.reason)?;
            }
        }

        write!(f, "{rule}")
    }
}
