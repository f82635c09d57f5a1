//! 액션별 성능 리포트 분석
//!
//! 단일 브라우저 스위트는 실행마다 `performance_report_<ts>.json` 을 남깁니다
//! (`test_session`, `metrics: [{action, duration, status}]`). 여러 리포트의
//! 측정값을 액션별로 묶어 통계를 내고, 가장 느린 액션 세 개에 평가를 붙입니다.
//!
//! 병렬 실행 로그([`crate::perf`])가 없을 때 쓰는 두 번째 분석 경로입니다.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use gridharness_core::error::PerfError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::perf::{SkippedFile, TimeStats, load_json_files, write_file};

const REPORT_PREFIX: &str = "performance_report_";

/// 평가 대상 (평균 시간 상위)
const SLOWEST_ACTIONS: usize = 3;

/// 기본 HTML 리포트 파일 이름
pub const HTML_REPORT_NAME: &str = "performance_report.html";

/// 리포트 파일 한 개
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceReport {
    #[serde(default)]
    pub test_session: String,
    #[serde(default)]
    pub metrics: Vec<ActionMetric>,
}

/// 액션 한 번의 측정값
#[derive(Debug, Clone, Deserialize)]
pub struct ActionMetric {
    pub action: String,
    /// 초
    pub duration: f64,
    /// `success` 또는 `error`
    #[serde(default)]
    pub status: String,
}

impl ActionMetric {
    fn failed(&self) -> bool {
        self.status == "error"
    }
}

/// 액션 하나의 통계
#[derive(Debug, Clone, Serialize)]
pub struct ActionStats {
    pub action: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub errors: usize,
}

/// 평균 시간에 따른 평가
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    /// 2초 이하
    Good,
    /// 2초 초과
    ImprovementRecommended,
    /// 5초 초과
    ImprovementRequired,
}

impl Rating {
    pub fn from_mean(mean_secs: f64) -> Self {
        if mean_secs > 5.0 {
            Self::ImprovementRequired
        } else if mean_secs > 2.0 {
            Self::ImprovementRecommended
        } else {
            Self::Good
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "良好",
            Self::ImprovementRecommended => "改善推奨",
            Self::ImprovementRequired => "要改善",
        }
    }
}

/// 느린 액션에 대한 평가
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub action: String,
    pub mean: f64,
    pub rating: Rating,
    /// `Good` 이면 없음
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<&'static str>,
}

impl Suggestion {
    fn new(stats: &ActionStats) -> Self {
        let rating = Rating::from_mean(stats.mean);
        Self {
            action: stats.action.clone(),
            mean: stats.mean,
            rating,
            advice: (rating != Rating::Good).then(|| advice_for(&stats.action)),
        }
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.advice {
            Some(advice) => write!(f, "{}: {advice}", self.rating.label()),
            None => f.write_str(self.rating.label()),
        }
    }
}

/// 스위트가 기록하는 액션 이름별 개선 방향
fn advice_for(action: &str) -> &'static str {
    match action {
        "ホームページアクセス" => "ページサイズの最適化、CDN利用を検討",
        "ログインページ移動" => "ページ間のナビゲーション速度改善を検討",
        "ログイン処理" => "認証処理の最適化、セッション管理の見直し",
        "写真アップロード" => "ファイルサイズ圧縮、非同期アップロード実装",
        "アップロード結果確認" => "UIの応答性改善、プログレッシブローディング",
        _ => "パフォーマンス最適化を検討",
    }
}

/// 분석 결과
#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub analysis_timestamp: String,
    pub report_count: usize,
    pub metric_count: usize,
    /// 액션 이름순
    pub actions: Vec<ActionStats>,
    /// 평균 시간 내림차순, 최대 3개
    pub suggestions: Vec<Suggestion>,
    pub skipped: Vec<SkippedFile>,
}

/// 리포트 목록을 분석합니다. 측정값이 하나도 없으면 `None`
pub fn analyze_reports(reports: &[PerformanceReport]) -> Option<TrendAnalysis> {
    let mut by_action: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
    for metric in reports.iter().flat_map(|r| &r.metrics) {
        let entry = by_action.entry(metric.action.as_str()).or_default();
        entry.0.push(metric.duration);
        entry.1 += usize::from(metric.failed());
    }

    let actions: Vec<ActionStats> = by_action
        .into_iter()
        .filter_map(|(action, (durations, errors))| {
            let stats = TimeStats::from_samples(&durations)?;
            Some(ActionStats {
                action: action.to_owned(),
                count: stats.count,
                mean: stats.mean,
                std_dev: stats.std_dev,
                min: stats.min,
                max: stats.max,
                errors,
            })
        })
        .collect();
    if actions.is_empty() {
        return None;
    }

    let mut slowest: Vec<&ActionStats> = actions.iter().collect();
    slowest.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    let suggestions = slowest
        .into_iter()
        .take(SLOWEST_ACTIONS)
        .map(Suggestion::new)
        .collect();

    Some(TrendAnalysis {
        analysis_timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        report_count: reports.len(),
        metric_count: actions.iter().map(|a| a.count).sum(),
        actions,
        suggestions,
        skipped: Vec::new(),
    })
}

/// 디렉토리의 `performance_report_*.json` 을 읽어 분석합니다.
pub async fn analyze_reports_dir(dir: &Path) -> Result<Option<TrendAnalysis>, PerfError> {
    let (reports, skipped) = load_json_files::<PerformanceReport>(dir, REPORT_PREFIX).await?;
    info!(
        dir = %dir.display(),
        reports = reports.len(),
        skipped = skipped.len(),
        "analyzing performance reports"
    );
    Ok(analyze_reports(&reports).map(|mut analysis| {
        analysis.skipped = skipped;
        analysis
    }))
}

impl TrendAnalysis {
    /// HTML 리포트 뷰
    pub fn html(&self) -> HtmlReport<'_> {
        HtmlReport(self)
    }

    /// HTML 리포트를 `path` 에 씁니다.
    pub async fn save_html(&self, path: &Path) -> Result<PathBuf, PerfError> {
        write_file(path, self.html().to_string()).await?;
        info!(path = %path.display(), "saved HTML report");
        Ok(path.to_path_buf())
    }
}

impl fmt::Display for TrendAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Per-action performance ({} report(s), {} measurement(s))",
            self.report_count, self.metric_count
        )?;
        writeln!(f, "Analyzed at: {}", self.analysis_timestamp)?;
        writeln!(f)?;
        writeln!(
            f,
            "  {:<24} {:>9} {:>9} {:>9} {:>9} {:>6} {:>6}",
            "action", "mean", "std dev", "min", "max", "runs", "errors"
        )?;
        for a in &self.actions {
            writeln!(
                f,
                "  {:<24} {:>8.3}s {:>8.3}s {:>8.3}s {:>8.3}s {:>6} {:>6}",
                a.action, a.mean, a.std_dev, a.min, a.max, a.count, a.errors
            )?;
        }

        writeln!(f)?;
        write!(f, "Slowest actions:")?;
        for s in &self.suggestions {
            write!(f, "\n  {:<24} mean {:.3}s  {s}", s.action, s.mean)?;
        }

        if !self.skipped.is_empty() {
            write!(f, "\n\nSkipped files:")?;
            for s in &self.skipped {
                write!(f, "\n  {}: {}", s.path.display(), s.reason)?;
            }
        }
        Ok(())
    }
}

/// [`TrendAnalysis`] 의 HTML 표현
pub struct HtmlReport<'a>(&'a TrendAnalysis);

const HTML_STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; }
.header { background-color: #f0f0f0; padding: 20px; border-radius: 5px; }
.metrics { margin: 20px 0; }
.metric-item { background-color: #f9f9f9; padding: 10px; margin: 5px 0; border-radius: 3px; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }";

impl fmt::Display for HtmlReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analysis = self.0;
        writeln!(f, "<!DOCTYPE html>")?;
        writeln!(f, "<html lang=\"ja\">")?;
        writeln!(f, "<head>")?;
        writeln!(f, "<meta charset=\"UTF-8\">")?;
        writeln!(f, "<title>パフォーマンステストレポート</title>")?;
        writeln!(f, "<style>\n{HTML_STYLE}\n</style>")?;
        writeln!(f, "</head>")?;
        writeln!(f, "<body>")?;

        writeln!(f, "<div class=\"header\">")?;
        writeln!(f, "<h1>パフォーマンステストレポート</h1>")?;
        writeln!(f, "<p>生成日時: {}</p>", Escaped(&analysis.analysis_timestamp))?;
        writeln!(f, "<p>分析対象レポート数: {}</p>", analysis.report_count)?;
        writeln!(f, "</div>")?;

        writeln!(f, "<div class=\"metrics\">")?;
        writeln!(f, "<h2>アクション別統計</h2>")?;
        writeln!(f, "<table>")?;
        writeln!(
            f,
            "<tr><th>アクション</th><th>平均時間(秒)</th><th>標準偏差</th><th>最小時間</th><th>最大時間</th><th>実行回数</th><th>エラー</th></tr>"
        )?;
        for a in &analysis.actions {
            writeln!(
                f,
                "<tr><td>{}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{}</td><td>{}</td></tr>",
                Escaped(&a.action),
                a.mean,
                a.std_dev,
                a.min,
                a.max,
                a.count,
                a.errors
            )?;
        }
        writeln!(f, "</table>")?;
        writeln!(f, "</div>")?;

        writeln!(f, "<div class=\"metrics\">")?;
        writeln!(f, "<h2>推奨改善点</h2>")?;
        for s in &analysis.suggestions {
            writeln!(
                f,
                "<div class=\"metric-item\"><strong>{}</strong>: 平均{:.3}秒 - {}</div>",
                Escaped(&s.action),
                s.mean,
                Escaped(&s.to_string())
            )?;
        }
        writeln!(f, "</div>")?;

        writeln!(f, "</body>")?;
        write!(f, "</html>")
    }
}

/// HTML 텍스트 이스케이프
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&#39;")?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}
