//! Persistence of finished runs: pretty JSON results and rendered reports.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use llmbench_core::{AttemptRecord, AttemptStatus, BenchmarkReport, ExerciseReport, Role};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Writes reports into one directory, created on first use.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<prefix>_<model>_<YYYYmmdd_HHMMSS>.<extension>`, with path separators
    /// and tag colons in the model id replaced by underscores.
    pub fn file_name(prefix: &str, report: &BenchmarkReport, extension: &str) -> String {
        let model = report.config.model_id.replace(['/', '\\', ':'], "_");
        let stamp = report
            .generated_at
            .with_timezone(&Local)
            .format("%Y%m%d_%H%M%S");
        format!("{prefix}_{model}_{stamp}.{extension}")
    }

    pub fn save(&self, report: &BenchmarkReport) -> Result<PathBuf> {
        let path = self.prepare(Self::file_name("benchmark_results", report, "json"))?;
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!(path = %path.display(), "Saved benchmark results");
        Ok(path)
    }

    pub fn write_rendered(&self, report: &BenchmarkReport, renderer: &dyn ReportRenderer) -> Result<PathBuf> {
        let name = Self::file_name(renderer.prefix(), report, renderer.extension());
        let path = self.prepare(name)?;
        std::fs::write(&path, renderer.render(report))?;
        info!(path = %path.display(), "Wrote rendered report");
        Ok(path)
    }

    fn prepare(&self, name: String) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(name))
    }
}

pub trait ReportRenderer: Send + Sync {
    fn prefix(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    fn render(&self, report: &BenchmarkReport) -> String;
}

// =============================================================================
// HTML
// =============================================================================

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f4f6fa; color: #222; }
.container { max-width: 1100px; margin: 0 auto; padding: 24px; }
.report-header { background: #2d3748; color: #fff; border-radius: 10px; padding: 24px; }
.success-rate { font-size: 2em; font-weight: bold; margin: 12px 0; }
.stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 12px; }
.stat-card { background: rgba(255,255,255,0.1); border-radius: 8px; padding: 12px; text-align: center; }
.stat-value { font-size: 1.5em; font-weight: bold; }
.stat-label { font-size: 0.85em; opacity: 0.8; }
.exercise { background: #fff; border-radius: 10px; margin-top: 20px; padding: 20px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
.exercise-title { font-size: 1.2em; font-weight: bold; }
.badge { display: inline-block; border-radius: 12px; padding: 2px 10px; font-size: 0.8em; margin-right: 6px; background: #e2e8f0; }
.badge.passed, .attempt-header.passed { background: #c6f6d5; }
.badge.failed, .attempt-header.failed { background: #fed7d7; }
.attempt-header.error { background: #feebc8; }
.description { margin: 12px 0; white-space: pre-wrap; }
.attempt { border: 1px solid #e2e8f0; border-radius: 8px; margin-top: 12px; overflow: hidden; }
.attempt-header { display: flex; justify-content: space-between; padding: 8px 12px; }
.detail { padding: 8px 12px; }
.label { font-weight: bold; }
pre { background: #1a202c; color: #e2e8f0; margin: 0; padding: 12px; overflow-x: auto; }
details { padding: 8px 12px; }
.message { border-left: 3px solid #a0aec0; margin: 6px 0; padding: 4px 8px; white-space: pre-wrap; }
.footer { text-align: center; color: #718096; padding: 24px; font-size: 0.85em; }
"#;

/// Self-contained HTML page: summary cards, then one section per exercise
/// with every attempt and the full conversation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReport;

impl ReportRenderer for HtmlReport {
    fn prefix(&self) -> &'static str {
        "benchmark_report"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, report: &BenchmarkReport) -> String {
        let summary = &report.stats;
        let stats = &summary.stats;
        let model = escape(&stats.model_name);
        let per_exercise = match stats.total_exercises {
            0 => 0.0,
            n => stats.total_time_secs / n as f64,
        };

        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
<title>LLM Benchmark Report - {model}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<div class=\"container\">\n<div class=\"report-header\">\n<h1>LLM Benchmark Report</h1>\n\
<div>Model: <strong>{model}</strong></div>\n\
<div class=\"success-rate\">{:.1}% Success Rate</div>\n<div class=\"stats-grid\">\n",
            summary.success_rate
        );

        let cards = [
            ("Total Exercises", stats.total_exercises.to_string()),
            ("Passed", stats.passed_exercises.to_string()),
            ("Failed", stats.failed_exercises.to_string()),
            ("Errors", stats.error_exercises.to_string()),
            ("Total Attempts", stats.total_attempts.to_string()),
            ("Avg Attempts", format!("{:.1}", summary.average_attempts)),
            ("Total Time", format!("{:.1}s", stats.total_time_secs)),
            ("Avg Time/Exercise", format!("{per_exercise:.1}s")),
        ];
        for (label, value) in cards {
            let _ = writeln!(
                html,
                "<div class=\"stat-card\"><div class=\"stat-value\">{value}</div><div class=\"stat-label\">{label}</div></div>"
            );
        }
        html.push_str("</div>\n</div>\n");

        for (idx, exercise) in report.exercises.iter().enumerate() {
            render_exercise(&mut html, idx + 1, exercise);
        }

        let _ = write!(
            html,
            "<div class=\"footer\">Run {} generated on {}</div>\n</div>\n</body>\n</html>\n",
            report.run_id,
            report.generated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
        html
    }
}

fn render_exercise(html: &mut String, number: usize, exercise: &ExerciseReport) {
    let (badge, label) = match exercise.completed {
        true => ("passed", "Completed"),
        false => ("failed", "Not completed"),
    };
    let _ = write!(
        html,
        "<div class=\"exercise\">\n<div class=\"exercise-title\">{number}. {}</div>\n\
<span class=\"badge\">{}</span><span class=\"badge {badge}\">{label}</span>\
<span class=\"badge\">{}/{} attempts</span>\n<div class=\"description\">{}</div>\n",
        escape(&exercise.name),
        escape(&exercise.difficulty),
        exercise.attempts,
        exercise.max_attempts,
        escape(&exercise.description)
    );

    for (idx, attempt) in exercise.results.iter().enumerate() {
        render_attempt(html, idx + 1, attempt);
    }

    if !exercise.chat_history.is_empty() {
        html.push_str("<details><summary>Conversation</summary>\n");
        for message in &exercise.chat_history {
            let role = match message.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(
                html,
                "<div class=\"message\"><span class=\"label\">{role}:</span>\n{}</div>",
                escape(&message.content)
            );
        }
        html.push_str("</details>\n");
    }
    html.push_str("</div>\n");
}

fn render_attempt(html: &mut String, number: usize, attempt: &AttemptRecord) {
    let status = attempt.status.as_str();
    let seconds = attempt.generation_time_ms.unwrap_or(0.0) / 1000.0;
    let _ = write!(
        html,
        "<div class=\"attempt\">\n<div class=\"attempt-header {status}\">\
<span><strong>Attempt {number}</strong> {status}</span><span>{seconds:.2}s</span></div>\n"
    );

    if let Some(message) = &attempt.error_message {
        let _ = writeln!(
            html,
            "<div class=\"detail\"><span class=\"label\">Error:</span> {}</div>",
            escape(message)
        );
    }

    if attempt.status == AttemptStatus::Failed && !attempt.actual_output.is_null() {
        let _ = writeln!(
            html,
            "<div class=\"detail\"><span class=\"label\">Expected:</span> {}<br>\
<span class=\"label\">Actual:</span> {}</div>",
            escape(&attempt.expected_output.to_string()),
            escape(&attempt.actual_output.to_string())
        );
    }

    if !attempt.code_generated.is_empty() {
        let _ = writeln!(html, "<pre><code>{}</code></pre>", escape(&attempt.code_generated));
    }
    html.push_str("</div>\n");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
