use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use llmbench_core::{
    AttemptStatus, BenchConfig, BenchError, BenchmarkReport, BenchmarkStats, Difficulty, Exercise,
    ExerciseOutcome, Result,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ModelClient};
use crate::evaluator::Evaluator;
use crate::harness;
use crate::report::{ReportRenderer, ResultStore};
use crate::sanitizer::clean_response;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenchmarkEvent {
    Started { model: String, total: usize },
    Exercise { current: usize, total: usize, name: String, difficulty: Difficulty },
    Attempt { attempt: u32, max_attempts: u32 },
    CodeGenerated { code: String, generation_time_ms: f64 },
    AttemptGraded {
        attempt: u32,
        status: AttemptStatus,
        expected: Option<String>,
        actual: Option<String>,
        error: Option<String>,
        grading_time_ms: f64,
    },
    SystemError { attempt: u32, message: String },
    ExerciseFinished { name: String, outcome: ExerciseOutcome, attempts: u32 },
    ReportSaved { path: PathBuf },
    Warning { message: String },
    Done { stats: BenchmarkStats },
    Cancelled,
}

/// Statistics of a finished run plus where its reports went.
#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub stats: BenchmarkStats,
    pub results_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

pub struct BenchmarkRunner {
    client: Arc<dyn ModelClient>,
    evaluator: Arc<dyn Evaluator>,
    config: BenchConfig,
    store: Option<ResultStore>,
    renderer: Option<Box<dyn ReportRenderer>>,
}

impl BenchmarkRunner {
    pub fn new(client: Arc<dyn ModelClient>, evaluator: Arc<dyn Evaluator>, config: BenchConfig) -> Self {
        Self {
            client,
            evaluator,
            config,
            store: None,
            renderer: None,
        }
    }

    pub fn with_result_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Rendered reports are written next to the saved results, so a renderer
    /// without a result store is unused.
    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Runs every exercise to completion, strictly in order.
    pub async fn run(
        &self,
        model: &str,
        exercises: &mut [Exercise],
        cancel_token: CancellationToken,
        tx: mpsc::Sender<BenchmarkEvent>,
    ) -> Result<BenchmarkOutcome> {
        info!(model, exercises = exercises.len(), "Starting benchmark");
        let start = Instant::now();
        let total = exercises.len();

        let _ = tx
            .send(BenchmarkEvent::Started {
                model: model.to_string(),
                total,
            })
            .await;

        for (idx, exercise) in exercises.iter_mut().enumerate() {
            if cancel_token.is_cancelled() {
                let _ = tx.send(BenchmarkEvent::Cancelled).await;
                return Err(BenchError::Cancelled);
            }

            let _ = tx
                .send(BenchmarkEvent::Exercise {
                    current: idx + 1,
                    total,
                    name: exercise.name().to_string(),
                    difficulty: exercise.difficulty(),
                })
                .await;

            if let Err(e) = self.run_exercise(model, exercise, &cancel_token, &tx).await {
                if matches!(e, BenchError::Cancelled) {
                    let _ = tx.send(BenchmarkEvent::Cancelled).await;
                }
                return Err(e);
            }

            let _ = tx
                .send(BenchmarkEvent::ExerciseFinished {
                    name: exercise.name().to_string(),
                    outcome: exercise.outcome(),
                    attempts: exercise.attempts(),
                })
                .await;
        }

        let stats = BenchmarkStats::tally(model, exercises, start.elapsed());
        info!(
            passed = stats.passed_exercises,
            failed = stats.failed_exercises,
            errors = stats.error_exercises,
            "Benchmark finished"
        );

        let (results_path, report_path) = self.persist(model, &stats, exercises, &tx).await;

        let _ = tx
            .send(BenchmarkEvent::Done {
                stats: stats.clone(),
            })
            .await;

        Ok(BenchmarkOutcome {
            stats,
            results_path,
            report_path,
        })
    }

    async fn run_exercise(
        &self,
        model: &str,
        exercise: &mut Exercise,
        cancel_token: &CancellationToken,
        tx: &mpsc::Sender<BenchmarkEvent>,
    ) -> Result<()> {
        while exercise.can_retry() {
            let attempt = exercise.attempts() + 1;
            let _ = tx
                .send(BenchmarkEvent::Attempt {
                    attempt,
                    max_attempts: exercise.max_attempts(),
                })
                .await;

            let messages = exercise.next_messages();
            let started = Instant::now();
            let reply = tokio::select! {
                _ = cancel_token.cancelled() => return Err(BenchError::Cancelled),
                reply = self.client.chat(
                    model,
                    &messages,
                    self.config.temperature,
                    self.config.request_timeout(),
                ) => reply,
            };
            let generation_time = started.elapsed();

            let code = match reply.map(|raw| clean_response(&raw)) {
                Ok(code) if !code.trim().is_empty() => code,
                Ok(_) => {
                    self.system_error(exercise, attempt, ClientError::EmptyResponse, tx).await?;
                    continue;
                }
                Err(e) => {
                    self.system_error(exercise, attempt, e, tx).await?;
                    continue;
                }
            };

            let _ = tx
                .send(BenchmarkEvent::CodeGenerated {
                    code: code.clone(),
                    generation_time_ms: generation_time.as_secs_f64() * 1000.0,
                })
                .await;

            let result = tokio::select! {
                _ = cancel_token.cancelled() => return Err(BenchError::Cancelled),
                result = harness::grade(exercise.test(), &code, self.evaluator.as_ref()) => result,
            };
            let result = result.with_generation_time(generation_time);
            debug!(exercise = exercise.name(), attempt, status = result.status.as_str(), "Attempt graded");

            let _ = tx
                .send(BenchmarkEvent::AttemptGraded {
                    attempt,
                    status: result.status,
                    expected: result.expected_output.as_ref().map(ToString::to_string),
                    actual: result.actual_output.as_ref().map(ToString::to_string),
                    error: result.error_message.clone(),
                    grading_time_ms: result.grading_time_ms.unwrap_or_default(),
                })
                .await;

            exercise.record(code, result)?;
        }
        Ok(())
    }

    async fn system_error(
        &self,
        exercise: &mut Exercise,
        attempt: u32,
        error: ClientError,
        tx: &mpsc::Sender<BenchmarkEvent>,
    ) -> Result<()> {
        let message = format!("System error: {error}");
        warn!(exercise = exercise.name(), attempt, %error, "Model call failed");
        let _ = tx
            .send(BenchmarkEvent::SystemError {
                attempt,
                message: message.clone(),
            })
            .await;
        exercise.record_system_error(message)
    }

    /// Report failures never fail the run; they surface as warnings.
    async fn persist(
        &self,
        model: &str,
        stats: &BenchmarkStats,
        exercises: &[Exercise],
        tx: &mpsc::Sender<BenchmarkEvent>,
    ) -> (Option<PathBuf>, Option<PathBuf>) {
        let Some(store) = &self.store else {
            return (None, None);
        };

        let mut config = self.config.clone();
        config.model_id = model.to_string();
        let report = BenchmarkReport::new(config, stats.clone(), exercises);

        let results_path = match store.save(&report) {
            Ok(path) => {
                let _ = tx.send(BenchmarkEvent::ReportSaved { path: path.clone() }).await;
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "Failed to save benchmark results");
                let _ = tx
                    .send(BenchmarkEvent::Warning {
                        message: format!("Failed to save results: {e}"),
                    })
                    .await;
                None
            }
        };

        let report_path = match &self.renderer {
            None => None,
            Some(renderer) => match store.write_rendered(&report, renderer.as_ref()) {
                Ok(path) => {
                    let _ = tx.send(BenchmarkEvent::ReportSaved { path: path.clone() }).await;
                    Some(path)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to write rendered report");
                    let _ = tx
                        .send(BenchmarkEvent::Warning {
                            message: format!("Failed to write report: {e}"),
                        })
                        .await;
                    None
                }
            },
        };

        (results_path, report_path)
    }
}

/// Clears every exercise before running the same list against another model.
pub fn reset_exercises(exercises: &mut [Exercise]) {
    exercises.iter_mut().for_each(Exercise::reset);
}
