use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exercise::{AttemptResult, AttemptStatus, ChatMessage, Exercise, ExerciseOutcome};
use crate::BenchConfig;

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate counts for one run against one model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    pub total_exercises: usize,
    pub passed_exercises: usize,
    pub failed_exercises: usize,
    pub error_exercises: usize,
    pub total_attempts: u32,
    pub total_time_secs: f64,
    pub model_name: String,
}

impl BenchmarkStats {
    pub fn tally(model: &str, exercises: &[Exercise], elapsed: Duration) -> Self {
        let mut stats = Self {
            total_exercises: exercises.len(),
            total_time_secs: elapsed.as_secs_f64(),
            model_name: model.to_string(),
            ..Default::default()
        };

        for exercise in exercises {
            stats.total_attempts += exercise.attempts();
            match exercise.outcome() {
                ExerciseOutcome::Passed => stats.passed_exercises += 1,
                ExerciseOutcome::Failed => stats.failed_exercises += 1,
                ExerciseOutcome::Error => stats.error_exercises += 1,
            }
        }
        stats
    }

    /// Passed exercises as a percentage of all exercises.
    pub fn success_rate(&self) -> f64 {
        if self.total_exercises == 0 {
            return 0.0;
        }
        self.passed_exercises as f64 / self.total_exercises as f64 * 100.0
    }

    pub fn average_attempts(&self) -> f64 {
        if self.total_exercises == 0 {
            return 0.0;
        }
        self.total_attempts as f64 / self.total_exercises as f64
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsSummary {
    #[serde(flatten)]
    pub stats: BenchmarkStats,
    pub success_rate: f64,
    pub average_attempts: f64,
}

impl From<BenchmarkStats> for StatsSummary {
    fn from(stats: BenchmarkStats) -> Self {
        Self {
            success_rate: stats.success_rate(),
            average_attempts: stats.average_attempts(),
            stats,
        }
    }
}

// =============================================================================
// Report shapes
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub status: AttemptStatus,
    pub expected_output: serde_json::Value,
    pub actual_output: serde_json::Value,
    pub error_message: Option<String>,
    pub generation_time_ms: Option<f64>,
    pub grading_time_ms: Option<f64>,
    pub code_generated: String,
}

impl From<&AttemptResult> for AttemptRecord {
    fn from(result: &AttemptResult) -> Self {
        let json = |v: &Option<crate::Value>| {
            v.as_ref()
                .map(crate::Value::to_json)
                .unwrap_or(serde_json::Value::Null)
        };

        Self {
            status: result.status,
            expected_output: json(&result.expected_output),
            actual_output: json(&result.actual_output),
            error_message: result.error_message.clone(),
            generation_time_ms: result.generation_time_ms,
            grading_time_ms: result.grading_time_ms,
            code_generated: result.code_generated.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseReport {
    pub name: String,
    pub description: String,
    pub difficulty: String,
    pub max_attempts: u32,
    pub attempts: u32,
    pub completed: bool,
    pub chat_history: Vec<ChatMessage>,
    pub results: Vec<AttemptRecord>,
}

impl From<&Exercise> for ExerciseReport {
    fn from(exercise: &Exercise) -> Self {
        Self {
            name: exercise.name().to_string(),
            description: exercise.description().to_string(),
            difficulty: exercise.difficulty().as_str().to_string(),
            max_attempts: exercise.max_attempts(),
            attempts: exercise.attempts(),
            completed: exercise.is_completed(),
            chat_history: exercise.transcript().to_vec(),
            results: exercise.results().iter().map(AttemptRecord::from).collect(),
        }
    }
}

/// Everything a persistence or rendering collaborator needs about a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub config: BenchConfig,
    pub stats: StatsSummary,
    pub exercises: Vec<ExerciseReport>,
}

impl BenchmarkReport {
    pub fn new(config: BenchConfig, stats: BenchmarkStats, exercises: &[Exercise]) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            config,
            stats: stats.into(),
            exercises: exercises.iter().map(ExerciseReport::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::{Difficulty, ExecutionTest};
    use crate::Value;

    fn exercise(name: &str) -> Exercise {
        Exercise::new(name, "print 4", Difficulty::Easy, ExecutionTest::new(4i64))
    }

    fn sample() -> Vec<Exercise> {
        let mut passed = exercise("passed");
        passed
            .record("print(4)", AttemptResult::passed(Value::Int(4), Value::Int(4)))
            .unwrap();

        let mut failed = exercise("failed").with_max_attempts(1);
        failed
            .record("print(5)", AttemptResult::failed(Value::Int(4), Value::Int(5)))
            .unwrap();

        let mut errored = exercise("errored").with_max_attempts(2);
        errored
            .record("print(5)", AttemptResult::failed(Value::Int(4), Value::Int(5)))
            .unwrap();
        errored.record_system_error("System error: timeout").unwrap();

        vec![passed, failed, errored]
    }

    #[test]
    fn test_tally_classifies_exercises() {
        let stats = BenchmarkStats::tally("llama3.1:8b", &sample(), Duration::from_secs(3));
        assert_eq!(stats.total_exercises, 3);
        assert_eq!(stats.passed_exercises, 1);
        assert_eq!(stats.failed_exercises, 1);
        assert_eq!(stats.error_exercises, 1);
        assert_eq!(stats.total_attempts, 4);
        assert!((stats.success_rate() - 33.333).abs() < 0.01);
        assert!((stats.average_attempts() - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats_do_not_divide_by_zero() {
        let stats = BenchmarkStats::default();
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.average_attempts(), 0.0);
    }

    #[test]
    fn test_report_serializes_flattened_stats() {
        let exercises = sample();
        let stats = BenchmarkStats::tally("m", &exercises, Duration::from_secs(1));
        let report = BenchmarkReport::new(BenchConfig::new("m"), stats, &exercises);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stats"]["passed_exercises"], 1);
        assert!(json["stats"]["success_rate"].is_number());
        assert_eq!(json["exercises"][0]["results"][0]["status"], "passed");
        assert_eq!(json["exercises"][0]["results"][0]["actual_output"], 4);
        assert_eq!(json["exercises"][0]["chat_history"][2]["role"], "assistant");
        assert_eq!(json["exercises"][2]["results"][1]["expected_output"], serde_json::Value::Null);
    }
}
