// Domain modules
pub mod config;
pub mod error;
pub mod exercise;
pub mod report;
pub mod value;

pub use config::{BenchConfig, Provider, DEFAULT_OLLAMA_HOST, DEFAULT_OPENAI_BASE};
pub use error::{BenchError, Result};
pub use exercise::{
    AttemptResult, AttemptStatus, CaseInput, ChatMessage, Difficulty, ExecutionTest, Exercise,
    ExerciseOutcome, ExerciseState, FunctionCase, FunctionTest, MethodCall, Role, Scenario,
    ScriptedTest, TestSpec, Tier, DEFAULT_MAX_ATTEMPTS, SYSTEM_PROMPT,
};
pub use report::{AttemptRecord, BenchmarkReport, BenchmarkStats, ExerciseReport, StatsSummary};
pub use value::{render_args, Value};
