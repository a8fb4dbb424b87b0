pub mod catalog;
pub mod client;
pub mod evaluator;
pub mod harness;
pub mod report;
pub mod runner;
pub mod sanitizer;

pub use catalog::{
    builtin_set, builtin_sets, load_exercise_set, load_exercise_sets, parse_exercise_set,
    select_exercises, CatalogError, ExerciseSet,
};
pub use client::{build_client, ClientError, ModelClient, OllamaClient, OpenAiClient, API_KEY_ENV};
pub use evaluator::{Evaluator, EvaluatorError, Execution, Namespace, PyException, PythonEvaluator};
pub use harness::{grade, Grader};
pub use report::{HtmlReport, ReportRenderer, ResultStore, StoreError};
pub use runner::{reset_exercises, BenchmarkEvent, BenchmarkOutcome, BenchmarkRunner};
pub use sanitizer::clean_response;
