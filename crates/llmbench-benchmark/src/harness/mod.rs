//! Grading strategies.
//!
//! Each [`TestSpec`] variant implements [`Grader`]. Grading always happens in
//! a namespace opened for that one attempt and dropped afterwards, and the
//! harness never retries on its own.

mod execution;
mod function;
mod scripted;

use std::time::Instant;

use async_trait::async_trait;
use llmbench_core::{AttemptResult, TestSpec};
use tracing::{debug, warn};

use crate::evaluator::{self, Evaluator, EvaluatorError, Namespace};

#[async_trait]
pub trait Grader: Send + Sync {
    /// Runs `code` in `ns` and grades it. Exceptions raised by the code are
    /// folded into the returned result; only interpreter failures are `Err`.
    async fn grade(&self, code: &str, ns: &mut dyn Namespace) -> evaluator::Result<AttemptResult>;
}

pub fn grader(spec: &TestSpec) -> &dyn Grader {
    match spec {
        TestSpec::Execution(test) => test,
        TestSpec::Function(test) => test,
        TestSpec::Scripted(test) => test,
    }
}

/// Grades one attempt in a fresh namespace. Never fails: interpreter
/// problems become an `Error` result like any other.
pub async fn grade(spec: &TestSpec, code: &str, evaluator: &dyn Evaluator) -> AttemptResult {
    let start = Instant::now();

    let outcome = match evaluator.spawn().await {
        Ok(mut ns) => grader(spec).grade(code, ns.as_mut()).await,
        Err(e) => Err(e),
    };

    let result = match outcome {
        Ok(result) => result,
        Err(EvaluatorError::Timeout(ms)) => {
            AttemptResult::error(format!("Execution timed out after {ms}ms"))
        }
        Err(e) => {
            warn!(error = %e, kind = spec.kind(), "Evaluator failure during grading");
            AttemptResult::error(format!("Evaluator failure: {e}"))
        }
    };

    debug!(
        kind = spec.kind(),
        status = result.status.as_str(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Graded attempt"
    );
    result.with_code(code).with_grading_time(start.elapsed())
}
