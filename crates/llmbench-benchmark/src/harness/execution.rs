use async_trait::async_trait;
use llmbench_core::{AttemptResult, ExecutionTest, Value};

use super::Grader;
use crate::evaluator::{Namespace, Result};

/// Name of the binding consulted when the code prints nothing.
const RESULT_BINDING: &str = "result";

#[async_trait]
impl Grader for ExecutionTest {
    // Precedence: printed output, then a `result` binding, then the code
    // evaluated as one expression. A program with no canonical output
    // channel can land on the wrong one without erroring.
    async fn grade(&self, code: &str, ns: &mut dyn Namespace) -> Result<AttemptResult> {
        if let Some(setup) = &self.setup {
            if let Err(exc) = ns.exec(setup).await?.result {
                return Ok(AttemptResult::error(format!("Setup failed: {exc}"))
                    .with_expected(self.expected.clone()));
            }
        }

        let run = ns.exec(code).await?;
        if let Err(exc) = run.result {
            return Ok(AttemptResult::error(exc.to_string()).with_expected(self.expected.clone()));
        }

        let printed = run.stdout.trim();
        let actual = if !printed.is_empty() {
            coerce(printed, &self.expected)
        } else if let Some(bound) = ns.lookup(RESULT_BINDING).await? {
            bound
        } else {
            ns.eval(code).await?.result.unwrap_or(Value::None)
        };

        Ok(match actual == self.expected {
            true => AttemptResult::passed(self.expected.clone(), actual),
            false => AttemptResult::failed(self.expected.clone(), actual),
        })
    }
}

/// Parses printed text as the expected value's type, keeping the raw text
/// when that fails. Containers are never parsed.
fn coerce(text: &str, expected: &Value) -> Value {
    let parsed = match expected {
        Value::Int(_) => text.parse::<i64>().ok().map(Value::Int),
        Value::Float(_) => text.parse::<f64>().ok().map(Value::Float),
        Value::Bool(_) => match text {
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::str(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::fake::{FakeEvaluator, Script};
    use crate::evaluator::Evaluator;
    use llmbench_core::AttemptStatus;

    async fn run(test: &ExecutionTest, evaluator: &FakeEvaluator, code: &str) -> AttemptResult {
        let mut ns = evaluator.spawn().await.unwrap();
        test.grade(code, ns.as_mut()).await.unwrap()
    }

    #[test]
    fn test_coerce_by_expected_type() {
        assert_eq!(coerce("42", &Value::Int(0)), Value::Int(42));
        assert_eq!(coerce("2.5", &Value::Float(0.0)), Value::Float(2.5));
        assert_eq!(coerce("True", &Value::Bool(false)), Value::Bool(true));
        assert_eq!(coerce("yes", &Value::Bool(false)), Value::str("yes"));
        assert_eq!(coerce("4.0", &Value::Int(4)), Value::str("4.0"));
        assert_eq!(
            coerce("[1, 2]", &Value::List(vec![])),
            Value::str("[1, 2]")
        );
    }

    #[tokio::test]
    async fn test_printed_output_is_coerced() {
        let evaluator = FakeEvaluator::new().script("print(2 + 2)", Script::prints("4\n"));
        let result = run(&ExecutionTest::new(4i64), &evaluator, "print(2 + 2)").await;
        assert_eq!(result.status, AttemptStatus::Passed);
        assert_eq!(result.actual_output, Some(Value::Int(4)));
    }

    #[tokio::test]
    async fn test_result_binding_when_nothing_printed() {
        let evaluator = FakeEvaluator::new().script("result = 2 + 2", Script::binds("result", Value::Int(4)));
        let result = run(&ExecutionTest::new(4i64), &evaluator, "result = 2 + 2").await;
        assert_eq!(result.status, AttemptStatus::Passed);
    }

    #[tokio::test]
    async fn test_expression_value_is_last_resort() {
        let evaluator = FakeEvaluator::new()
            .script("2 + 3", Script::default())
            .expression("2 + 3", Value::Int(5));
        let result = run(&ExecutionTest::new(4i64), &evaluator, "2 + 3").await;
        assert_eq!(result.status, AttemptStatus::Failed);
        assert_eq!(result.actual_output, Some(Value::Int(5)));
    }

    #[tokio::test]
    async fn test_nothing_observable_grades_none() {
        let evaluator = FakeEvaluator::new().script("x = 1\ny = 2", Script::default());
        let result = run(&ExecutionTest::new(4i64), &evaluator, "x = 1\ny = 2").await;
        assert_eq!(result.status, AttemptStatus::Failed);
        assert_eq!(result.actual_output, Some(Value::None));
    }

    #[tokio::test]
    async fn test_raised_exception_is_error() {
        let evaluator = FakeEvaluator::new();
        let result = run(&ExecutionTest::new(4i64), &evaluator, "def broken(:").await;
        assert_eq!(result.status, AttemptStatus::Error);
        assert!(!result.error_message.unwrap_or_default().is_empty());
        assert_eq!(result.expected_output, Some(Value::Int(4)));
    }

    #[tokio::test]
    async fn test_setup_failure_is_reported() {
        let evaluator = FakeEvaluator::new()
            .script("import missing", Script::raises("ModuleNotFoundError", "No module named 'missing'"));
        let test = ExecutionTest::new(4i64).with_setup("import missing");
        let result = run(&test, &evaluator, "print(4)").await;
        assert_eq!(result.status, AttemptStatus::Error);
        assert!(result
            .error_message
            .unwrap_or_default()
            .starts_with("Setup failed: ModuleNotFoundError"));
    }

    #[tokio::test]
    async fn test_printed_string_compared_verbatim() {
        let evaluator = FakeEvaluator::new().script("hello", Script::prints("Hello, World!\n"));
        let result = run(&ExecutionTest::new("Hello, World!"), &evaluator, "hello").await;
        assert_eq!(result.status, AttemptStatus::Passed);
    }
}
