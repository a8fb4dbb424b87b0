use async_trait::async_trait;
use llmbench_core::{render_args, AttemptResult, CaseInput, FunctionTest, Value};

use super::Grader;
use crate::evaluator::{Namespace, Result};

enum Invocation {
    Returned { args: Vec<Value>, value: Value },
    Raised(String),
}

#[async_trait]
impl Grader for FunctionTest {
    async fn grade(&self, code: &str, ns: &mut dyn Namespace) -> Result<AttemptResult> {
        if let Err(exc) = ns.exec(code).await?.result {
            return Ok(AttemptResult::error(exc.to_string()));
        }

        if ns.lookup(&self.function).await?.is_none() {
            return Ok(AttemptResult::error(format!(
                "Function '{}' not found in code",
                self.function
            )));
        }

        for (idx, case) in self.cases.iter().enumerate() {
            let n = idx + 1;
            let (args, actual) = match invoke(self, ns, &case.input).await? {
                Invocation::Returned { args, value } => (args, value),
                Invocation::Raised(message) => {
                    return Ok(AttemptResult::error(format!("Test case {n} raised {message}"))
                        .with_expected(case.expected.clone()));
                }
            };

            if actual != case.expected {
                let message = format!(
                    "Test case {n} failed: {}({}) returned {actual}, expected {}",
                    self.function,
                    render_args(&args),
                    case.expected
                );
                return Ok(
                    AttemptResult::failed(case.expected.clone(), actual).with_message(message)
                );
            }
        }

        let summary = Value::str(format!("All {} test cases passed", self.cases.len()));
        Ok(AttemptResult::passed(summary.clone(), summary))
    }
}

/// Calls the function with the case's primary convention, falling back to
/// the opposite one once if the first call raised `TypeError`.
async fn invoke(test: &FunctionTest, ns: &mut dyn Namespace, input: &CaseInput) -> Result<Invocation> {
    let args = input.args();
    let first = match ns.call(&test.function, &args, None).await?.result {
        Ok(value) => return Ok(Invocation::Returned { args, value }),
        Err(exc) => exc,
    };

    let Some(alternate) = input.flipped().filter(|_| first.is_type_error()) else {
        return Ok(Invocation::Raised(first.to_string()));
    };

    let alt_args = alternate.args();
    match ns.call(&test.function, &alt_args, None).await?.result {
        Ok(value) => Ok(Invocation::Returned {
            args: alt_args,
            value,
        }),
        Err(second) => Ok(Invocation::Raised(format!(
            "{first} when called as {name}({}), and {second} when called as {name}({})",
            render_args(&args),
            render_args(&alt_args),
            name = test.function,
        ))),
    }
}
