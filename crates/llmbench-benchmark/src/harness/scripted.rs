use async_trait::async_trait;
use llmbench_core::{render_args, AttemptResult, ScriptedTest, Value};

use super::Grader;
use crate::evaluator::{Namespace, Result};

#[async_trait]
impl Grader for ScriptedTest {
    async fn grade(&self, code: &str, ns: &mut dyn Namespace) -> Result<AttemptResult> {
        if let Err(exc) = ns.exec(code).await?.result {
            return Ok(AttemptResult::error(exc.to_string()));
        }

        if ns.lookup(&self.class_name).await?.is_none() {
            return Ok(AttemptResult::error(format!(
                "Class '{}' not found in code",
                self.class_name
            )));
        }

        for (idx, scenario) in self.scenarios.iter().enumerate() {
            let n = idx + 1;
            let expected = Value::List(scenario.expected.clone());
            let subject = format!("__subject{idx}");

            let created = ns
                .call(&self.class_name, &scenario.constructor_args, Some(&subject))
                .await?;
            if let Err(exc) = created.result {
                let message = format!(
                    "Scenario {n}: {}({}) raised {exc}",
                    self.class_name,
                    render_args(&scenario.constructor_args)
                );
                return Ok(AttemptResult::error(message).with_expected(expected));
            }

            let mut returned = Vec::with_capacity(scenario.steps.len());
            for step in &scenario.steps {
                let target = format!("{subject}.{}", step.method);
                match ns.call(&target, &step.args, None).await?.result {
                    Ok(value) => returned.push(value),
                    Err(exc) => {
                        let message = format!(
                            "Scenario {n}: {}({}) raised {exc}",
                            step.method,
                            render_args(&step.args)
                        );
                        return Ok(AttemptResult::error(message).with_expected(expected));
                    }
                }
            }

            let actual = Value::List(returned);
            if actual != expected {
                let message = format!("Scenario {n} failed: expected {expected}, got {actual}");
                return Ok(AttemptResult::failed(expected, actual).with_message(message));
            }
        }

        let summary = Value::str(format!("All {} scenarios passed", self.scenarios.len()));
        Ok(AttemptResult::passed(summary.clone(), summary))
    }
}
