use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Value;

// =============================================================================
// Conversation
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Attempt results
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Passed,
    Failed,
    Error,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Passed => "passed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Error => "error",
        }
    }
}

/// Outcome of grading one attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptResult {
    pub status: AttemptStatus,
    #[serde(default)]
    pub expected_output: Option<Value>,
    #[serde(default)]
    pub actual_output: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Wall time spent waiting on the model.
    #[serde(default)]
    pub generation_time_ms: Option<f64>,
    /// Wall time spent executing and grading the code.
    #[serde(default)]
    pub grading_time_ms: Option<f64>,
    #[serde(default)]
    pub code_generated: String,
}

impl AttemptResult {
    fn with_status(status: AttemptStatus) -> Self {
        Self {
            status,
            expected_output: None,
            actual_output: None,
            error_message: None,
            generation_time_ms: None,
            grading_time_ms: None,
            code_generated: String::new(),
        }
    }

    pub fn passed(expected: Value, actual: Value) -> Self {
        Self {
            expected_output: Some(expected),
            actual_output: Some(actual),
            ..Self::with_status(AttemptStatus::Passed)
        }
    }

    pub fn failed(expected: Value, actual: Value) -> Self {
        Self {
            expected_output: Some(expected),
            actual_output: Some(actual),
            ..Self::with_status(AttemptStatus::Failed)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::with_status(AttemptStatus::Error)
        }
    }

    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected_output = Some(expected);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code_generated = code.into();
        self
    }

    pub fn with_generation_time(mut self, elapsed: Duration) -> Self {
        self.generation_time_ms = Some(elapsed.as_secs_f64() * 1000.0);
        self
    }

    pub fn with_grading_time(mut self, elapsed: Duration) -> Self {
        self.grading_time_ms = Some(elapsed.as_secs_f64() * 1000.0);
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status == AttemptStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_status() {
        let r = AttemptResult::failed(Value::Int(5), Value::Int(-3));
        assert_eq!(r.status, AttemptStatus::Failed);
        assert_eq!(r.expected_output, Some(Value::Int(5)));
        assert!(r.error_message.is_none());

        let e = AttemptResult::error("boom").with_expected(Value::Int(4));
        assert_eq!(e.status, AttemptStatus::Error);
        assert_eq!(e.error_message.as_deref(), Some("boom"));
        assert!(!e.is_passed());
    }

    #[test]
    fn test_timings_are_milliseconds() {
        let r = AttemptResult::error("x").with_generation_time(Duration::from_millis(1500));
        assert_eq!(r.generation_time_ms, Some(1500.0));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::assistant("print(1)");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
