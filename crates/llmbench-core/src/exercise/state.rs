use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::{AttemptResult, AttemptStatus, ChatMessage, Difficulty, TestSpec};
use crate::{BenchError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub const SYSTEM_PROMPT: &str = "You are a Python coding assistant. Reply with executable Python code only: \
no markdown, no code fences, no explanations or prose outside the code. \
Only the code in your most recent reply is executed, so every reply must be a complete program.";

const REQUIREMENTS: &str = "Requirements:
- Write clean, working Python code
- Do not include any markdown formatting (no ```python or ```)
- Do not include explanations or comments outside the code
- The code should be ready to execute immediately
- Focus on correctness and simplicity";

/// Where an exercise sits in its retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    Fresh,
    Retryable,
    Passed,
    Exhausted,
}

/// How an exercise counts in run statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseOutcome {
    Passed,
    Failed,
    Error,
}

/// One coding problem, its grading contract and the attempts made so far.
///
/// `results.len() == attempts` always holds and `attempts` never exceeds
/// `max_attempts`. The transcript only grows; it is cleared by [`reset`].
///
/// [`reset`]: Exercise::reset
#[derive(Clone, Debug)]
pub struct Exercise {
    name: String,
    description: String,
    difficulty: Difficulty,
    max_attempts: u32,
    test: TestSpec,
    attempts: u32,
    results: Vec<AttemptResult>,
    /// Index into `results` of the last attempt recorded through `record`.
    graded_idx: Option<usize>,
    transcript: Vec<ChatMessage>,
}

impl Exercise {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        difficulty: Difficulty,
        test: impl Into<TestSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            difficulty,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            test: test.into(),
            attempts: 0,
            results: Vec::new(),
            graded_idx: None,
            transcript: Vec::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.set_max_attempts(max_attempts);
        self
    }

    /// Clamped to at least one attempt.
    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.max_attempts = max_attempts.max(1);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn test(&self) -> &TestSpec {
        &self.test
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn results(&self) -> &[AttemptResult] {
        &self.results
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn last_result(&self) -> Option<&AttemptResult> {
        self.results.last()
    }

    /// Messages to send for the next attempt. Pure: calling it twice without
    /// an intervening `record` yields the same list.
    pub fn next_messages(&self) -> Vec<ChatMessage> {
        if self.transcript.is_empty() {
            return self.seed();
        }

        let mut messages = self.transcript.clone();
        if let Some(last) = self.last_graded() {
            messages.push(ChatMessage::user(self.feedback(last)));
        }
        messages
    }

    /// Records a graded attempt and the code that produced it.
    pub fn record(&mut self, code: impl Into<String>, result: AttemptResult) -> Result<()> {
        self.ensure_budget()?;
        let code = code.into();

        let opening = match self.last_graded().filter(|_| !self.transcript.is_empty()) {
            Some(previous) => vec![ChatMessage::user(self.feedback(previous))],
            None => self.seed(),
        };
        self.transcript.extend(opening);

        self.transcript.push(ChatMessage::assistant(code.clone()));
        self.graded_idx = Some(self.results.len());
        self.results.push(result.with_code(code));
        self.attempts += 1;
        Ok(())
    }

    /// Records an attempt that never produced code (transport failure,
    /// timeout, empty reply). It consumes budget but leaves the transcript
    /// untouched, so the next request repeats the same conversation.
    pub fn record_system_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.ensure_budget()?;
        self.results.push(AttemptResult::error(message));
        self.attempts += 1;
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.results.iter().any(AttemptResult::is_passed)
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts && !self.is_completed()
    }

    pub fn state(&self) -> ExerciseState {
        if self.is_completed() {
            ExerciseState::Passed
        } else if self.attempts >= self.max_attempts {
            ExerciseState::Exhausted
        } else if self.attempts == 0 {
            ExerciseState::Fresh
        } else {
            ExerciseState::Retryable
        }
    }

    pub fn outcome(&self) -> ExerciseOutcome {
        if self.is_completed() {
            return ExerciseOutcome::Passed;
        }
        match self.last_result().map(|r| r.status) {
            Some(AttemptStatus::Error) => ExerciseOutcome::Error,
            _ => ExerciseOutcome::Failed,
        }
    }

    /// Clears attempts, results and transcript between independent runs.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.results.clear();
        self.graded_idx = None;
        self.transcript.clear();
    }

    // Feedback always refers to the last reply that was actually graded,
    // never to a system error.
    fn last_graded(&self) -> Option<&AttemptResult> {
        self.graded_idx.and_then(|idx| self.results.get(idx))
    }

    fn ensure_budget(&self) -> Result<()> {
        if self.attempts >= self.max_attempts {
            return Err(BenchError::AttemptsExhausted {
                name: self.name.clone(),
                max_attempts: self.max_attempts,
            });
        }
        Ok(())
    }

    fn seed(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(self.prompt()),
        ]
    }

    fn prompt(&self) -> String {
        format!(
            "Solve this coding problem. Output ONLY the executable Python code, no markdown formatting, \
no explanations, no comments outside the code.\n\nProblem: {}\n\n{REQUIREMENTS}\n\nCode:",
            self.description
        )
    }

    fn feedback(&self, previous: &AttemptResult) -> String {
        let mut text = String::from("Your previous solution failed. Here's what went wrong:\n");

        match (
            &previous.error_message,
            &previous.expected_output,
            &previous.actual_output,
        ) {
            (Some(message), _, _) => {
                let _ = writeln!(text, "Error: {message}");
            }
            (None, Some(expected), Some(actual)) => {
                let _ = writeln!(text, "Expected: {expected}, got: {actual}");
            }
            _ => text.push_str("The code did not produce the expected result.\n"),
        }

        let _ = write!(
            text,
            "\nProblem: {}\n\nPlease fix the issue and reply with the COMPLETE corrected Python code. \
Only the code in your latest reply is executed; nothing from earlier replies is kept. \
No markdown formatting, no explanations.\n\nCode:",
            self.description
        );
        text
    }
}
