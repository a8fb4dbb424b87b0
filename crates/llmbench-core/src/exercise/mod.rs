mod difficulty;
mod state;
mod test_spec;
mod types;

pub use difficulty::{Difficulty, Tier};
pub use state::{Exercise, ExerciseOutcome, ExerciseState, DEFAULT_MAX_ATTEMPTS, SYSTEM_PROMPT};
pub use test_spec::{
    CaseInput, ExecutionTest, FunctionCase, FunctionTest, MethodCall, Scenario, ScriptedTest,
    TestSpec,
};
pub use types::{AttemptResult, AttemptStatus, ChatMessage, Role};
