//! Exercise definitions: the built-in tiers and user-supplied JSON sets.

use std::path::Path;

use llmbench_core::{
    Difficulty, ExecutionTest, Exercise, FunctionCase, FunctionTest, MethodCall, Scenario,
    ScriptedTest, TestSpec, Tier, Value,
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error in {origin}: {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },
    #[error("Invalid exercise '{exercise}' in {origin}: {reason}")]
    Invalid {
        origin: String,
        exercise: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

const BUILTIN: &[(Tier, &str)] = &[
    (Tier::Basic, include_str!("../exercises/basic.json")),
    (Tier::Intermediate, include_str!("../exercises/intermediate.json")),
    (Tier::Advanced, include_str!("../exercises/advanced.json")),
    (Tier::SuperHard, include_str!("../exercises/super_hard.json")),
];

#[derive(Debug, Clone)]
pub struct ExerciseSet {
    pub name: String,
    pub exercises: Vec<Exercise>,
}

// =============================================================================
// File format
// =============================================================================

#[derive(Debug, Deserialize)]
struct ExerciseSetFile {
    name: String,
    exercises: Vec<ExerciseDef>,
}

#[derive(Debug, Deserialize)]
struct ExerciseDef {
    name: String,
    description: String,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    max_attempts: Option<u32>,
    test: TestDef,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TestDef {
    Execution {
        expected: serde_json::Value,
        #[serde(default)]
        setup: Option<String>,
    },
    Function {
        function: String,
        cases: Vec<CaseDef>,
    },
    Scripted {
        class: String,
        scenarios: Vec<ScenarioDef>,
    },
}

#[derive(Debug, Deserialize)]
struct CaseDef {
    input: serde_json::Value,
    output: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ScenarioDef {
    #[serde(default)]
    constructor: Vec<serde_json::Value>,
    steps: Vec<StepDef>,
    expected: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StepDef {
    method: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

fn values(items: Vec<serde_json::Value>) -> Vec<Value> {
    items.into_iter().map(Value::from).collect()
}

impl TestDef {
    fn into_spec(self) -> std::result::Result<TestSpec, String> {
        match self {
            TestDef::Execution { expected, setup } => {
                let test = ExecutionTest::new(Value::from(expected));
                Ok(match setup {
                    Some(setup) => test.with_setup(setup),
                    None => test,
                }
                .into())
            }
            TestDef::Function { function, cases } => {
                if function.trim().is_empty() {
                    return Err("function name is empty".into());
                }
                if cases.is_empty() {
                    return Err("function test has no cases".into());
                }
                let cases = cases
                    .into_iter()
                    .map(|c| FunctionCase::new(Value::from(c.input), Value::from(c.output)))
                    .collect();
                Ok(FunctionTest::new(function, cases).into())
            }
            TestDef::Scripted { class, scenarios } => {
                if class.trim().is_empty() {
                    return Err("class name is empty".into());
                }
                if scenarios.is_empty() {
                    return Err("scripted test has no scenarios".into());
                }
                let scenarios = scenarios
                    .into_iter()
                    .enumerate()
                    .map(|(idx, s)| {
                        if s.steps.len() != s.expected.len() {
                            return Err(format!(
                                "scenario {} has {} steps but {} expected values",
                                idx + 1,
                                s.steps.len(),
                                s.expected.len()
                            ));
                        }
                        Ok(Scenario {
                            constructor_args: values(s.constructor),
                            steps: s
                                .steps
                                .into_iter()
                                .map(|step| MethodCall::new(step.method, values(step.args)))
                                .collect(),
                            expected: values(s.expected),
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ScriptedTest::new(class, scenarios).into())
            }
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

pub fn parse_exercise_set(json: &str, origin: &str) -> Result<ExerciseSet> {
    let file: ExerciseSetFile = serde_json::from_str(json).map_err(|source| CatalogError::Json {
        origin: origin.to_string(),
        source,
    })?;

    let exercises = file
        .exercises
        .into_iter()
        .map(|def| {
            let invalid = |reason: String| CatalogError::Invalid {
                origin: origin.to_string(),
                exercise: def.name.clone(),
                reason,
            };
            let spec = def.test.into_spec().map_err(invalid)?;
            let exercise = Exercise::new(def.name.clone(), def.description, def.difficulty, spec);
            Ok(match def.max_attempts {
                Some(max) => exercise.with_max_attempts(max),
                None => exercise,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(set = %file.name, count = exercises.len(), "Parsed exercise set");
    Ok(ExerciseSet {
        name: file.name,
        exercises,
    })
}

pub fn load_exercise_set(path: &Path) -> Result<ExerciseSet> {
    let content = std::fs::read_to_string(path)?;
    parse_exercise_set(&content, &path.display().to_string())
}

/// Loads every `*.json` file in `dir`, in file name order.
pub fn load_exercise_sets(dir: &Path) -> Result<Vec<ExerciseSet>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths.iter().map(|path| load_exercise_set(path)).collect()
}

pub fn builtin_set(tier: Tier) -> Result<ExerciseSet> {
    let (_, json) = BUILTIN
        .iter()
        .find(|(t, _)| *t == tier)
        .copied()
        .unwrap_or((tier, "{\"name\": \"empty\", \"exercises\": []}"));
    parse_exercise_set(json, &format!("built-in {} set", tier.as_str()))
}

pub fn builtin_sets() -> Result<Vec<ExerciseSet>> {
    Tier::all().iter().map(|tier| builtin_set(*tier)).collect()
}

/// Flattens `sets`, keeps the exercises of `tier` (all when `None`) and
/// applies the attempt budget to each.
pub fn select_exercises(sets: Vec<ExerciseSet>, tier: Option<Tier>, max_attempts: u32) -> Vec<Exercise> {
    sets.into_iter()
        .flat_map(|set| set.exercises)
        .filter(|ex| tier.map_or(true, |t| ex.difficulty().tier() == t))
        .map(|ex| ex.with_max_attempts(max_attempts))
        .collect()
}
