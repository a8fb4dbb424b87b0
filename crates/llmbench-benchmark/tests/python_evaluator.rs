//! Grading against a real Python interpreter. Every test returns early when
//! no Python 3 is available.

use std::time::Duration;

use llmbench_benchmark::{builtin_set, grade, Evaluator, Namespace, PythonEvaluator};
use llmbench_core::{
    AttemptStatus, ExecutionTest, FunctionCase, FunctionTest, TestSpec, Tier, Value,
};

fn interpreter() -> String {
    std::env::var("LLMBENCH_PYTHON").unwrap_or_else(|_| "python3".to_string())
}

async fn python(timeout: Option<Duration>) -> Option<PythonEvaluator> {
    let evaluator = PythonEvaluator::new(interpreter()).ok()?.with_timeout(timeout);
    match evaluator.check().await {
        Ok(_) => Some(evaluator),
        Err(e) => {
            eprintln!("{e}, skipping test.");
            None
        }
    }
}

fn add_numbers() -> TestSpec {
    let pair = |a: i64, b: i64| Value::List(vec![Value::Int(a), Value::Int(b)]);
    FunctionTest::new(
        "add_numbers",
        vec![
            FunctionCase::new(pair(2, 3), 5i64),
            FunctionCase::new(pair(10, -5), 5i64),
            FunctionCase::new(pair(-3, -7), -10i64),
        ],
    )
    .into()
}

fn scripted(tier: Tier, name: &str) -> TestSpec {
    let set = builtin_set(tier).unwrap();
    set.exercises
        .into_iter()
        .find(|e| e.name() == name)
        .map(|e| e.test().clone())
        .unwrap()
}

#[tokio::test]
async fn add_numbers_passes() {
    let Some(py) = python(None).await else {
        return;
    };

    let result = grade(&add_numbers(), "def add_numbers(a, b):\n    return a + b", &py).await;
    assert_eq!(result.status, AttemptStatus::Passed);
    assert_eq!(result.actual_output, Some(Value::str("All 3 test cases passed")));
    assert!(result.grading_time_ms.is_some());
}

#[tokio::test]
async fn add_numbers_reports_first_mismatch() {
    let Some(py) = python(None).await else {
        return;
    };

    let result = grade(&add_numbers(), "def add_numbers(a, b):\n    return a - b", &py).await;
    assert_eq!(result.status, AttemptStatus::Failed);
    assert_eq!(result.expected_output, Some(Value::Int(5)));
    assert_eq!(result.actual_output, Some(Value::Int(-1)));
    assert_eq!(
        result.error_message.as_deref(),
        Some("Test case 1 failed: add_numbers(2, 3) returned -1, expected 5")
    );
}

#[tokio::test]
async fn list_argument_falls_back_to_single_call() {
    let Some(py) = python(None).await else {
        return;
    };

    let spec: TestSpec = FunctionTest::new(
        "find_max",
        vec![FunctionCase::new(
            Value::List(vec![Value::Int(1), Value::Int(5), Value::Int(3)]),
            5i64,
        )],
    )
    .into();
    let result = grade(&spec, "def find_max(items):\n    return max(items)", &py).await;
    assert_eq!(result.status, AttemptStatus::Passed);
}

#[tokio::test]
async fn missing_function_is_an_error() {
    let Some(py) = python(None).await else {
        return;
    };

    let result = grade(&add_numbers(), "def add(a, b):\n    return a + b", &py).await;
    assert_eq!(result.status, AttemptStatus::Error);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Function 'add_numbers' not found in code")
    );
}

#[tokio::test]
async fn printed_output_is_compared() {
    let Some(py) = python(None).await else {
        return;
    };

    let spec: TestSpec = ExecutionTest::new("Hello, World!").into();
    let result = grade(&spec, "print('Hello, World!')", &py).await;
    assert_eq!(result.status, AttemptStatus::Passed);

    let spec: TestSpec = ExecutionTest::new(4i64).into();
    let result = grade(&spec, "print(2 + 2)", &py).await;
    assert_eq!(result.actual_output, Some(Value::Int(4)));
    assert_eq!(result.status, AttemptStatus::Passed);
}

#[tokio::test]
async fn result_binding_and_bare_expression() {
    let Some(py) = python(None).await else {
        return;
    };

    let spec: TestSpec = ExecutionTest::new(4i64).into();
    let bound = grade(&spec, "result = 2 + 2", &py).await;
    assert_eq!(bound.status, AttemptStatus::Passed);

    let expression = grade(&spec, "2 + 2", &py).await;
    assert_eq!(expression.status, AttemptStatus::Passed);
    assert_eq!(expression.actual_output, Some(Value::Int(4)));
}

#[tokio::test]
async fn setup_runs_in_same_namespace() {
    let Some(py) = python(None).await else {
        return;
    };

    let spec: TestSpec = ExecutionTest::new(10i64).with_setup("base = 7").into();
    let result = grade(&spec, "print(base + 3)", &py).await;
    assert_eq!(result.status, AttemptStatus::Passed);
}

#[tokio::test]
async fn syntax_error_is_reported() {
    let Some(py) = python(None).await else {
        return;
    };

    let result = grade(&add_numbers(), "def add_numbers(a, b:\n    return a + b", &py).await;
    assert_eq!(result.status, AttemptStatus::Error);
    assert!(result
        .error_message
        .as_deref()
        .is_some_and(|m| m.starts_with("SyntaxError")));
}

#[tokio::test]
async fn lru_cache_scenario_passes() {
    let Some(py) = python(None).await else {
        return;
    };

    let code = r#"
from collections import OrderedDict

class LRUCache:
    def __init__(self, capacity):
        self.capacity = capacity
        self.items = OrderedDict()

    def get(self, key):
        if key not in self.items:
            return -1
        self.items.move_to_end(key)
        return self.items[key]

    def put(self, key, value):
        self.items[key] = value
        self.items.move_to_end(key)
        if len(self.items) > self.capacity:
            self.items.popitem(last=False)
"#;
    let result = grade(&scripted(Tier::Advanced, "LRU Cache"), code, &py).await;
    assert_eq!(result.status, AttemptStatus::Passed, "{:?}", result.error_message);
}

#[tokio::test]
async fn trie_scenario_reports_sequence_mismatch() {
    let Some(py) = python(None).await else {
        return;
    };

    // prefix_count only counts exact matches
    let code = r#"
class Trie:
    def __init__(self):
        self.words = set()

    def insert(self, word):
        self.words.add(word)

    def search(self, word):
        return word in self.words

    def prefix_count(self, prefix):
        return sum(1 for w in self.words if w == prefix)
"#;
    let result = grade(&scripted(Tier::SuperHard, "Trie with Prefix Count"), code, &py).await;
    assert_eq!(result.status, AttemptStatus::Failed);
    assert!(result
        .error_message
        .as_deref()
        .is_some_and(|m| m.starts_with("Scenario 1 failed")));
}

#[tokio::test]
async fn runaway_code_times_out() {
    let Some(py) = python(Some(Duration::from_millis(500))).await else {
        return;
    };

    let spec: TestSpec = ExecutionTest::new(1i64).into();
    let result = grade(&spec, "while True:\n    pass", &py).await;
    assert_eq!(result.status, AttemptStatus::Error);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Execution timed out after 500ms")
    );
}

#[tokio::test]
async fn noisy_function_does_not_corrupt_replies() {
    let Some(py) = python(None).await else {
        return;
    };

    let code = "def add_numbers(a, b):\n    print('\\x1e{\"bogus\": true}')\n    return a + b";
    let result = grade(&add_numbers(), code, &py).await;
    assert_eq!(result.status, AttemptStatus::Passed);
}

#[tokio::test]
async fn stderr_flood_does_not_block_grading() {
    let Some(py) = python(None).await else {
        return;
    };

    let spec: TestSpec = ExecutionTest::new(1i64).into();
    let code = "import os\nos.write(2, b'x' * 300000)\nresult = 1";
    let result = tokio::time::timeout(Duration::from_secs(10), grade(&spec, code, &py))
        .await
        .expect("grading blocked on a full stderr pipe");
    assert_eq!(result.status, AttemptStatus::Passed, "{:?}", result.error_message);
}

#[tokio::test]
async fn namespaces_are_isolated() {
    let Some(py) = python(None).await else {
        return;
    };

    let mut first = py.spawn().await.unwrap();
    first.exec("secret = 42").await.unwrap().result.unwrap();
    assert_eq!(first.lookup("secret").await.unwrap(), Some(Value::Int(42)));

    let mut second = py.spawn().await.unwrap();
    assert_eq!(second.lookup("secret").await.unwrap(), None);
}

#[tokio::test]
async fn values_round_trip_through_interpreter() {
    let Some(py) = python(None).await else {
        return;
    };

    let mut ns = py.spawn().await.unwrap();
    let value = ns
        .eval("({1: 'a'}, (1, 2), {3}, None, 2.5, 10 ** 30)")
        .await
        .unwrap()
        .result
        .unwrap();
    let Value::Tuple(items) = value else {
        panic!("expected a tuple");
    };
    assert_eq!(items[0], Value::Dict(vec![(Value::Int(1), Value::str("a"))]));
    assert_eq!(items[1], Value::Tuple(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(items[2], Value::Set(vec![Value::Int(3)]));
    assert_eq!(items[3], Value::None);
    assert_eq!(items[4], Value::Float(2.5));
    assert!(matches!(&items[5], Value::Opaque(repr) if repr.starts_with("1000")));
}

#[tokio::test]
async fn interpreter_exit_is_an_error() {
    let Some(py) = python(None).await else {
        return;
    };

    let spec: TestSpec = ExecutionTest::new(1i64).into();
    let result = grade(&spec, "import os\nos._exit(3)", &py).await;
    assert_eq!(result.status, AttemptStatus::Error);
    assert!(result
        .error_message
        .as_deref()
        .is_some_and(|m| m.starts_with("Evaluator failure")));
}
