//! Dynamic code execution as an explicit capability.
//!
//! An [`Evaluator`] hands out fresh [`Namespace`]s. Everything the graders
//! need from the interpreter (run a script, evaluate an expression, read a
//! binding, call something) goes through a namespace, and nothing survives
//! once it is dropped.

mod python;

use std::fmt;

use async_trait::async_trait;
use llmbench_core::Value;
use serde::Deserialize;
use thiserror::Error;

pub use python::PythonEvaluator;

/// Infrastructure failure: the interpreter itself misbehaved. Exceptions
/// raised by the code under test are [`PyException`]s instead.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Failed to start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        source: std::io::Error,
    },
    #[error("Interpreter exited unexpectedly: {0}")]
    Exited(String),
    #[error("Timeout after {0}ms")]
    Timeout(u64),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EvaluatorError>;

/// An exception raised by evaluated code.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PyException {
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

impl PyException {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Arity and argument-type mismatches surface as `TypeError`.
    pub fn is_type_error(&self) -> bool {
        self.kind == "TypeError"
    }
}

impl fmt::Display for PyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message.is_empty() {
            true => f.write_str(&self.kind),
            false => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Result of one namespace operation plus whatever it printed.
#[derive(Clone, Debug)]
pub struct Execution<T> {
    pub stdout: String,
    pub result: std::result::Result<T, PyException>,
}

impl<T> Execution<T> {
    pub fn ok(stdout: impl Into<String>, value: T) -> Self {
        Self {
            stdout: stdout.into(),
            result: Ok(value),
        }
    }

    pub fn raised(stdout: impl Into<String>, exception: PyException) -> Self {
        Self {
            stdout: stdout.into(),
            result: Err(exception),
        }
    }
}

/// One isolated, mutable global scope.
#[async_trait]
pub trait Namespace: Send {
    /// Runs statements.
    async fn exec(&mut self, source: &str) -> Result<Execution<()>>;

    /// Evaluates a single expression.
    async fn eval(&mut self, source: &str) -> Result<Execution<Value>>;

    /// Reads a global binding without running any code.
    async fn lookup(&mut self, name: &str) -> Result<Option<Value>>;

    /// Calls `target` (a global or a dotted attribute path such as
    /// `cache.get`) with positional `args`. When `bind` is set the return
    /// value is also stored under that global name.
    async fn call(
        &mut self,
        target: &str,
        args: &[Value],
        bind: Option<&str>,
    ) -> Result<Execution<Value>>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Verifies the interpreter is usable and reports its version.
    async fn check(&self) -> Result<String>;

    /// Opens a fresh, empty namespace.
    async fn spawn(&self) -> Result<Box<dyn Namespace>>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory namespace for grader tests. Code strings are looked up in a
    //! script table instead of being interpreted.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    type CallFn = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, PyException> + Send + Sync>;

    /// Effect of running a source string.
    #[derive(Clone, Default)]
    pub struct Script {
        pub stdout: String,
        pub raises: Option<PyException>,
        pub binds: Vec<(String, Value)>,
        pub functions: Vec<(String, CallFn)>,
    }

    impl Script {
        pub fn prints(text: &str) -> Self {
            Self {
                stdout: text.to_string(),
                ..Default::default()
            }
        }

        pub fn raises(kind: &str, message: &str) -> Self {
            Self {
                raises: Some(PyException::new(kind, message)),
                ..Default::default()
            }
        }

        pub fn binds(name: &str, value: Value) -> Self {
            Self {
                binds: vec![(name.to_string(), value)],
                ..Default::default()
            }
        }

        pub fn defines<F>(name: &str, f: F) -> Self
        where
            F: Fn(&[Value]) -> std::result::Result<Value, PyException> + Send + Sync + 'static,
        {
            Self {
                functions: vec![(name.to_string(), Arc::new(f))],
                ..Default::default()
            }
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeEvaluator {
        scripts: HashMap<String, Script>,
        expressions: HashMap<String, Value>,
        pub calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    }

    impl FakeEvaluator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(mut self, source: &str, script: Script) -> Self {
            self.scripts.insert(source.to_string(), script);
            self
        }

        pub fn expression(mut self, source: &str, value: Value) -> Self {
            self.expressions.insert(source.to_string(), value);
            self
        }

        pub fn recorded_calls(&self) -> Vec<(String, Vec<Value>)> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Evaluator for FakeEvaluator {
        async fn check(&self) -> Result<String> {
            Ok("fake".to_string())
        }

        async fn spawn(&self) -> Result<Box<dyn Namespace>> {
            Ok(Box::new(FakeNamespace {
                evaluator: self.clone(),
                globals: HashMap::new(),
                functions: HashMap::new(),
            }))
        }
    }

    struct FakeNamespace {
        evaluator: FakeEvaluator,
        globals: HashMap<String, Value>,
        functions: HashMap<String, CallFn>,
    }

    #[async_trait]
    impl Namespace for FakeNamespace {
        async fn exec(&mut self, source: &str) -> Result<Execution<()>> {
            let Some(script) = self.evaluator.scripts.get(source).cloned() else {
                return Ok(Execution::raised(
                    "",
                    PyException::new("SyntaxError", "invalid syntax (<solution>, line 1)"),
                ));
            };
            self.globals.extend(script.binds);
            for (name, f) in script.functions {
                self.globals
                    .insert(name.clone(), Value::Opaque(format!("<function {name}>")));
                self.functions.insert(name, f);
            }
            Ok(match script.raises {
                Some(exc) => Execution::raised(script.stdout, exc),
                None => Execution::ok(script.stdout, ()),
            })
        }

        async fn eval(&mut self, source: &str) -> Result<Execution<Value>> {
            Ok(match self.evaluator.expressions.get(source) {
                Some(value) => Execution::ok("", value.clone()),
                None => Execution::raised("", PyException::new("SyntaxError", "invalid syntax")),
            })
        }

        async fn lookup(&mut self, name: &str) -> Result<Option<Value>> {
            Ok(self.globals.get(name).cloned())
        }

        async fn call(
            &mut self,
            target: &str,
            args: &[Value],
            bind: Option<&str>,
        ) -> Result<Execution<Value>> {
            if let Ok(mut calls) = self.evaluator.calls.lock() {
                calls.push((target.to_string(), args.to_vec()));
            }
            let Some(f) = self.functions.get(target).cloned() else {
                return Ok(Execution::raised(
                    "",
                    PyException::new("NameError", format!("name '{target}' is not defined")),
                ));
            };
            let result = f(args);
            if let (Some(name), Ok(value)) = (bind, &result) {
                self.globals.insert(name.to_string(), value.clone());
            }
            Ok(Execution {
                stdout: String::new(),
                result,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        let exc = PyException::new("ZeroDivisionError", "division by zero");
        assert_eq!(exc.to_string(), "ZeroDivisionError: division by zero");
        assert_eq!(PyException::new("StopIteration", "").to_string(), "StopIteration");
        assert!(PyException::new("TypeError", "x").is_type_error());
    }
}
