use crate::Value;

/// Grading contract of an exercise. Fixed at construction.
#[derive(Clone, Debug)]
pub enum TestSpec {
    /// Run the code and compare what it printed (or bound to `result`, or
    /// evaluated to) against one expected value.
    Execution(ExecutionTest),
    /// Call a named function once per case.
    Function(FunctionTest),
    /// Instantiate a named class and drive scripted method calls.
    Scripted(ScriptedTest),
}

impl TestSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            TestSpec::Execution(_) => "execution",
            TestSpec::Function(_) => "function",
            TestSpec::Scripted(_) => "scripted",
        }
    }
}

impl From<ExecutionTest> for TestSpec {
    fn from(test: ExecutionTest) -> Self {
        TestSpec::Execution(test)
    }
}

impl From<FunctionTest> for TestSpec {
    fn from(test: FunctionTest) -> Self {
        TestSpec::Function(test)
    }
}

impl From<ScriptedTest> for TestSpec {
    fn from(test: ScriptedTest) -> Self {
        TestSpec::Scripted(test)
    }
}

// =============================================================================
// Raw execution
// =============================================================================

#[derive(Clone, Debug)]
pub struct ExecutionTest {
    pub expected: Value,
    /// Executed first, in the same namespace.
    pub setup: Option<String>,
}

impl ExecutionTest {
    pub fn new(expected: impl Into<Value>) -> Self {
        Self {
            expected: expected.into(),
            setup: None,
        }
    }

    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        let setup = setup.into();
        self.setup = (!setup.trim().is_empty()).then_some(setup);
        self
    }
}

// =============================================================================
// Named function
// =============================================================================

/// How a case input is handed to the function under test.
#[derive(Clone, Debug, PartialEq)]
pub enum CaseInput {
    /// `f(value)`
    Single(Value),
    /// `f(*value)`, holding the list or tuple being unpacked.
    Multi(Value),
}

impl CaseInput {
    /// A sequence with more than one element is unpacked; anything else is
    /// passed as a single argument.
    pub fn from_value(value: Value) -> Self {
        if value.as_sequence().is_some_and(|items| items.len() > 1) {
            CaseInput::Multi(value)
        } else {
            CaseInput::Single(value)
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            CaseInput::Single(value) => vec![value.clone()],
            CaseInput::Multi(value) => value
                .as_sequence()
                .map_or_else(|| vec![value.clone()], <[Value]>::to_vec),
        }
    }

    /// The opposite calling convention, if one exists.
    pub fn flipped(&self) -> Option<CaseInput> {
        match self {
            CaseInput::Single(value) => value
                .as_sequence()
                .map(|_| CaseInput::Multi(value.clone())),
            CaseInput::Multi(value) => Some(CaseInput::Single(value.clone())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionCase {
    pub input: CaseInput,
    pub expected: Value,
}

impl FunctionCase {
    pub fn new(input: impl Into<Value>, expected: impl Into<Value>) -> Self {
        Self {
            input: CaseInput::from_value(input.into()),
            expected: expected.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionTest {
    pub function: String,
    pub cases: Vec<FunctionCase>,
}

impl FunctionTest {
    pub fn new(function: impl Into<String>, cases: Vec<FunctionCase>) -> Self {
        Self {
            function: function.into(),
            cases,
        }
    }
}

// =============================================================================
// Scripted (stateful) test
// =============================================================================

#[derive(Clone, Debug)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// One fresh instance driven through `steps`; the collected return values
/// must equal `expected` as a whole.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub constructor_args: Vec<Value>,
    pub steps: Vec<MethodCall>,
    pub expected: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct ScriptedTest {
    pub class_name: String,
    pub scenarios: Vec<Scenario>,
}

impl ScriptedTest {
    pub fn new(class_name: impl Into<String>, scenarios: Vec<Scenario>) -> Self {
        Self {
            class_name: class_name.into(),
            scenarios,
        }
    }
}
