use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use llmbench_core::Value;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Evaluator, EvaluatorError, Execution, Namespace, PyException, Result};

const DRIVER: &str = include_str!("driver.py");

/// Marks the start of every driver reply. Lines without it were written by
/// the code under test and are skipped.
const SENTINEL: char = '\u{1e}';

/// Bytes of interpreter stderr kept for exit diagnostics.
const STDERR_TAIL: usize = 4096;
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Runs generated code in a `python3` subprocess, one process per namespace.
///
/// The process has no resource limits; it only shields the runner from
/// crashes and runaway output. An optional timeout bounds each operation.
pub struct PythonEvaluator {
    interpreter: String,
    timeout: Option<Duration>,
    work_dir: TempDir,
}

impl PythonEvaluator {
    pub fn new(interpreter: impl Into<String>) -> std::io::Result<Self> {
        Ok(Self {
            interpreter: interpreter.into(),
            timeout: None,
            work_dir: TempDir::new()?,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.current_dir(self.work_dir.path())
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> EvaluatorError {
        EvaluatorError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        }
    }
}

#[async_trait]
impl Evaluator for PythonEvaluator {
    async fn check(&self) -> Result<String> {
        let output = self
            .command()
            .args(["-c", "import sys; print(sys.version.split()[0])"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvaluatorError::Exited(stderr.trim().to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.starts_with('3') {
            return Err(EvaluatorError::Protocol(format!(
                "'{}' is not a Python 3 interpreter (reported '{version}')",
                self.interpreter
            )));
        }
        Ok(version)
    }

    async fn spawn(&self) -> Result<Box<dyn Namespace>> {
        let mut child = self
            .command()
            .args(["-u", "-c", DRIVER])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
            return Err(EvaluatorError::Protocol("interpreter pipes unavailable".into()));
        };

        debug!(pid = ?child.id(), "Spawned Python namespace");
        Ok(Box::new(PythonNamespace {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: Some(drain_stderr(stderr)),
            timeout: self.timeout,
            terminated: None,
        }))
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Exec {
        source: &'a str,
    },
    Eval {
        source: &'a str,
    },
    Lookup {
        name: &'a str,
    },
    Call {
        target: &'a str,
        args: &'a [Value],
        bind: Option<&'a str>,
    },
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    found: bool,
    #[serde(default)]
    error: Option<PyException>,
    #[serde(default)]
    protocol_error: Option<String>,
}

impl Reply {
    fn into_execution(self) -> Execution<Value> {
        match self.error {
            Some(exc) => Execution::raised(self.stdout, exc),
            None => Execution::ok(self.stdout, self.value.unwrap_or(Value::None)),
        }
    }
}

struct PythonNamespace {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    timeout: Option<Duration>,
    /// Set once the process is gone; later operations fail with it.
    terminated: Option<String>,
}

impl PythonNamespace {
    async fn request(&mut self, request: &Request<'_>) -> Result<Reply> {
        if let Some(reason) = &self.terminated {
            return Err(EvaluatorError::Exited(reason.clone()));
        }

        let Some(limit) = self.timeout else {
            return self.round_trip(request).await;
        };

        match tokio::time::timeout(limit, self.round_trip(request)).await {
            Ok(reply) => reply,
            Err(_) => {
                let ms = limit.as_millis() as u64;
                warn!(timeout_ms = ms, "Evaluation timed out, killing interpreter");
                if let Err(e) = self.child.start_kill() {
                    debug!(error = %e, "Interpreter already gone");
                }
                self.terminated = Some(format!("killed after {ms}ms timeout"));
                Err(EvaluatorError::Timeout(ms))
            }
        }
    }

    async fn round_trip(&mut self, request: &Request<'_>) -> Result<Reply> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| EvaluatorError::Protocol(e.to_string()))?;
        line.push('\n');

        if let Err(e) = self.write_line(&line).await {
            debug!(error = %e, "Write to interpreter failed");
            return Err(self.exited().await);
        }

        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(self.exited().await);
            };
            let Some((_, payload)) = line.split_once(SENTINEL) else {
                debug!(line = %line, "Skipping stray interpreter output");
                continue;
            };

            let mut reply: Reply = serde_json::from_str(payload)
                .map_err(|e| EvaluatorError::Protocol(format!("bad reply: {e}")))?;
            if let Some(message) = reply.protocol_error.take() {
                return Err(EvaluatorError::Protocol(message));
            }
            return Ok(reply);
        }
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await
    }

    async fn exited(&mut self) -> EvaluatorError {
        let status = self.child.wait().await;
        let stderr = match self.stderr.take() {
            Some(tail) => match tokio::time::timeout(STDERR_GRACE, tail).await {
                Ok(Ok(text)) => text,
                _ => {
                    debug!("Interpreter stderr not available");
                    String::new()
                }
            },
            None => String::new(),
        };
        let reason = match status {
            Ok(status) => format!("{status}: {}", stderr.trim()),
            Err(e) => format!("{e}: {}", stderr.trim()),
        };
        let reason = reason.trim_end_matches([':', ' ']).to_string();
        self.terminated = Some(reason.clone());
        EvaluatorError::Exited(reason)
    }
}

/// Reads stderr continuously so a chatty child never blocks on a full pipe,
/// keeping only the last [`STDERR_TAIL`] bytes.
fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut tail = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match stderr.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Interpreter stderr closed");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

#[async_trait]
impl Namespace for PythonNamespace {
    async fn exec(&mut self, source: &str) -> Result<Execution<()>> {
        let reply = self.request(&Request::Exec { source }).await?;
        Ok(match reply.error {
            Some(exc) => Execution::raised(reply.stdout, exc),
            None => Execution::ok(reply.stdout, ()),
        })
    }

    async fn eval(&mut self, source: &str) -> Result<Execution<Value>> {
        let reply = self.request(&Request::Eval { source }).await?;
        Ok(reply.into_execution())
    }

    async fn lookup(&mut self, name: &str) -> Result<Option<Value>> {
        let reply = self.request(&Request::Lookup { name }).await?;
        Ok(reply
            .found
            .then(|| reply.value.unwrap_or(Value::None)))
    }

    async fn call(
        &mut self,
        target: &str,
        args: &[Value],
        bind: Option<&str>,
    ) -> Result<Execution<Value>> {
        let reply = self.request(&Request::Call { target, args, bind }).await?;
        Ok(reply.into_execution())
    }
}
