use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use llmbench_benchmark::{
    build_client, builtin_sets, load_exercise_sets, select_exercises, BenchmarkEvent,
    BenchmarkRunner, Evaluator, HtmlReport, PythonEvaluator, ResultStore,
};
use llmbench_core::{
    AttemptStatus, BenchConfig, BenchError, BenchmarkStats, ExerciseOutcome, Provider, Tier,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const PYTHON_ENV: &str = "LLMBENCH_PYTHON";
const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Parser)]
#[command(name = "llmbench")]
#[command(about = "LlmBench - iterative coding benchmark for LLMs", long_about = None)]
struct Cli {
    /// Model to benchmark
    model: String,

    /// Exercise tier to run
    #[arg(long, value_enum, default_value = "all")]
    difficulty: DifficultyArg,

    /// Maximum attempts per exercise
    #[arg(long, default_value = "3")]
    max_attempts: u32,

    /// Model backend
    #[arg(long, value_enum, default_value = "ollama")]
    provider: ProviderArg,

    /// Backend URL (defaults to $OLLAMA_HOST or the provider default)
    #[arg(long)]
    base_url: Option<String>,

    /// API key for OpenAI-compatible backends (defaults to $OPENROUTER_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Temperature for generation
    #[arg(long, default_value = "0.0")]
    temperature: f32,

    /// Model request timeout in seconds
    #[arg(long, default_value = "120")]
    timeout: u64,

    /// Per-operation limit for generated code in milliseconds (unbounded by default)
    #[arg(long)]
    exec_timeout: Option<u64>,

    /// Python interpreter (defaults to $LLMBENCH_PYTHON or python3)
    #[arg(long)]
    python: Option<String>,

    /// Load exercise sets from JSON files in this directory instead of the built-in tiers
    #[arg(long)]
    exercises_dir: Option<PathBuf>,

    /// Directory for saved results and reports
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Only print the final summary
    #[arg(long)]
    quiet: bool,

    /// Don't save results to file
    #[arg(long)]
    no_save: bool,

    /// Don't generate the HTML report
    #[arg(long)]
    no_html: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Basic,
    Intermediate,
    Advanced,
    #[value(name = "super_hard")]
    SuperHard,
    All,
}

impl DifficultyArg {
    fn tier(self) -> Option<Tier> {
        match self {
            DifficultyArg::Basic => Some(Tier::Basic),
            DifficultyArg::Intermediate => Some(Tier::Intermediate),
            DifficultyArg::Advanced => Some(Tier::Advanced),
            DifficultyArg::SuperHard => Some(Tier::SuperHard),
            DifficultyArg::All => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Ollama,
    #[value(name = "openai")]
    OpenAi,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Ollama => Provider::Ollama,
            ProviderArg::OpenAi => Provider::OpenAi,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> BenchConfig {
    let provider = Provider::from(cli.provider);
    let base_url = cli.base_url.clone().or_else(|| match provider {
        Provider::Ollama => std::env::var(OLLAMA_HOST_ENV).ok(),
        Provider::OpenAi => None,
    });

    BenchConfig {
        model_id: cli.model.clone(),
        provider,
        base_url,
        temperature: cli.temperature,
        max_attempts: cli.max_attempts,
        request_timeout_secs: cli.timeout,
        execution_timeout_ms: cli.exec_timeout,
        python: cli
            .python
            .clone()
            .or_else(|| std::env::var(PYTHON_ENV).ok())
            .unwrap_or_else(|| "python3".to_string()),
        output_dir: cli.output_dir.clone(),
        save_results: !cli.no_save,
        generate_html: !cli.no_html,
        verbose: !cli.quiet,
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = build_config(&cli);
    config.validate()?;

    let cancel_token = CancellationToken::new();
    let interrupt = {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    let result = benchmark(&cli, &config, cancel_token).await;
    interrupt.abort();

    match result {
        Err(e) => match e.downcast_ref::<BenchError>() {
            Some(BenchError::Cancelled) => {
                println!("\n{}", "Benchmark interrupted by user.".yellow());
                Ok(ExitCode::FAILURE)
            }
            _ => Err(e),
        },
        ok => ok,
    }
}

/// Resolves `fut` unless `token` is cancelled first.
async fn until_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        _ = token.cancelled() => Err(BenchError::Cancelled.into()),
        output = fut => Ok(output),
    }
}

async fn benchmark(cli: &Cli, config: &BenchConfig, cancel_token: CancellationToken) -> Result<ExitCode> {
    let evaluator = PythonEvaluator::new(&config.python)?.with_timeout(config.execution_timeout());
    let version = until_cancelled(&cancel_token, evaluator.check())
        .await?
        .with_context(|| format!("Python interpreter '{}' is not usable", config.python))?;
    info!(interpreter = %config.python, version = %version, "Python interpreter ready");

    let client = build_client(config, cli.api_key.clone())?;
    let models = until_cancelled(&cancel_token, client.list_models())
        .await?
        .with_context(|| {
            format!(
                "Cannot connect to {} at {}",
                config.provider.label(),
                config.base_url()
            )
        })?;
    debug!(count = models.len(), "Backend reachable");

    until_cancelled(&cancel_token, client.ensure_model(&config.model_id))
        .await?
        .with_context(|| format!("Model '{}' is not available", config.model_id))?;

    let sets = match &cli.exercises_dir {
        Some(dir) => load_exercise_sets(dir)?,
        None => builtin_sets()?,
    };
    let mut exercises = select_exercises(sets, cli.difficulty.tier(), config.max_attempts);
    if exercises.is_empty() {
        eprintln!("{}", "No exercises loaded. Check difficulty setting.".red());
        return Ok(ExitCode::FAILURE);
    }

    let mut runner = BenchmarkRunner::new(client, Arc::new(evaluator), config.clone());
    if config.save_results {
        let dir = config.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        runner = runner.with_result_store(ResultStore::new(dir));
        if config.generate_html {
            runner = runner.with_renderer(Box::new(HtmlReport));
        }
    }

    println!(
        "Starting benchmark for model '{}' with {} exercises...",
        config.model_id,
        exercises.len()
    );

    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(rx, config.verbose, config.temperature));

    let result = runner
        .run(&config.model_id, &mut exercises, cancel_token, tx)
        .await;
    let _ = printer.await;

    let outcome = result?;
    if !config.verbose {
        print_quiet_summary(&outcome.stats);
    }
    Ok(match outcome.stats.passed_exercises > 0 {
        true => ExitCode::SUCCESS,
        false => ExitCode::FAILURE,
    })
}

async fn print_events(mut rx: mpsc::Receiver<BenchmarkEvent>, verbose: bool, temperature: f32) {
    while let Some(event) = rx.recv().await {
        match event {
            BenchmarkEvent::ReportSaved { path } => {
                println!("{}", format!("Saved: {}", path.display()).cyan());
            }
            BenchmarkEvent::Warning { message } => {
                println!("{}", format!("Warning: {message}").yellow());
            }
            event if verbose => print_progress(event, temperature),
            _ => {}
        }
    }
}

fn print_progress(event: BenchmarkEvent, temperature: f32) {
    let rule = "=".repeat(60);
    match event {
        BenchmarkEvent::Started { model, total } => {
            println!("\n{}", "=".repeat(70).magenta());
            println!("{}", "Starting LLM Benchmark".magenta());
            println!("{}", format!("Model: {model}").magenta());
            println!("{}", format!("Total Exercises: {total}").magenta());
            println!("{}", "=".repeat(70).magenta());
        }
        BenchmarkEvent::Exercise {
            current,
            total,
            name,
            difficulty,
        } => {
            println!("\n{}", format!("Progress: {current}/{total}").magenta());
            println!("{}", rule.cyan());
            println!("{}", format!("Running Exercise: {name}").cyan());
            println!("{}", format!("Difficulty: {}", difficulty.label()).cyan());
            println!("{}", rule.cyan());
        }
        BenchmarkEvent::Attempt {
            attempt,
            max_attempts,
        } => {
            println!("\n{}", format!("Attempt {attempt}/{max_attempts}").yellow());
            if attempt > 1 {
                println!("{}", "Retrying with full conversation history...".yellow());
            }
        }
        BenchmarkEvent::CodeGenerated {
            code,
            generation_time_ms,
        } => {
            println!(
                "{}",
                format!("Generated code ({:.1}s):", generation_time_ms / 1000.0).blue()
            );
            println!("{code}");
        }
        BenchmarkEvent::AttemptGraded {
            status,
            expected,
            actual,
            error,
            ..
        } => match status {
            AttemptStatus::Passed => {
                println!("\n{}", "✓ PASSED!".green().bold());
                if let Some(actual) = actual {
                    println!("{}", format!("Output: {actual}").green());
                }
            }
            AttemptStatus::Failed => {
                println!("\n{}", "✗ FAILED".red().bold());
                if let Some(message) = error {
                    println!("{}", message.red());
                }
                println!("{}", format!("Expected: {}", expected.unwrap_or_default()).red());
                println!("{}", format!("Got: {}", actual.unwrap_or_default()).red());
            }
            AttemptStatus::Error => {
                println!("\n{}", "✗ ERROR".red().bold());
                println!("{}", format!("Error: {}", error.unwrap_or_default()).red());
            }
        },
        BenchmarkEvent::SystemError { message, .. } => {
            println!("\n{}", format!("✗ {message}").red().bold());
        }
        BenchmarkEvent::ExerciseFinished {
            outcome, attempts, ..
        } => {
            let line = format!("Exercise finished: {outcome:?} after {attempts} attempt(s)");
            match outcome {
                ExerciseOutcome::Passed => println!("{}", line.green()),
                _ => println!("{}", line.red()),
            }
        }
        BenchmarkEvent::Done { stats } => print_summary(&stats, temperature),
        BenchmarkEvent::Cancelled => {
            println!("\n{}", "Benchmark cancelled".yellow());
        }
        BenchmarkEvent::ReportSaved { .. } | BenchmarkEvent::Warning { .. } => {}
    }
}

fn print_summary(stats: &BenchmarkStats, temperature: f32) {
    let rule = "=".repeat(70);
    println!("\n{}", rule.magenta());
    println!("{}", "BENCHMARK SUMMARY".magenta().bold());
    println!("{}", rule.magenta());
    println!("Model: {}", stats.model_name);
    println!("Temperature: {temperature}");
    println!("Total Exercises: {}", stats.total_exercises);
    println!("{}", format!("Passed: {}", stats.passed_exercises).green());
    println!("{}", format!("Failed: {}", stats.failed_exercises).red());
    println!("{}", format!("Errors: {}", stats.error_exercises).red());
    println!("{}", format!("Success Rate: {:.1}%", stats.success_rate()).cyan());
    println!("{}", format!("Average Attempts: {:.1}", stats.average_attempts()).cyan());
    println!("{}", format!("Total Time: {:.1} seconds", stats.total_time_secs).cyan());
    println!("{}", rule.magenta());
}

fn print_quiet_summary(stats: &BenchmarkStats) {
    println!("\nBenchmark completed!");
    println!(
        "Success rate: {:.1}% ({}/{})",
        stats.success_rate(),
        stats.passed_exercises,
        stats.total_exercises
    );
    println!("Total time: {:.1} seconds", stats.total_time_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["llmbench", "llama3.1:8b"]).unwrap();
        let config = build_config(&cli);
        assert_eq!(config.model_id, "llama3.1:8b");
        assert_eq!(config.max_attempts, 3);
        assert!(config.save_results && config.generate_html && config.verbose);
        assert!(cli.difficulty.tier().is_none());
        assert!(config.execution_timeout().is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "llmbench",
            "openai/gpt-4o-mini",
            "--difficulty",
            "super_hard",
            "--provider",
            "openai",
            "--max-attempts",
            "5",
            "--exec-timeout",
            "2000",
            "--python",
            "/usr/bin/python3",
            "--quiet",
            "--no-html",
        ])
        .unwrap();
        let config = build_config(&cli);
        assert_eq!(cli.difficulty.tier(), Some(Tier::SuperHard));
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.execution_timeout_ms, Some(2000));
        assert_eq!(config.python, "/usr/bin/python3");
        assert!(!config.verbose);
        assert!(config.save_results);
        assert!(!config.generate_html);
    }

    #[test]
    fn test_unknown_difficulty_is_rejected() {
        assert!(Cli::try_parse_from(["llmbench", "m", "--difficulty", "expert"]).is_err());
    }

    #[tokio::test]
    async fn test_setup_step_stops_on_interrupt() {
        let token = CancellationToken::new();
        token.cancel();

        let err = until_cancelled(&token, std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_setup_step_completes_without_interrupt() {
        let token = CancellationToken::new();
        let value = until_cancelled(&token, async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
