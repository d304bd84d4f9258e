use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the driver client workspace",
    long_about = "A unified CLI for replaying driver sessions, running tests,\n\
                  benchmarks, and CI checks in the driver client workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted driver session and print telemetry
    Replay {
        /// Optional JSON config file passed to the replay
        #[arg(long, env = "DRIVER_CONFIG")]
        config: Option<String>,
        /// tracing filter for the replay (RUST_LOG syntax)
        #[arg(long, default_value = "info")]
        log: String,
    },
    /// Run the driver_core test suite
    Test {
        /// Also build and test the OSRM route provider
        #[arg(long)]
        osrm: bool,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run the replay example
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn spawn(program: &str, args: &[&str], envs: &[(&str, &str)]) -> ExitStatus {
    eprintln!("+ {program} {}", args.join(" "));
    match Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .status()
    {
        Ok(status) => status,
        Err(err) => {
            eprintln!("failed to execute {program}: {err}");
            exit(1);
        }
    }
}

fn run_cargo_with_env(args: &[&str], envs: &[(&str, &str)]) {
    let status = spawn("cargo", args, envs);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_cargo(args: &[&str]) {
    run_cargo_with_env(args, &[]);
}

fn run_git(args: &[&str]) {
    let status = spawn("git", args, &[]);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_bench(extra: &[&str]) {
    let mut args = vec!["bench", "--package", "driver_core", "--bench", "dispatch"];
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    run_cargo(&args);
}

fn run_replay(config: Option<&str>, log: &str) {
    let mut args = vec![
        "run",
        "-p",
        "driver_core",
        "--example",
        "dashboard_replay",
        "--release",
    ];
    if let Some(path) = config {
        args.push("--");
        args.push(path);
    }
    run_cargo_with_env(&args, &[("RUST_LOG", log)]);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test driver_core");
    run_cargo(&["test", "-p", "driver_core"]);

    step("Test driver_core without test helpers");
    run_cargo(&["test", "-p", "driver_core", "--no-default-features", "--lib"]);
}

fn ci_examples() {
    step("Run dashboard_replay");
    run_replay(None, "warn");
}

fn ci_bench() {
    step("Run benchmarks");
    run_bench(&[]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { config, log } => {
            run_replay(config.as_deref(), &log);
        }
        Commands::Test { osrm } => {
            if osrm {
                run_cargo(&["test", "-p", "driver_core", "--features", "osrm"]);
            } else {
                run_cargo(&["test", "-p", "driver_core"]);
            }
        }
        Commands::Bench => run_bench(&[]),
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                if let Err(err) = std::fs::remove_dir_all(baseline_dir) {
                    eprintln!("failed to remove target/criterion: {err}");
                    exit(1);
                }
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            run_bench(&["--save-baseline", "main"]);

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            run_bench(&["--baseline", "main"]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
