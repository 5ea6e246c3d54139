use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for shadekit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc, frame smoke run
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Run the per-frame update benchmark
    Bench,
    /// Run one demo frame through the CLI on the recording device
    Frame,
    /// Initialize the pipeline on a headless GPU adapter
    GpuProbe,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            run_fmt()?;
            run_clippy()?;
            run_tests()?;
            run_doc()?;
            run_frame()?;
        }
        Commands::Fmt => run_fmt()?,
        Commands::Clippy => run_clippy()?,
        Commands::Test => run_tests()?,
        Commands::Doc => run_doc()?,
        Commands::Bench => run_bench()?,
        Commands::Frame => run_frame()?,
        Commands::GpuProbe => run_gpu_probe()?,
    }

    Ok(())
}

/// Runs `cargo <args>`, failing with `what` if it exits unsuccessfully.
fn cargo(what: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{what} failed");
    }
    Ok(())
}

fn run_fmt() -> Result<()> {
    cargo("cargo fmt check", &["fmt", "--all", "--", "--check"])
}

fn run_clippy() -> Result<()> {
    cargo(
        "cargo clippy",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
    )
}

fn run_tests() -> Result<()> {
    cargo("cargo test", &["test", "--workspace"])
}

fn run_doc() -> Result<()> {
    cargo("cargo doc", &["doc", "--workspace", "--no-deps"])
}

fn run_bench() -> Result<()> {
    cargo(
        "frame update benchmark",
        &[
            "bench",
            "-p",
            "shadekit-render",
            "--bench",
            "bench_frame_updates",
        ],
    )
}

fn run_frame() -> Result<()> {
    cargo(
        "demo frame",
        &["run", "-p", "shadekit-cli", "--", "frame", "--draws-only"],
    )
}

fn run_gpu_probe() -> Result<()> {
    cargo(
        "gpu probe",
        &["run", "-p", "shadekit-cli", "--", "gpu-probe"],
    )
}
