//! Headless Dune game runner.
//!
//! Runs scenarios without graphics or audio. Designed for CI testing,
//! determinism checks and save-file inspection.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario for 10 000 cycles and save the result
//! cargo run -p dune_headless -- run --scenario scenarios/arrakeen.ron --ticks 10000 --save game.sav
//!
//! # Verify determinism
//! cargo run -p dune_headless -- verify --scenario scenarios/arrakeen.ron --ticks 5000 --runs 5
//!
//! # Inspect a save file
//! cargo run -p dune_headless -- inspect --save game.sav
//! ```
//!
//! Summaries go to stdout as JSON. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dune_core::config::GameOptions;
use dune_core::savegame::SaveGame;
use dune_core::scenario::ScenarioDescription;
use dune_headless::runner::{verify_determinism, GameRunner, HeadlessError};

#[derive(Parser)]
#[command(name = "dune_headless")]
#[command(about = "Headless Dune game runner for CI and determinism checks")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a JSON summary
    Run {
        /// Scenario file (RON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of cycles to run
        #[arg(short, long, default_value = "3750")]
        ticks: u64,

        /// Game options file (RON)
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Write a save game here when done
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario file (RON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of cycles per run
        #[arg(short, long, default_value = "3750")]
        ticks: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Restore a save game and print its JSON summary
    Inspect {
        /// Save file path
        #[arg(short, long)]
        save: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for summaries)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            options,
            save,
        } => cmd_run(scenario, ticks, options, save),
        Commands::Verify {
            scenario,
            ticks,
            runs,
        } => cmd_verify(scenario, ticks, runs),
        Commands::Inspect { save } => cmd_inspect(save),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to serialize summary: {}", e),
    }
}

fn cmd_run(
    scenario: PathBuf,
    ticks: u64,
    options: Option<PathBuf>,
    save: Option<PathBuf>,
) -> Result<ExitCode, HeadlessError> {
    tracing::info!("Running {} for {} cycles", scenario.display(), ticks);

    let mut runner = GameRunner::from_files(&scenario, options.as_deref())?;
    let ran = runner.run(ticks);
    if ran < ticks {
        tracing::info!("Game ended after {} cycles", ran);
    }

    if let Some(path) = save {
        runner.capture().save_to_file(&path)?;
    }

    print_json(&runner.summary());
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify(scenario: PathBuf, ticks: u64, runs: u32) -> Result<ExitCode, HeadlessError> {
    tracing::info!(
        "Verifying determinism: {} for {} cycles ({} runs)",
        scenario.display(),
        ticks,
        runs
    );

    let desc = ScenarioDescription::load(&scenario)?;
    let report = verify_determinism(&desc, GameOptions::default(), ticks, runs)?;
    print_json(&report);

    if report.deterministic {
        eprintln!("PASS: All {} runs produced identical results", runs);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_inspect(save: PathBuf) -> Result<ExitCode, HeadlessError> {
    let save = SaveGame::load_from_file(&save)?;
    tracing::info!(
        "Save game '{}' at cycle {} ({} bytes)",
        save.scenario_name,
        save.cycle,
        save.payload.len()
    );
    let runner = GameRunner::from_save(&save)?;
    print_json(&runner.summary());
    Ok(ExitCode::SUCCESS)
}
