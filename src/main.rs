use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sayonara_freespace::algorithms::MethodRegistry;
use sayonara_freespace::crypto::PrngKind;
use sayonara_freespace::task::LogLevel;
use sayonara_freespace::ui::progress::human_bytes;
use sayonara_freespace::ui::TerminalSink;
use sayonara_freespace::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const BAR_WIDTH: usize = 40;
const LOG_FILE_NAME: &str = "sayonara-freespace.log";

/// Exit status after Ctrl+C, as a shell reports SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "sayonara-freespace")]
#[command(about = "Securely erase the unused space of mounted volumes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Skip the administrative privilege check (DANGEROUS!)
    #[arg(long, global = true)]
    unsafe_mode: bool,

    /// Also write logs to this directory
    #[arg(long, global = true, env = "SAYONARA_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Settings file (defaults to settings.toml in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Erase the unused space of the volume holding DRIVE
    Erase {
        /// Any path on the volume (e.g., / or /home)
        drive: PathBuf,

        /// Also erase the slack at the end of every file's last cluster
        #[arg(long)]
        cluster_tips: bool,

        /// Erasure method id (see `methods`)
        #[arg(short, long)]
        method: Option<String>,

        /// Random number generator feeding the random passes
        #[arg(long, value_enum)]
        prng: Option<PrngKind>,

        /// Maximum size of one fill file, in bytes
        #[arg(long)]
        fill_unit: Option<u64>,
    },

    /// Run a task described by a JSON file
    Run {
        /// Path to the task record
        task: PathBuf,
    },

    /// List the available erasure methods
    Methods,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_guard = init_tracing(cli.debug, cli.log_dir.as_deref())?;

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    let task_config = match cli.command {
        Commands::Methods => {
            list_methods(&settings);
            return Ok(());
        }
        Commands::Erase {
            drive,
            cluster_tips,
            method,
            prng,
            fill_unit,
        } => {
            if let Some(prng) = prng {
                settings.active_prng = prng;
            }
            if let Some(fill_unit) = fill_unit {
                settings.fill_unit_bytes = fill_unit;
            }
            settings.validate()?;

            let target = TargetConfig::UnusedSpace(UnusedSpaceConfig {
                drive: drive.clone(),
                erase_cluster_tips: cluster_tips,
                method,
            });
            TaskConfig::new(format!("Erase unused space on {}", drive.display()), vec![target])
        }
        Commands::Run { task } => TaskConfig::load(&task)
            .with_context(|| format!("Failed to load task {}", task.display()))?,
    };

    if cli.unsafe_mode {
        eprintln!("Warning: --unsafe-mode skips the privilege check.");
    }

    let services = Services::local(settings, cli.unsafe_mode);
    let task = Task::from_config(task_config, &services)?;
    let completed = run_task(task).await?;

    // Flush the file log before a non-zero exit
    drop(log_guard);
    if !completed {
        std::process::exit(EXIT_INTERRUPTED);
    }
    Ok(())
}

fn init_tracing(debug: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer().with_writer(std::io::stderr).with_target(debug);

    let (file, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}

fn list_methods(settings: &Settings) {
    let registry = MethodRegistry::with_builtin();

    println!("Erasure methods:");
    for method in registry.iter() {
        let marker = if method.id() == settings.default_unused_space_method {
            " (default)"
        } else {
            ""
        };
        println!(
            "  {:<14} {:<24} {:>2} pass(es){}",
            method.id(),
            method.name(),
            method.passes(),
            marker
        );
    }
    println!();
    println!("Random generator: {}", settings.active_prng);
    println!("Fill unit: {}", human_bytes(settings.fill_unit_bytes as f64));
}

/// Execute on a blocking worker while the async side waits for Ctrl+C.
///
/// Returns `false` when the task was canceled.
async fn run_task(mut task: Task) -> Result<bool> {
    println!("Task: {}", task.name());
    for target in task.targets() {
        println!("  - {}", target.ui_text());
    }

    let cancel = task.cancellation();
    let log = task.log();
    let sink = Arc::new(TerminalSink::new(task.progress(), BAR_WIDTH));
    let worker_sink = sink.clone();

    let mut worker = tokio::task::spawn_blocking(move || task.execute(worker_sink.as_ref()));

    let result = tokio::select! {
        joined = &mut worker => joined?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\nInterrupt received! Removing temporary files before exiting...");
            cancel.cancel();
            set_interrupted();
            worker.await?
        }
    };

    sink.finish();

    let problems: Vec<_> = log
        .entries()
        .into_iter()
        .filter(|entry| entry.level >= LogLevel::Warning)
        .collect();
    if !problems.is_empty() {
        println!("\nTask log:");
        for entry in problems {
            println!(
                "  [{}] {} {}",
                entry.level,
                entry.timestamp.format("%H:%M:%S"),
                entry.message
            );
        }
    }

    match result {
        Ok(()) => {
            println!("All unused space erased.");
            Ok(true)
        }
        Err(WipeError::Canceled) => {
            eprintln!("Task canceled.");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
