//! camhub-workers - controller for the background workers
//!
//! One command to run, start, stop, inspect, and tail the three workers
//! (convert, optimize, analyze). `run` executes a worker in the foreground;
//! `start` detaches a `run` child with its output redirected to the worker's
//! run log and records a pidfile under the configured run directory.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camhub::artifact_store::ArtifactStore;
use camhub::config::AppConfig;
use camhub::store::Store;
use camhub::workers::{analyze, convert, optimize, WorkerContext};
use camhub::db;

const EXIT_FAILURE: u8 = 1;
const EXIT_MISCONFIGURED: u8 = 2;
const EXIT_STORAGE_UNREACHABLE: u8 = 3;

/// camhub-workers - background worker controller
#[derive(Parser, Debug)]
#[command(name = "camhub-workers")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum WorkerName {
    /// H.264 -> MP4 conversion
    Convert,
    /// MP4 re-encode to the smaller profile
    Optimize,
    /// Vision/text analysis
    Analyze,
}

impl WorkerName {
    fn as_str(&self) -> &'static str {
        match self {
            WorkerName::Convert => "convert",
            WorkerName::Optimize => "optimize",
            WorkerName::Analyze => "analyze",
        }
    }

    fn all() -> [WorkerName; 3] {
        [WorkerName::Convert, WorkerName::Optimize, WorkerName::Analyze]
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a worker in the foreground
    Run { worker: WorkerName },

    /// Start a worker as a detached background process
    Start { worker: WorkerName },

    /// Stop a started worker (SIGTERM; the worker finishes its in-flight event)
    Stop { worker: WorkerName },

    /// Show which workers are running
    Status,

    /// Print the tail of a worker's run log
    Tail {
        worker: WorkerName,
        /// Number of lines to print
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(EXIT_MISCONFIGURED);
        }
    };

    match cli.command {
        Commands::Run { worker } => run_worker(worker, config),
        Commands::Start { worker } => start_worker(worker, &config),
        Commands::Stop { worker } => stop_worker(worker, &config),
        Commands::Status => status(&config),
        Commands::Tail { worker, lines } => tail(worker, lines, &config),
    }
}

fn pidfile(config: &AppConfig, worker: WorkerName) -> PathBuf {
    config.run_dir.join(format!("{}.pid", worker.as_str()))
}

fn logfile(config: &AppConfig, worker: WorkerName) -> PathBuf {
    config.run_dir.join(format!("{}.log", worker.as_str()))
}

fn read_pid(config: &AppConfig, worker: WorkerName) -> Option<i32> {
    std::fs::read_to_string(pidfile(config, worker))
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// `kill(pid, 0)` probes liveness without delivering a signal.
fn pid_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn run_worker(worker: WorkerName, config: AppConfig) -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camhub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to build runtime: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    runtime.block_on(async move {
        tracing::info!(
            worker = worker.as_str(),
            version = env!("CARGO_PKG_VERSION"),
            "Worker starting"
        );

        let pool = match db::connect(&config.database, &config.pool).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!(error = %e, "Database unreachable");
                return ExitCode::from(EXIT_STORAGE_UNREACHABLE);
            }
        };

        let store = Store::new(pool);
        let artifacts = ArtifactStore::new(config.storage.media_root.clone());
        let ctx = WorkerContext::new(store, artifacts, config.workers.clone());
        tracing::info!(worker_id = %ctx.worker_id, "Claimant id assigned");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        match worker {
            WorkerName::Convert => convert::run(ctx, shutdown_rx).await,
            WorkerName::Optimize => optimize::run(ctx, shutdown_rx).await,
            WorkerName::Analyze => analyze::run(ctx, shutdown_rx).await,
        }

        ExitCode::SUCCESS
    })
}

fn start_worker(worker: WorkerName, config: &AppConfig) -> ExitCode {
    if let Some(pid) = read_pid(config, worker) {
        if pid_alive(pid) {
            eprintln!("{} already running (pid {})", worker.as_str(), pid);
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    if let Err(e) = std::fs::create_dir_all(&config.run_dir) {
        eprintln!("Cannot create run dir {}: {}", config.run_dir.display(), e);
        return ExitCode::from(EXIT_MISCONFIGURED);
    }

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("Cannot resolve own executable: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let log_path = logfile(config, worker);
    let open_log = || {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    };
    let (stdout, stderr) = match (open_log(), open_log()) {
        (Ok(stdout), Ok(stderr)) => (stdout, stderr),
        _ => {
            eprintln!("Cannot open run log {}", log_path.display());
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let child = std::process::Command::new(exe)
        .args(["run", worker.as_str()])
        .stdin(std::process::Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            eprintln!("Failed to start {}: {}", worker.as_str(), e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let Err(e) = std::fs::write(pidfile(config, worker), child.id().to_string()) {
        eprintln!("Failed to write pidfile: {}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    println!(
        "{} started (pid {}, log {})",
        worker.as_str(),
        child.id(),
        log_path.display()
    );
    ExitCode::SUCCESS
}

fn stop_worker(worker: WorkerName, config: &AppConfig) -> ExitCode {
    let Some(pid) = read_pid(config, worker) else {
        eprintln!("{} is not running (no pidfile)", worker.as_str());
        return ExitCode::from(EXIT_FAILURE);
    };

    if !pid_alive(pid) {
        let _ = std::fs::remove_file(pidfile(config, worker));
        eprintln!("{} is not running (stale pidfile removed)", worker.as_str());
        return ExitCode::from(EXIT_FAILURE);
    }

    if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0 {
        eprintln!("Failed to signal pid {}", pid);
        return ExitCode::from(EXIT_FAILURE);
    }

    // The worker finishes its in-flight event before exiting; give it a
    // bounded grace period.
    for _ in 0..100 {
        if !pid_alive(pid) {
            let _ = std::fs::remove_file(pidfile(config, worker));
            println!("{} stopped", worker.as_str());
            return ExitCode::SUCCESS;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    eprintln!(
        "{} (pid {}) did not exit within the grace period; claim will go stale and be recovered",
        worker.as_str(),
        pid
    );
    ExitCode::from(EXIT_FAILURE)
}

fn status(config: &AppConfig) -> ExitCode {
    for worker in WorkerName::all() {
        match read_pid(config, worker) {
            Some(pid) if pid_alive(pid) => {
                println!("{:<10} running (pid {})", worker.as_str(), pid)
            }
            Some(_) => println!("{:<10} stopped (stale pidfile)", worker.as_str()),
            None => println!("{:<10} stopped", worker.as_str()),
        }
    }
    ExitCode::SUCCESS
}

fn tail(worker: WorkerName, lines: usize, config: &AppConfig) -> ExitCode {
    let path = logfile(config, worker);
    let file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("No run log at {}", path.display());
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let all: Vec<String> = BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }
    ExitCode::SUCCESS
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
