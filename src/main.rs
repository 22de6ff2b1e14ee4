mod cli;
mod logging;

use std::io::{self, Write};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::*;
use dotenv::dotenv;
use tracing::error;

use cli::{Cli, Commands};
use drivecat::hasher::HashPolicy;
use drivecat::orchestrator::StatusDetail;
use drivecat::scanner::ignore::IgnoreRules;
use drivecat::watcher::{pump, EventHandler};
use drivecat::{CatalogHandle, DriveAliasResolver, Orchestrator};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Configuration decides where the log file lives, so it loads first.
    let config = match drivecat::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let _guard = logging::init_logger(&config.log_path);

    let args = Cli::parse();

    match args.command {
        Some(Commands::Scan {
            path,
            restart,
            scheduled,
            force,
        }) => {
            let orchestrator = open_orchestrator(&config);
            let status = orchestrator.run_scan(&path, restart, scheduled, force);
            process::exit(status.code());
        }
        Some(Commands::ScanAll { restart }) => {
            let orchestrator = open_orchestrator(&config);
            let status = orchestrator.scan_all_canonical_drives(restart);
            process::exit(status.code());
        }
        Some(Commands::Watch { paths }) => {
            if let Err(err) = run_watch(&config, paths) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::Check { path }) => {
            let orchestrator = open_orchestrator(&config);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let status = orchestrator.check_integrity(path.as_deref(), &mut out);
            process::exit(status.code());
        }
        Some(Commands::Schedule) => {
            let orchestrator = open_orchestrator(&config);
            let stop = Arc::new(AtomicBool::new(false));
            if let Err(err) = orchestrator.poll_schedule(stop) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::Status) => {
            let orchestrator = open_orchestrator(&config);
            match orchestrator.status_detail() {
                Ok(detail) => print_status(&detail),
                Err(err) => {
                    error!("Error: {}", err);
                    process::exit(1);
                }
            }
        }
        Some(Commands::Drives) => {
            let resolver = DriveAliasResolver::discover();
            println!("{}", "Canonical drives:".bold());
            for drive in resolver.canonical_drive_list() {
                println!("  {}", drive);
            }
            if !resolver.mappings().is_empty() {
                println!("{}", "Aliases:".bold());
                for (alias, real) in resolver.mappings() {
                    println!("  {} -> {}", alias.yellow(), real);
                }
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn open_orchestrator(config: &drivecat::AppConfig) -> Orchestrator {
    let handle = match CatalogHandle::open(&config.db_path) {
        Ok(handle) => handle,
        Err(err) => {
            error!("Cannot open catalog at {}: {}", config.db_path, err);
            process::exit(1);
        }
    };
    let resolver = Arc::new(DriveAliasResolver::discover());
    Orchestrator::new(handle, resolver, config.clone())
}

/// Run the event handler until the process is terminated.
fn run_watch(config: &drivecat::AppConfig, paths: Vec<String>) -> Result<(), drivecat::Error> {
    let resolver = Arc::new(DriveAliasResolver::discover());
    let paths = if paths.is_empty() {
        resolver.canonical_drive_list()
    } else {
        paths
    };
    let mut handler = EventHandler::open(
        &config.db_path,
        resolver,
        HashPolicy::from_config(config),
        IgnoreRules::from_config(config),
    )?;
    let stop = Arc::new(AtomicBool::new(false));
    pump::run(&paths, &mut handler, stop)
}

fn print_status(detail: &StatusDetail) {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if detail.lock.active.is_empty() {
        let _ = writeln!(out, "{}", "No scan is active.".green());
    } else {
        for row in &detail.lock.active {
            let _ = writeln!(
                out,
                "{} {} scan on {} (pid {}, lock {})",
                "ACTIVE".red().bold(),
                row.scan_type,
                row.hostname,
                row.pid,
                row.id
            );
        }
    }
    for row in &detail.lock.orphaned {
        let _ = writeln!(
            out,
            "{} lock {} ({} scan, pid {} gone)",
            "ORPHANED".yellow(),
            row.id,
            row.scan_type,
            row.pid
        );
    }
    for row in &detail.lock.progress {
        let _ = writeln!(
            out,
            "{} {} resumes at {}",
            "INTERRUPTED".yellow(),
            row.drive_name,
            row.last_path
        );
    }

    let _ = writeln!(out, "{}", "Drives:".bold());
    for drive in &detail.drives {
        let _ = writeln!(
            out,
            "  {:8} {:>10} dirs {:>12} files {:>16} bytes",
            drive.drive_name, drive.directory_count, drive.file_count, drive.total_bytes
        );
    }

    if !detail.recent_locks.is_empty() {
        let _ = writeln!(out, "{}", "Recent scans:".bold());
        for row in &detail.recent_locks {
            let _ = writeln!(
                out,
                "  #{} {} on {} (pid {}){}",
                row.id,
                row.scan_type,
                row.hostname,
                row.pid,
                if row.is_active { " [active]" } else { "" }
            );
        }
    }
}
