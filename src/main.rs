/*!
 * appstage - Main Entry Point
 *
 * Loads a declaration file, reconciles it against the host and prints the
 * resulting registry, unit files or proxy routes. Starting and stopping
 * services is left to the supervisor.
 */

use appstage::config::settings::{ENV_RUNTIME_DIR, ENV_SERVER_PROGRAM, ENV_STATE_DIR};
use appstage::render::{proxy_routes, unit_file};
use appstage::{
    init_tracing, load_declarations, validate_batch, FixedHost, HostFacts, Orchestrator,
    ProvisionError, ProvisionerConfig, ReconcileReport, SystemHost,
};
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

/// Exit status for internal invariant violations (EX_SOFTWARE)
const EXIT_FATAL: u8 = 70;

#[derive(Parser)]
#[command(name = "appstage")]
#[command(version, about = "Stage secrets and build service descriptors for web applications")]
struct Cli {
    /// Private state directory holding staged secrets
    #[arg(long, global = true, env = ENV_STATE_DIR)]
    state_dir: Option<PathBuf>,

    /// Parent directory of default application sockets
    #[arg(long, global = true, env = ENV_RUNTIME_DIR)]
    runtime_dir: Option<PathBuf>,

    /// Application server program placed in ExecStart
    #[arg(long, global = true, env = ENV_SERVER_PROGRAM)]
    server_program: Option<String>,

    /// Stage into a scratch directory as the current user instead of the host
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate declarations without touching the host
    Check { declarations: PathBuf },
    /// Stage secrets and print the resulting registry as JSON
    Reconcile { declarations: PathBuf },
    /// Reconcile, then write unit files and the proxy table
    Render {
        declarations: PathBuf,
        /// Output directory; prints to stdout when omitted
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Remove the staged secret of an application no longer declared
    Decommission {
        name: String,
        /// Current declarations, which must no longer contain `name`
        #[arg(long)]
        declarations: PathBuf,
    },
}

fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let fatal = err
                .downcast_ref::<ProvisionError>()
                .is_some_and(ProvisionError::is_fatal);
            eprintln!("{:?}", err);
            if fatal {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    let mut config = ProvisionerConfig::from_env();
    if let Some(dir) = cli.state_dir {
        config = config.with_state_dir(dir);
    }
    if let Some(dir) = cli.runtime_dir {
        config = config.with_runtime_dir(dir);
    }
    if let Some(program) = cli.server_program {
        config = config.with_server_program(program);
    }

    // Kept alive until the command finishes
    let _scratch = if cli.dry_run {
        let dir = tempfile::Builder::new()
            .prefix("appstage-dry-run-")
            .tempdir()
            .into_diagnostic()?;
        config = config.with_state_dir(dir.path().join("state"));
        Some(dir)
    } else {
        None
    };

    let host: Arc<dyn HostFacts> = if cli.dry_run {
        Arc::new(FixedHost::mapping_all_to(SystemHost::new().system_identity()))
    } else {
        Arc::new(SystemHost::new())
    };

    match cli.command {
        Commands::Check { declarations } => {
            let raws = load_declarations(&declarations)?;
            let specs = validate_batch(&raws, &config.runtime_dir).map_err(ProvisionError::from)?;
            info!(apps = specs.len(), "Declarations valid");
            print_json(&specs)
        }
        Commands::Reconcile { declarations } => {
            let report = reconcile(&config, host, &declarations)?;
            print_json(&report)
        }
        Commands::Render {
            declarations,
            out_dir,
        } => {
            let report = reconcile(&config, host, &declarations)?;
            match out_dir {
                Some(dir) => write_rendered(&report, &dir),
                None => {
                    for descriptor in report.registry.iter() {
                        println!("# {}.service\n{}", descriptor.name(), unit_file(descriptor));
                    }
                    print!("{}", proxy_routes(&report.registry));
                    Ok(())
                }
            }
        }
        Commands::Decommission { name, declarations } => {
            let orchestrator = Orchestrator::new(config, host);
            orchestrator.reconcile(&load_declarations(&declarations)?)?;
            let removed = orchestrator.decommission(&name)?;
            if removed {
                println!("removed staged secret of {}", name);
            } else {
                println!("nothing staged for {}", name);
            }
            Ok(())
        }
    }
}

fn reconcile(
    config: &ProvisionerConfig,
    host: Arc<dyn HostFacts>,
    declarations: &Path,
) -> Result<ReconcileReport, ProvisionError> {
    let raws = load_declarations(declarations)?;
    let orchestrator = Orchestrator::new(config.clone(), host);
    let report = orchestrator.reconcile(&raws)?;
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(report)
}

fn write_rendered(report: &ReconcileReport, dir: &Path) -> miette::Result<()> {
    std::fs::create_dir_all(dir).into_diagnostic()?;
    for descriptor in report.registry.iter() {
        let path = dir.join(format!("{}.service", descriptor.name()));
        std::fs::write(&path, unit_file(descriptor)).into_diagnostic()?;
        debug!(path = %path.display(), "Wrote unit file");
    }
    let proxy = dir.join("proxy.conf");
    std::fs::write(&proxy, proxy_routes(&report.registry)).into_diagnostic()?;
    info!(dir = %dir.display(), units = report.registry.len(), "Rendered registry");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let text = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", text);
    Ok(())
}
