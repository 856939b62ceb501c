//! stolos CLI
//!
//! Entry point for the `stolos` command-line tool.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use stolos::config::{partial_for_key, redact_secrets, ConfigStore, Layer, Settings};
use stolos::env::{self, Shell};
use stolos::manifest::Manifest;
use stolos::signal::InterruptCounter;
use stolos::supervisor::{
    CommandLauncher, ExitCode, Invocation, Launcher, ServicesCommand, Supervisor, SyncCommand,
    UpOptions,
};

/// Log filter variable
const LOG_ENV: &str = "STOLOS_LOG";

#[derive(Parser)]
#[command(name = "stolos")]
#[command(about = "Sync a project to its remote host and supervise its services", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the project, start its services and keep syncing until interrupted
    Up {
        /// Rebuild images before starting services
        #[arg(long)]
        rebuild: bool,

        /// Do not follow service logs
        #[arg(long)]
        no_logs: bool,

        /// Return once services are up instead of watching for changes
        #[arg(long, short = 'd')]
        detach: bool,

        /// Disable colors in followed logs
        #[arg(long)]
        no_color: bool,
    },

    /// Run a single synchronization pass
    Sync,

    /// Stop the project's services
    Down,

    /// Follow the project's service logs
    Logs {
        /// Disable colors
        #[arg(long)]
        no_color: bool,
    },

    /// Print the project environment as shell assignments
    Env {
        /// Target shell (bash, fish, powershell, cmd, tcsh, emacs); detected by default
        #[arg(long)]
        shell: Option<String>,
    },

    /// List the public URLs of the project's services
    Urls,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Remove this directory's project link (.stolos)
    Unlink,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration with secrets redacted
    Show {
        /// Also list contributing files and their digests
        #[arg(long)]
        sources: bool,
    },

    /// Set one value (`<section>.<key> <value>`)
    Set {
        key: String,
        value: String,

        /// Write to the user layer instead of the project layer
        #[arg(long)]
        user: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Up {
            rebuild,
            no_logs,
            detach,
            no_color,
        } => {
            run_up(rebuild, !no_logs, !detach, no_color);
        }
        Commands::Sync => run_blocking(Invocation::SyncOnce, false),
        Commands::Down => run_blocking(Invocation::ServicesDown, false),
        Commands::Logs { no_color } => run_blocking(Invocation::ServicesLogs, no_color),
        Commands::Env { shell } => run_env(shell),
        Commands::Urls => run_urls(),
        Commands::Config { action } => match action {
            ConfigCommands::Show { sources } => run_config_show(sources),
            ConfigCommands::Set { key, value, user } => run_config_set(&key, &value, user),
        },
        Commands::Unlink => run_unlink(),
    }
}

/// Everything a project command needs, resolved once before any spawn
struct ProjectContext {
    settings: Settings,
    manifest: Manifest,
    env: BTreeMap<String, String>,
}

fn current_dir() -> PathBuf {
    match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: cannot determine current directory: {}", e);
            process::exit(ExitCode::Config.code());
        }
    }
}

fn open_store() -> ConfigStore {
    match ConfigStore::discover(&current_dir()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    }
}

fn load_project() -> ProjectContext {
    let store = open_store();

    let settings = match Settings::from_store(&store) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    };

    let manifest = match Manifest::load(&settings.manifest_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Manifest error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    };

    let env = match env::build(&settings, &manifest) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    };

    ProjectContext {
        settings,
        manifest,
        env,
    }
}

fn launcher(ctx: ProjectContext, no_color: bool) -> CommandLauncher {
    let services = ServicesCommand {
        no_color: no_color || ServicesCommand::default().no_color,
        ..ServicesCommand::default()
    };
    CommandLauncher::new(
        SyncCommand::from_settings(&ctx.settings),
        services,
        ctx.env,
        ctx.settings.project_root,
    )
}

fn run_up(rebuild: bool, follow_logs: bool, watch: bool, no_color: bool) {
    let ctx = load_project();
    if ctx.manifest.is_empty() {
        eprintln!(
            "Warning: no services found in {}",
            ctx.settings.manifest_path.display()
        );
    }

    let interrupts = InterruptCounter::new();
    if let Err(e) = interrupts.install() {
        eprintln!("Error: cannot install interrupt handler: {}", e);
        process::exit(ExitCode::Internal.code());
    }

    let options = UpOptions {
        rebuild,
        follow_logs,
        watch,
        ..UpOptions::default()
    };
    let mut supervisor = Supervisor::new(launcher(ctx, no_color), interrupts, options);

    match supervisor.run() {
        Ok(outcome) => {
            if outcome.is_failure() {
                eprintln!("Error: {}", outcome);
            } else {
                eprintln!("{}", outcome);
            }
            process::exit(outcome.exit_code().code());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(ExitCode::Launch.code());
        }
    }
}

/// Run one synchronizer or service runner command and exit with its code
fn run_blocking(invocation: Invocation, no_color: bool) {
    let ctx = load_project();
    let mut launcher = launcher(ctx, no_color);

    match launcher.run(&invocation) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(ExitCode::Launch.code());
        }
    }
}

fn run_env(shell: Option<String>) {
    let ctx = load_project();
    let shell = match shell {
        Some(name) => Shell::from_name(&name),
        None => Shell::detect(|key| std::env::var(key).ok()).unwrap_or_default(),
    };
    print!("{}", env::render(shell, "stolos env", &ctx.env));
}

fn run_urls() {
    let ctx = load_project();

    println!("Project: {}", ctx.settings.project.public_url);
    for service in ctx.manifest.exposed() {
        if let Some(url) = ctx.env.get(&env::url_key(&service.name, None)) {
            println!("  {}: {}", service.name, url);
        }
        for &port in &service.ports {
            if let Some(url) = ctx.env.get(&env::url_key(&service.name, Some(port))) {
                println!("    {}: {}", port, url);
            }
        }
    }
}

fn run_config_show(sources: bool) {
    let store = open_store();

    let mut merged = match store.merge() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    };
    redact_secrets(&mut merged);

    match serde_yaml_bw::to_string(&merged) {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => {
            eprintln!("Error serializing configuration: {}", e);
            process::exit(ExitCode::Internal.code());
        }
    }

    if sources {
        match store.sources() {
            Ok(sources) => {
                println!();
                println!("# Sources (lowest precedence first):");
                for source in sources {
                    println!(
                        "#   {:<8} {} sha256:{}",
                        source.layer.as_str(),
                        source.path,
                        source.digest
                    );
                }
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                process::exit(ExitCode::Config.code());
            }
        }
    }
}

fn run_config_set(key: &str, value: &str, user: bool) {
    let store = open_store();
    let layer = if user { Layer::User } else { Layer::Project };

    let result = partial_for_key(key, value).and_then(|partial| store.update(layer, partial));
    match result {
        Ok(()) => println!(
            "Set {} in {}",
            key,
            store.layer_path(layer).display()
        ),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    }
}

fn run_unlink() {
    let store = open_store();
    match store.remove_project_state() {
        Ok(true) => println!("Unlinked {}", store.project_root().display()),
        Ok(false) => println!("No project linked at {}", store.project_root().display()),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(ExitCode::Config.code());
        }
    }
}
