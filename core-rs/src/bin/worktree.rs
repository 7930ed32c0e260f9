//! worktree - per-worktree port allocation CLI
//!
//! Run inside a worktree (or the main checkout for `new` / `remove`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wtm_core::drivers::SystemRunner;
use wtm_core::port::parse_assignments;
use wtm_core::reconcile::Reconciliation;
use wtm_core::workflow::{self, AllocateOptions, Eviction, NewOptions, StepOutcome};
use wtm_core::{StatePaths, WtmError};

#[derive(Parser)]
#[command(name = "worktree")]
#[command(version)]
#[command(about = "Disjoint port allocation for git worktrees", long_about = None)]
struct Cli {
    /// State directory (default: $WORKTREE_MANAGER_HOME or ~/.config/worktree-manager)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate ports for the current worktree and write .env
    Allocate {
        /// Manual assignments, e.g. HTTP_PORT=9000
        assignments: Vec<String>,
        /// Run install afterwards
        #[arg(long, short = 'i')]
        install: bool,
        /// Restart services afterwards (down, then up)
        #[arg(long, short = 'u')]
        up: bool,
        /// Run migrations afterwards
        #[arg(long, short = 'm')]
        migrate: bool,
        /// Skip ports something is already listening on
        #[arg(long)]
        validate_ports: bool,
    },
    /// Show the allocation table
    Allocations {
        /// One row per port, sorted
        #[arg(long)]
        by_port: bool,
    },
    /// Reserve a port globally and move worktrees currently using it
    ReservePort {
        port: u64,
    },
    /// Manage registered project roots
    Root {
        #[command(subcommand)]
        command: RootCommands,
    },
    /// Rebuild the allocation table from .env files under the roots
    Scan {
        /// Report only, don't save
        #[arg(long)]
        dry_run: bool,
    },
    /// Create the next sibling worktree (<name>-N) and allocate its ports
    New {
        /// Branch to check out (created from --base when missing)
        #[arg(long, short = 'b')]
        branch: Option<String>,
        /// Base branch
        #[arg(long, default_value = "main")]
        base: String,
        /// Skip ports something is already listening on
        #[arg(long)]
        validate_ports: bool,
        /// Run install in the new worktree
        #[arg(long)]
        install: bool,
    },
    /// Remove sibling worktree <name>-N and release its ports
    Remove {
        number: String,
        /// Discard modified or untracked files
        #[arg(long)]
        force: bool,
    },
    /// Install dependencies (hook or detected project type)
    Install,
    /// Run migrations (hook or detected project type)
    Migrate,
    /// Start services (hook or docker compose up -d)
    Up,
    /// Stop services (hook or docker compose down)
    Down,
}

#[derive(Subcommand)]
enum RootCommands {
    /// Register a directory containing worktrees
    Add { dir: String },
    /// Unregister a directory
    Remove { dir: String },
    /// List registered directories
    List,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        report_error(&err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wtm_core=debug,worktree=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn report_error(err: &anyhow::Error) {
    eprintln!("{} {}", "ERROR".red().bold(), err);
    if let Some(hint) = err.downcast_ref::<WtmError>().and_then(WtmError::hint) {
        eprintln!();
        for line in hint.lines() {
            eprintln!("  {}", line);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = match cli.config_dir {
        Some(dir) => StatePaths::new(dir),
        None => StatePaths::from_env()?,
    };
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Allocate {
            assignments,
            install,
            up,
            migrate,
            validate_ports,
        } => handle_allocate(&paths, &cwd, &assignments, validate_ports, install, up, migrate),
        Commands::Allocations { by_port } => handle_allocations(&paths, by_port),
        Commands::ReservePort { port } => handle_reserve_port(&paths, port),
        Commands::Root { command } => match command {
            RootCommands::Add { dir } => handle_root_add(&paths, &dir),
            RootCommands::Remove { dir } => handle_root_remove(&paths, &dir),
            RootCommands::List => handle_root_list(&paths),
        },
        Commands::Scan { dry_run } => handle_scan(&paths, dry_run),
        Commands::New {
            branch,
            base,
            validate_ports,
            install,
        } => handle_new(
            &paths,
            &cwd,
            NewOptions {
                branch,
                base,
                validate_ports,
                install,
            },
        ),
        Commands::Remove { number, force } => handle_remove(&paths, &cwd, &number, force),
        Commands::Install => handle_step("install", &cwd, workflow::lifecycle::install),
        Commands::Migrate => handle_step("migrate", &cwd, workflow::lifecycle::migrate),
        Commands::Up => handle_step("up", &cwd, workflow::lifecycle::up),
        Commands::Down => handle_step("down", &cwd, workflow::lifecycle::down),
    }
}

fn handle_allocate(
    paths: &StatePaths,
    cwd: &Path,
    assignments: &[String],
    validate_ports: bool,
    install: bool,
    up: bool,
    migrate: bool,
) -> Result<()> {
    let options = AllocateOptions {
        overrides: parse_assignments(assignments)?,
        validate_ports,
        evict: Vec::new(),
    };

    let outcome = workflow::allocate_worktree(paths, cwd, &options)?;
    print_reconciliation(&outcome);

    if install {
        handle_step("install", cwd, workflow::lifecycle::install)?;
    }
    if up {
        handle_step("down", cwd, workflow::lifecycle::down)?;
        handle_step("up", cwd, workflow::lifecycle::up)?;
    }
    if migrate {
        handle_step("migrate", cwd, workflow::lifecycle::migrate)?;
    }
    Ok(())
}

fn print_reconciliation(outcome: &Reconciliation) {
    println!("Worktree: {}", outcome.worktree.bold());

    for variable in &outcome.ignored_overrides {
        println!(
            "{} {} is not declared in .worktree.yml, ignoring",
            "⚠".yellow(),
            variable
        );
    }
    for (variable, port) in outcome.removed.iter() {
        println!("  {} {} (was {})", "-".red(), variable, port);
    }
    for change in &outcome.refreshed {
        match change.from {
            Some(from) => println!("  {} {}: {} → {} (from .env)", "~".cyan(), change.variable, from, change.to),
            None => println!("  {} {}: {} (from .env)", "~".cyan(), change.variable, change.to),
        }
    }
    for (variable, port) in outcome.added.iter() {
        println!("  {} {}: {}", "+".green(), variable, port);
    }
    for change in &outcome.updated {
        let from = change.from.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!("  {} {}: {} → {}", "~".cyan(), change.variable, from, change.to);
    }

    if outcome.is_noop() {
        println!("No changes needed");
    } else if !outcome.table_changed {
        println!("{} .env rewritten", "✓".green());
    }

    println!();
    for (variable, port) in outcome.ports.iter() {
        println!("{}={}", variable, port);
    }
}

fn handle_allocations(paths: &StatePaths, by_port: bool) -> Result<()> {
    let table = workflow::load_allocations(paths)?;
    if table.is_empty() {
        println!("No allocations.");
        return Ok(());
    }

    if by_port {
        println!("{:<8} {:<32} {:<24}", "PORT", "WORKTREE", "VARIABLE");
        println!("{}", "-".repeat(64));
        for (port, worktree, variable) in table.rows_by_port() {
            println!("{:<8} {:<32} {:<24}", port, worktree, variable);
        }
        return Ok(());
    }

    for (worktree, ports) in table.worktrees() {
        println!("{}", worktree.bold());
        for (variable, port) in ports.iter() {
            println!("  {:<24} {}", variable, port);
        }
    }
    Ok(())
}

fn handle_reserve_port(paths: &StatePaths, port: u64) -> Result<()> {
    let outcome = workflow::reserve_port(paths, port)?;
    if outcome.already_reserved {
        println!("Port {} is already reserved", outcome.port);
        return Ok(());
    }

    let reserved = outcome.port;
    println!("{} Reserved port {}", "✓".green(), reserved);
    for eviction in &outcome.evictions {
        match eviction {
            Eviction::Reallocated {
                worktree, outcome, ..
            } => {
                for (variable, port) in outcome.added.iter() {
                    println!("  {} {}: {} → {}", worktree, variable, reserved, port);
                }
            }
            Eviction::NotFound {
                worktree,
                variables,
            } => println!(
                "  {} {} ({}) not found under any root; run `worktree allocate` inside it",
                "⚠".yellow(),
                worktree,
                variables.join(", ")
            ),
            Eviction::Failed {
                worktree, error, ..
            } => println!("  {} {}: {}", "✗".red(), worktree, error),
        }
    }
    Ok(())
}

fn handle_root_add(paths: &StatePaths, dir: &str) -> Result<()> {
    let (root, added) = workflow::add_root(paths, dir)?;
    if added {
        println!("{} Added root {}", "✓".green(), root.display());
    } else {
        println!("Root {} is already registered", root.display());
    }
    Ok(())
}

fn handle_root_remove(paths: &StatePaths, dir: &str) -> Result<()> {
    if workflow::remove_root(paths, dir)? {
        println!("{} Removed root {}", "✓".green(), dir);
    } else {
        println!("Root {} is not registered", dir);
    }
    Ok(())
}

fn handle_root_list(paths: &StatePaths) -> Result<()> {
    let roots = workflow::list_roots(paths)?;
    if roots.is_empty() {
        println!("No roots registered.");
        println!("\nRun `worktree root add <directory>` to register one.");
        return Ok(());
    }
    for root in roots {
        println!("{}", root);
    }
    Ok(())
}

fn handle_scan(paths: &StatePaths, dry_run: bool) -> Result<()> {
    let report = workflow::scan_roots(paths, dry_run)?;

    for worktree in &report.worktrees {
        println!("{} ({})", worktree.name.bold(), worktree.path.display());
        for (variable, port) in worktree.ports.iter() {
            println!("  {:<24} {}", variable, port);
        }
    }

    for (port, holders) in &report.conflicts {
        let users: Vec<String> = holders
            .iter()
            .map(|h| format!("{}:{}", h.worktree, h.variable))
            .collect();
        println!("{} Port {} used by {}", "✗".red(), port, users.join(", "));
    }
    for warning in &report.warnings {
        println!("{} {}", "⚠".yellow(), warning);
    }
    for error in &report.errors {
        println!("{} {}", "✗".red(), error);
    }

    println!();
    if report.saved {
        println!(
            "{} Saved {} worktree(s) to {}",
            "✓".green(),
            report.worktrees.len(),
            paths.allocations_file().display()
        );
    } else {
        println!("Dry run: {} worktree(s) found, nothing saved", report.worktrees.len());
    }
    Ok(())
}

fn handle_new(paths: &StatePaths, cwd: &Path, options: NewOptions) -> Result<()> {
    let runner = SystemRunner::streaming();
    let outcome = workflow::create_worktree(paths, cwd, &options, &runner)?;

    println!("{} Created worktree {}", "✓".green(), outcome.path.display());
    print_reconciliation(&outcome.allocation);
    if let Some(step) = &outcome.install {
        print_step("install", step);
    }
    println!("\ncd {}", outcome.path.display());
    Ok(())
}

fn handle_remove(paths: &StatePaths, cwd: &Path, number: &str, force: bool) -> Result<()> {
    let runner = SystemRunner::new();
    let outcome = workflow::remove_worktree(paths, cwd, number, force, &runner)?;

    for warning in &outcome.warnings {
        println!("{} {}", "⚠".yellow(), warning);
    }
    println!("{} Removed worktree {}", "✓".green(), outcome.path.display());
    match outcome.released {
        Some(ports) => {
            let released: Vec<String> = ports.iter().map(|(v, p)| format!("{}={}", v, p)).collect();
            println!("  Released {}", released.join(", "));
        }
        None => println!("  No allocations recorded for {}", outcome.name),
    }
    Ok(())
}

type Step = fn(&Path, &dyn wtm_core::ProcessRunner) -> wtm_core::Result<StepOutcome>;

fn handle_step(name: &str, cwd: &Path, step: Step) -> Result<()> {
    let runner = SystemRunner::streaming();
    let outcome = step(cwd, &runner)?;
    print_step(name, &outcome);
    Ok(())
}

fn print_step(name: &str, outcome: &StepOutcome) {
    let how = match outcome {
        StepOutcome::Hook => "hook".to_string(),
        StepOutcome::Detected(kind) => format!("{} project", kind),
        StepOutcome::Compose => "docker compose".to_string(),
    };
    println!("{} {} finished ({})", "✓".green(), name, how);
}
