//! AutoMate CLI
//!
//! Build, inspect, compile and run block-based automation workflows from the
//! command line.
//!
//! Usage:
//!   automate kinds                              # List every block kind
//!   automate new flow.json                      # Start an empty project
//!   automate add flow.json "Click" --set x=10   # Append a block
//!   automate show flow.json                     # Print the blocks
//!   automate compile flow.json -o flow.py       # Generate a pyautogui script
//!   automate run flow.json --dry-run            # Execute without touching the desktop

use anyhow::{bail, Context, Result};
use automate::codec;
use automate::config::parse_duration;
use automate::platforms::{create_driver, DriverCall, DriverKind, DryRunDriver};
use automate::schema::by_category;
use automate::{
    ActionKind, AutomateConfig, AutomationDriver, Direction, RecordId, Session, Workflow,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

mod run_result;
mod validator;

use run_result::RunSummary;
use validator::WorkflowValidator;

#[derive(Parser)]
#[command(name = "automate")]
#[command(about = "🤖 AutoMate - block-based desktop automation")]
#[command(
    long_about = "AutoMate builds desktop automation workflows out of blocks (move, click, type, wait, loop, find image...), compiles them to standalone pyautogui scripts and runs them directly."
)]
struct Cli {
    /// Log level: error, warn, info or debug (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Delay before an in-process run starts, e.g. "3s"
    #[arg(long, global = true, env = "AUTOMATE_STARTUP_DELAY", value_parser = parse_duration)]
    startup_delay: Option<Duration>,

    /// Delay written into generated scripts, e.g. "2s"
    #[arg(long, global = true, env = "AUTOMATE_SCRIPT_DELAY", value_parser = parse_duration)]
    script_delay: Option<Duration>,

    /// Time to hover over a target when picking coordinates, e.g. "2500ms"
    #[arg(long, global = true, env = "AUTOMATE_PICK_DELAY", value_parser = parse_duration)]
    pick_delay: Option<Duration>,

    /// Do not abort when the pointer reaches a screen corner
    #[arg(long, global = true)]
    no_failsafe: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every block kind with its fields and defaults
    Kinds,
    /// Create an empty project file
    New {
        project: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Append a block to a project
    Add {
        project: PathBuf,
        /// Block kind, e.g. "Click" or "Loop Start"
        kind: String,
        /// Field values as name=value; repeatable
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        values: Vec<String>,
    },
    /// Remove the block at a step number (1-based)
    Remove { project: PathBuf, step: usize },
    /// Swap a block with its neighbour
    Move {
        project: PathBuf,
        step: usize,
        /// up or down
        direction: Direction,
    },
    /// Change one field of a block
    Set {
        project: PathBuf,
        step: usize,
        field: String,
        value: String,
    },
    /// Print the blocks of a project
    Show {
        project: PathBuf,
        /// Print the project file contents instead
        #[arg(long)]
        json: bool,
    },
    /// Compile a project into a pyautogui script
    Compile {
        project: PathBuf,
        /// Write the script here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run a project now
    Run {
        project: PathBuf,
        /// Record driver calls instead of touching the desktop
        #[arg(long)]
        dry_run: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a project for problems before running it
    Validate { project: PathBuf },
    /// Capture the pointer position into a block's x/y
    Pick { project: PathBuf, step: usize },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("❌ Failed to initialize logging: {e}");
    }

    match run_cli(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "❌".red(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level_override: Option<&str>) -> Result<()> {
    let level = level_override
        .map(str::to_string)
        .or_else(|| env::var("LOG_LEVEL").ok())
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}

fn build_config(cli: &Cli) -> Result<AutomateConfig> {
    let mut config = AutomateConfig::from_env().context("Invalid AUTOMATE_* setting")?;
    if let Some(delay) = cli.startup_delay {
        config.startup_delay = delay;
    }
    if let Some(delay) = cli.script_delay {
        config.script_delay = delay;
    }
    if let Some(delay) = cli.pick_delay {
        config.pick_delay = delay;
    }
    if cli.no_failsafe {
        config.fail_safe = false;
    }
    debug!(?config, "Effective configuration");
    Ok(config)
}

async fn run_cli(cli: Cli) -> Result<i32> {
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Kinds => {
            print_kinds();
            Ok(0)
        }
        Commands::New { project, force } => {
            if project.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    project.display()
                );
            }
            codec::save(&Workflow::new(), &project)
                .with_context(|| format!("Failed to write {}", project.display()))?;
            println!("✅ Created {}", project.display());
            Ok(0)
        }
        Commands::Add {
            project,
            kind,
            values,
        } => {
            let mut session = editing_session(&project, config)?;
            let kind: ActionKind = kind.parse()?;
            let values = parse_values(kind, &values)?;
            session.add_block(kind.name(), Some(&values))?;
            session.save_project(&project)?;
            println!(
                "✅ Added {} as step {}",
                kind.name().bold(),
                session.workflow().len()
            );
            Ok(0)
        }
        Commands::Remove { project, step } => {
            let mut session = editing_session(&project, config)?;
            let id = step_id(session.workflow(), step)?;
            let removed = session.remove_block(id)?;
            session.save_project(&project)?;
            println!("✅ Removed step {step} ({})", removed.kind().name());
            Ok(0)
        }
        Commands::Move {
            project,
            step,
            direction,
        } => {
            let mut session = editing_session(&project, config)?;
            let id = step_id(session.workflow(), step)?;
            session.move_block(id, direction)?;
            session.save_project(&project)?;
            let now = session
                .workflow()
                .position(id)
                .map_or(step, |index| index + 1);
            println!("✅ Block is now step {now}");
            Ok(0)
        }
        Commands::Set {
            project,
            step,
            field,
            value,
        } => {
            let mut session = editing_session(&project, config)?;
            let id = step_id(session.workflow(), step)?;
            session.set_field(id, &field, &value)?;
            session.save_project(&project)?;
            println!("✅ Step {step}: {field} = {value:?}");
            Ok(0)
        }
        Commands::Show { project, json } => {
            let workflow = load(&project)?;
            if json {
                println!("{}", codec::serialize(&workflow)?);
            } else {
                print_workflow(&workflow);
            }
            Ok(0)
        }
        Commands::Compile { project, output } => {
            let mut session = editing_session(&project, config)?;
            let script = session.compile();
            if script.clamped_loop_ends > 0 || script.unclosed_loops > 0 {
                eprintln!(
                    "{} unbalanced loops: {} unmatched Loop End, {} unclosed Loop Start",
                    "⚠️".yellow(),
                    script.clamped_loop_ends,
                    script.unclosed_loops
                );
            }
            match output {
                Some(path) => {
                    session.generate_script(&path)?;
                    println!("✅ Script written to {}", path.display());
                }
                None => println!("{script}"),
            }
            Ok(0)
        }
        Commands::Run {
            project,
            dry_run,
            json,
        } => run_project(&project, config, dry_run, json).await,
        Commands::Validate { project } => {
            let workflow = load(&project)?;
            let result = WorkflowValidator::validate(&workflow);
            WorkflowValidator::display_results(&result);
            Ok(if result.is_valid() { 0 } else { 1 })
        }
        Commands::Pick { project, step } => {
            let driver = create_driver(DriverKind::Desktop, config.fail_safe)?;
            let mut session = Session::new(driver, config);
            session.load_project(&project)?;
            let id = step_id(session.workflow(), step)?;
            session.pick_coordinates(id)?;
            println!(
                "🎯 Move the pointer over the target for step {step} and keep it still..."
            );
            session.wait_idle().await;
            print_console_tail(&session, 1);
            session.save_project(&project)?;
            Ok(0)
        }
    }
}

async fn run_project(
    project: &Path,
    mut config: AutomateConfig,
    dry_run: bool,
    json: bool,
) -> Result<i32> {
    let recorder = dry_run.then(|| Arc::new(DryRunDriver::new()));
    let driver: Arc<dyn AutomationDriver> = match &recorder {
        Some(recorder) => {
            config.startup_delay = Duration::ZERO;
            Arc::clone(recorder) as Arc<dyn AutomationDriver>
        }
        None => create_driver(DriverKind::Desktop, config.fail_safe)?,
    };
    let driver_name = driver.name();

    let mut session = Session::new(driver, config);
    session.load_project(project)?;
    if !session.run_now() {
        println!("Nothing to run: {} has no blocks", project.display());
        return Ok(0);
    }

    let mut printed = 0;
    while session.is_running() {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.pump_events();
        if !json {
            printed = print_console_from(&session, printed);
        }
    }
    let report = session
        .wait_idle()
        .await
        .cloned()
        .context("Run finished without a report")?;
    if !json {
        print_console_from(&session, printed);
    }

    let summary = RunSummary::from_report(&report, driver_name);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        if let Some(recorder) = recorder {
            print_calls(&recorder.calls());
        }
        summary.display();
    }
    Ok(summary.exit_code())
}

fn editing_session(project: &Path, config: AutomateConfig) -> Result<Session> {
    let mut session = Session::new(Arc::new(DryRunDriver::new()), config);
    session
        .load_project(project)
        .with_context(|| format!("Failed to load {}", project.display()))?;
    Ok(session)
}

fn load(project: &Path) -> Result<Workflow> {
    codec::load(project).with_context(|| format!("Failed to load {}", project.display()))
}

fn step_id(workflow: &Workflow, step: usize) -> Result<RecordId> {
    match step.checked_sub(1).and_then(|i| workflow.records().get(i)) {
        Some(record) => Ok(record.id()),
        None => bail!(
            "No step {step}: the workflow has {} block(s)",
            workflow.len()
        ),
    }
}

fn parse_values(kind: ActionKind, pairs: &[String]) -> Result<HashMap<String, String>> {
    let schema = kind.schema();
    let mut values = HashMap::new();
    for pair in pairs {
        let Some((field, value)) = pair.split_once('=') else {
            bail!("Expected FIELD=VALUE, got '{pair}'");
        };
        let field = field.trim();
        if schema.field(field).is_none() {
            let known: Vec<&str> = kind.fields().iter().map(|f| f.name).collect();
            bail!(
                "'{}' has no field '{field}' (fields: {})",
                kind.name(),
                known.join(", ")
            );
        }
        values.insert(field.to_string(), value.to_string());
    }
    Ok(values)
}

fn print_kinds() {
    for (category, kinds) in by_category() {
        println!("{}", category.title().bold());
        for kind in kinds {
            let schema = kind.schema();
            let fields = schema
                .fields
                .iter()
                .map(|f| format!("{}: {} = {:?}", f.name, f.kind.label(), f.default))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {} {:<20} {}", schema.icon, schema.name, fields.dimmed());
        }
        println!();
    }
}

fn print_workflow(workflow: &Workflow) {
    if workflow.is_empty() {
        println!("(empty workflow)");
        return;
    }
    let mut depth = 0usize;
    for (index, record) in workflow.iter().enumerate() {
        let schema = record.kind().schema();
        if schema.indent_change < 0 {
            depth = depth.saturating_sub(1);
        }
        let values = record
            .fields()
            .map(|(decl, value)| format!("{}={value:?}", decl.name))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:>3}. {}{} {} {}",
            index + 1,
            "  ".repeat(depth),
            schema.icon,
            schema.name.bold(),
            values.dimmed()
        );
        if schema.indent_change > 0 {
            depth += 1;
        }
    }
}

fn print_console_from(session: &Session, printed: usize) -> usize {
    let entries: Vec<_> = session.console().entries().collect();
    for entry in entries.iter().skip(printed.min(entries.len())) {
        println!("{entry}");
    }
    entries.len()
}

fn print_console_tail(session: &Session, count: usize) {
    let len = session.console().len();
    print_console_from(session, len.saturating_sub(count));
}

fn print_calls(calls: &[DriverCall]) {
    println!("{}", "─".repeat(60));
    println!("🧪 Driver calls ({}):", calls.len());
    for (i, call) in calls.iter().enumerate() {
        println!("   {:>3}. {call:?}", i + 1);
    }
}
