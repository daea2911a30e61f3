use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use workout_core::store::{self, FileStore};
use workout_core::*;

type Machine = SessionStateMachine<FileStore>;

/// Candidates offered when substituting
const MAX_CANDIDATES: usize = 5;

#[derive(Parser)]
#[command(name = "lift")]
#[command(about = "Guided strength workout sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in plans
    Plans,

    /// Remember a plan as the default for `start`
    Select {
        plan_id: String,
    },

    /// Run a workout session (default)
    Start {
        /// Plan to run instead of the selected one
        #[arg(long)]
        plan: Option<String>,

        /// Show the plan without starting
        #[arg(long)]
        dry_run: bool,

        /// Confirm every set at its defaults without prompting (for testing)
        #[arg(long)]
        auto_complete: bool,

        /// Skip rest periods
        #[arg(long)]
        no_rest: bool,
    },

    /// Show recent sessions
    History {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Roll up WAL sessions to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    workout_core::logging::init_with_level(if cli.verbose { "debug" } else { "warn" });

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Plans) => cmd_plans(&data_dir),
        Some(Commands::Select { plan_id }) => cmd_select(&data_dir, &plan_id),
        Some(Commands::Start {
            plan,
            dry_run,
            auto_complete,
            no_rest,
        }) => cmd_start(&data_dir, plan, dry_run, auto_complete, no_rest, &config),
        Some(Commands::History { days }) => cmd_history(&data_dir, days),
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&data_dir, cleanup),
        None => cmd_start(&data_dir, None, false, false, false, &config),
    }
}

fn cmd_plans(data_dir: &Path) -> Result<()> {
    let selected = FileStore::in_data_dir(data_dir).selected_plan()?;

    for plan in get_default_catalog().plans() {
        let marker = if selected.as_deref() == Some(plan.id.as_str()) {
            "*"
        } else {
            " "
        };
        let calories = plan
            .estimated_calories
            .map(|c| format!("~{} kcal", c))
            .unwrap_or_else(|| "-".into());
        println!(
            "{} {:<14} {:<22} {:>2} exercises {:>3} sets  {}",
            marker,
            plan.id,
            plan.name,
            plan.exercises.len(),
            plan.total_sets(),
            calories
        );
    }
    Ok(())
}

fn cmd_select(data_dir: &Path, plan_id: &str) -> Result<()> {
    let plan = get_default_catalog().get_plan(plan_id)?;
    FileStore::in_data_dir(data_dir).select_plan(&plan.id)?;
    println!("✓ Selected {} ({})", plan.name, plan.id);
    Ok(())
}

fn cmd_start(
    data_dir: &Path,
    plan: Option<String>,
    dry_run: bool,
    auto_complete: bool,
    no_rest: bool,
    config: &Config,
) -> Result<()> {
    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Other("Invalid catalog".into()));
    }

    let store = FileStore::in_data_dir(data_dir);
    let plan_id = match plan {
        Some(id) => id,
        None => store
            .selected_plan()?
            .unwrap_or_else(|| config.session.default_plan.clone()),
    };
    let plan = catalog.get_plan(&plan_id)?;

    display_plan(&plan);

    if dry_run {
        println!("\n[Dry run - not starting session]");
        return Ok(());
    }

    let mut machine = SessionStateMachine::new(store, config.engine_settings());
    machine.start(plan)?;

    if auto_complete {
        run_auto(&mut machine)
    } else {
        run_interactive(&mut machine, config, no_rest)
    }
}

fn cmd_history(data_dir: &Path, days: i64) -> Result<()> {
    let entries =
        load_recent_sessions(&store::wal_path(data_dir), &store::csv_path(data_dir), days)?;

    if entries.is_empty() {
        println!("No sessions in the last {} days.", days);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {:<14} {:>3} min  {:>2} sets  {:>4} kcal  {:>4} pts",
            entry.started_at.format("%Y-%m-%d %H:%M"),
            entry.plan_id,
            entry.duration_seconds / 60,
            entry.sets_completed,
            entry.estimated_calories,
            entry.points_earned
        );
    }
    let points: u64 = entries.iter().map(|e| e.points_earned).sum();
    println!("\n{} sessions, {} points", entries.len(), points);
    Ok(())
}

fn cmd_rollup(data_dir: &Path, cleanup: bool) -> Result<()> {
    let wal_path = store::wal_path(data_dir);
    let csv_path = store::csv_path(data_dir);

    if !wal_path.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = workout_core::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path)?;

    println!("✓ Rolled up {} sessions to CSV", count);
    println!("  CSV: {}", csv_path.display());

    if cleanup {
        if let Some(wal_dir) = wal_path.parent() {
            let cleaned = workout_core::csv_rollup::cleanup_processed_wals(wal_dir)?;
            if cleaned > 0 {
                println!("✓ Cleaned up {} processed WAL files", cleaned);
            }
        }
    }

    Ok(())
}

// ----------------------------------------------------------------------
// Session driving
// ----------------------------------------------------------------------

fn run_auto(machine: &mut Machine) -> Result<()> {
    loop {
        match machine.state() {
            SessionState::Resting => machine.skip_rest()?,
            SessionState::SetActive => {
                if let SetOutcome::Completed(summary) = machine.confirm_current_set()? {
                    display_summary(&summary);
                    return Ok(());
                }
            }
            other => {
                tracing::warn!("Auto-complete stopped in {:?}", other);
                return Ok(());
            }
        }
    }
}

fn run_interactive(machine: &mut Machine, config: &Config, no_rest: bool) -> Result<()> {
    let input = spawn_input();
    display_active_set(machine);

    loop {
        match machine.state() {
            SessionState::SetActive => {
                prompt("Enter to confirm, +/- reps, w+/w- weight, s substitute, a abandon")?;
                let Ok(line) = input.recv() else {
                    return abandon_on_eof(machine);
                };
                handle_set_input(machine, &line, config, &input)?;
            }
            SessionState::Resting if no_rest => {
                machine.skip_rest()?;
                display_active_set(machine);
            }
            SessionState::Resting => {
                if !run_rest(machine, config, &input)? {
                    return abandon_on_eof(machine);
                }
                if machine.state() == SessionState::SetActive {
                    display_active_set(machine);
                }
            }
            _ => return Ok(()),
        }
    }
}

fn handle_set_input(
    machine: &mut Machine,
    line: &str,
    config: &Config,
    input: &Receiver<String>,
) -> Result<()> {
    let step = config.session.weight_step;
    match parse_set_command(line) {
        SetCommand::Confirm => {
            let outcome = machine.confirm_current_set();
            report_outcome(machine, outcome, input)?;
        }
        SetCommand::ConfirmWith { reps, weight } => {
            let weight = weight.unwrap_or_else(|| machine.tracker().map_or(0.0, |t| t.weight()));
            let outcome = machine.confirm_set(reps, weight);
            report_outcome(machine, outcome, input)?;
        }
        SetCommand::Reps(delta) => {
            machine.adjust_reps(delta)?;
            display_tracker(machine);
        }
        SetCommand::Weight(direction) => {
            machine.adjust_weight(direction * step)?;
            display_tracker(machine);
        }
        SetCommand::Substitute => choose_substitution(machine, input)?,
        SetCommand::Abandon => {
            machine.abandon()?;
            println!("Session abandoned. Nothing was saved.");
        }
        SetCommand::Unknown(text) => println!("  Unknown command: {}", text),
    }
    Ok(())
}

/// Count down one rest. Returns `false` when input closed.
fn run_rest(machine: &mut Machine, config: &Config, input: &Receiver<String>) -> Result<bool> {
    let step = config.rest.adjust_step_seconds;
    let mut next_tick = Instant::now() + Duration::from_secs(1);

    while machine.state() == SessionState::Resting {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match input.recv_timeout(wait) {
            Ok(line) => match parse_rest_command(&line) {
                RestCommand::Skip => machine.skip_rest()?,
                RestCommand::TogglePause => {
                    if machine.rest_timer().is_some_and(|t| t.is_running()) {
                        machine.pause_rest();
                        println!("\n  Paused");
                    } else {
                        machine.resume_rest();
                        next_tick = Instant::now() + Duration::from_secs(1);
                    }
                }
                RestCommand::Adjust(direction) => {
                    machine.adjust_rest(direction * step);
                    display_rest(machine);
                    println!("  (p to resume)");
                }
                RestCommand::Reset => {
                    machine.reset_rest();
                    display_rest(machine);
                    println!("  (p to resume)");
                }
                RestCommand::Abandon => {
                    machine.abandon()?;
                    println!("\nSession abandoned. Nothing was saved.");
                }
                RestCommand::Unknown(text) => println!("\n  Unknown command: {}", text),
            },
            Err(RecvTimeoutError::Timeout) => {
                next_tick += Duration::from_secs(1);
                match machine.tick()? {
                    RestTick::Counting { .. } => display_rest(machine),
                    RestTick::Finished => println!("\n  Rest over!"),
                    RestTick::Idle => {}
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(false),
        }
    }
    Ok(true)
}

fn report_outcome(
    machine: &mut Machine,
    outcome: Result<SetOutcome>,
    input: &Receiver<String>,
) -> Result<()> {
    match outcome {
        Ok(SetOutcome::Resting { rest_seconds }) => {
            println!(
                "\n  Rest {}s. Enter skips, p pause/resume, +/- adjust, r reset",
                rest_seconds
            );
            Ok(())
        }
        Ok(SetOutcome::NextExercise { .. }) => {
            display_active_set(machine);
            Ok(())
        }
        Ok(SetOutcome::Completed(summary)) => {
            display_summary(&summary);
            Ok(())
        }
        Err(e @ Error::WriteError(_)) if machine.pending_write() => {
            retry_write(machine, e, input)
        }
        Err(e) => {
            println!("  {}", e);
            Ok(())
        }
    }
}

fn retry_write(machine: &mut Machine, mut error: Error, input: &Receiver<String>) -> Result<()> {
    loop {
        eprintln!("Could not save session: {}", error);
        prompt("Enter to retry, 'q' to give up")?;
        match input.recv() {
            Ok(line) if line.trim() != "q" => match machine.retry_persist() {
                Ok(()) => {
                    if let Some(summary) = machine.summary() {
                        display_summary(summary);
                    }
                    return Ok(());
                }
                Err(e) => error = e,
            },
            _ => return Err(error),
        }
    }
}

fn choose_substitution(machine: &mut Machine, input: &Receiver<String>) -> Result<()> {
    let candidates: Vec<ExerciseSummary> =
        match machine.substitution_candidates(get_default_catalog()) {
            Ok(candidates) => candidates.take(MAX_CANDIDATES).collect(),
            Err(e) if e.is_retryable() => {
                println!("  Substitutions unavailable: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

    if candidates.is_empty() {
        println!("  No alternatives found.");
        return Ok(());
    }

    println!();
    for (i, candidate) in candidates.iter().enumerate() {
        match &candidate.equipment {
            Some(equipment) => println!("  {}. {} ({})", i + 1, candidate.name, equipment),
            None => println!("  {}. {}", i + 1, candidate.name),
        }
    }
    prompt("Number to swap, Enter to keep")?;

    let choice = input
        .recv()
        .ok()
        .and_then(|line| line.trim().parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| candidates.get(i));

    match choice {
        Some(replacement) => {
            machine.request_substitution(replacement)?;
            display_active_set(machine);
        }
        None => println!("  Keeping current exercise."),
    }
    Ok(())
}

fn abandon_on_eof(machine: &mut Machine) -> Result<()> {
    if !machine.state().is_terminal() {
        machine.abandon()?;
        println!("\nInput closed. Session abandoned, nothing was saved.");
    }
    Ok(())
}

/// Forward stdin lines to the session loop
fn spawn_input() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

// ----------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum SetCommand {
    Confirm,
    /// `<reps> [weight]`
    ConfirmWith { reps: u32, weight: Option<f64> },
    Reps(i32),
    Weight(f64),
    Substitute,
    Abandon,
    Unknown(String),
}

fn parse_set_command(line: &str) -> SetCommand {
    let text = line.trim().to_lowercase();
    match text.as_str() {
        "" => SetCommand::Confirm,
        "+" => SetCommand::Reps(1),
        "-" => SetCommand::Reps(-1),
        "w+" => SetCommand::Weight(1.0),
        "w-" => SetCommand::Weight(-1.0),
        "s" => SetCommand::Substitute,
        "a" => SetCommand::Abandon,
        _ => {
            let mut parts = text.split_whitespace();
            let reps = parts.next().and_then(|r| r.parse::<u32>().ok());
            let weight = parts.next().map(|w| w.parse::<f64>());
            match (reps, weight, parts.next()) {
                (Some(reps), None, None) => SetCommand::ConfirmWith { reps, weight: None },
                (Some(reps), Some(Ok(weight)), None) => SetCommand::ConfirmWith {
                    reps,
                    weight: Some(weight),
                },
                _ => SetCommand::Unknown(text),
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum RestCommand {
    Skip,
    TogglePause,
    Adjust(i64),
    Reset,
    Abandon,
    Unknown(String),
}

fn parse_rest_command(line: &str) -> RestCommand {
    match line.trim().to_lowercase().as_str() {
        "" => RestCommand::Skip,
        "p" => RestCommand::TogglePause,
        "+" => RestCommand::Adjust(1),
        "-" => RestCommand::Adjust(-1),
        "r" => RestCommand::Reset,
        "a" => RestCommand::Abandon,
        other => RestCommand::Unknown(other.to_string()),
    }
}

// ----------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------

fn display_plan(plan: &WorkoutPlan) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", plan.name.to_uppercase());
    println!("╰─────────────────────────────────────────╯");
    println!();
    for prescription in &plan.exercises {
        println!(
            "  {:<26} {} x {:<3} rest {}s",
            prescription.name,
            prescription.target_sets,
            prescription.target_reps,
            prescription.rest_seconds
        );
    }
    println!();
}

fn display_active_set(machine: &Machine) {
    let (Some(record), Some(slot)) = (machine.record(), machine.current_slot()) else {
        return;
    };
    println!(
        "\n── {} ({}/{}) ──",
        slot.name,
        record.position.exercise_index + 1,
        record.slots.len()
    );
    if slot.is_substituted() {
        println!("  (replacing {})", slot.prescription.name);
    }
    display_tracker(machine);
}

fn display_tracker(machine: &Machine) {
    if let (Some(slot), Some(tracker)) = (machine.current_slot(), machine.tracker()) {
        println!(
            "  Set {}/{}: {} reps @ {}",
            tracker.set_index() + 1,
            slot.prescription.target_sets,
            tracker.reps(),
            tracker.weight()
        );
    }
}

fn display_rest(machine: &Machine) {
    if let Some(timer) = machine.rest_timer() {
        print!(
            "\r  Rest: {:>3}s / {}s ",
            timer.remaining_seconds(),
            timer.total_seconds()
        );
        let _ = io::stdout().flush();
    }
}

fn display_summary(summary: &SessionSummary) {
    println!("\n✓ Session complete!");
    println!(
        "  Duration:  {}m {:02}s",
        summary.duration_seconds / 60,
        summary.duration_seconds % 60
    );
    println!("  Exercises: {}", summary.exercises_completed);
    println!("  Sets:      {}", summary.sets_completed);
    println!("  Calories:  ~{}", summary.estimated_calories);
    println!("  Points:    {}", summary.points_earned);
}

fn prompt(text: &str) -> Result<()> {
    println!("{}", text);
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}
