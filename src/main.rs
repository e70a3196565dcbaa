mod cli;

use std::fs::OpenOptions;
use std::io::Read as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;

use cli::{Cli, Command};
use tasktrail::config::Config;
use tasktrail::model::{Priority, Status};
use tasktrail::planner::{PlanOutcome, PlanningHeuristic};
use tasktrail::progress::TaskProgress;
use tasktrail::store::ProgressStore;
use tasktrail::{output, tools, watch, TaskError};

fn setup_logging(log_file: Option<&str>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.format_timestamp_secs().init();
    Ok(())
}

fn stamp_session(progress: &mut TaskProgress, session: Option<&str>) {
    if let Some(id) = session {
        progress.session_id = Some(id.to_string());
    }
}

/// Dispatch a single parsed command against loaded progress.
/// Used both for direct invocations and within `exec` batches.
fn dispatch(progress: &mut TaskProgress, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            println!("{}", output::format_summary(progress));
        }

        Command::List {
            available,
            incomplete,
            json,
        } => {
            let subtasks = if available {
                progress.get_available()
            } else if incomplete {
                progress.get_incomplete()
            } else {
                progress.subtasks().iter().collect()
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&subtasks)?);
            } else {
                print!("{}", output::format_subtask_list(&subtasks));
            }
        }

        Command::Show { id, json } => {
            let sub = progress
                .get_subtask(&id)
                .ok_or_else(|| TaskError::NotFound(id.clone()))?;
            if json {
                let detail = output::SubtaskDetail::new(progress, sub);
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print!("{}", output::format_subtask_detail(progress, sub));
            }
        }

        Command::Main {
            description,
            status,
            priority,
            estimate,
        } => {
            let status = Status::parse(&status)?;
            let priority = Priority::parse(&priority)?;
            progress.set_main_task(&description, status, priority, estimate);
            eprintln!("Set main task '{description}'");
        }

        Command::Add {
            id,
            name,
            desc,
            deps,
        } => {
            progress.add_subtask(&id, &name, &desc, deps)?;
            eprintln!("Added subtask '{id}'");
        }

        Command::SetStatus {
            id,
            status,
            notes,
            files_modified,
        } => {
            let status = Status::parse(&status)?;
            let files = (!files_modified.is_empty()).then_some(files_modified.as_slice());
            let previous = progress.update_status(&id, status, notes.as_deref(), files)?;
            eprintln!("'{id}': {previous} -> {status}");
        }

        Command::Edit { id, name, notes } => {
            let edited = progress.edit_subtask(&id, name.as_deref(), notes.as_deref())?;
            if edited.is_empty() {
                eprintln!("Nothing to change for '{id}'");
            } else {
                eprintln!("Updated {} for '{id}'", edited.join(", "));
            }
        }

        Command::CompleteMain => {
            if !progress.mark_main_complete() {
                bail!("no main task to complete");
            }
            eprintln!("Marked main task complete");
        }

        Command::Decide { text } => {
            progress.add_decision(&text);
            eprintln!("Recorded decision");
        }

        Command::Blocker { text, resolved } => {
            progress.add_blocker(&text, resolved);
            eprintln!("Recorded blocker");
        }

        Command::Audit { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(progress.audit_log())?);
            } else {
                print!("{}", output::format_audit(progress.audit_log().entries()));
            }
        }

        Command::Cycles => {
            let cycles = progress.dependency_cycles();
            if cycles.is_empty() {
                eprintln!("No dependency cycles");
            }
            for cycle in &cycles {
                println!("{}", output::format_cycle(cycle));
            }
        }

        Command::Analyze { text, json } => {
            let analysis = PlanningHeuristic::new(config.min_prompt_length()).analyze(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("should_plan: {}", analysis.should_plan);
                println!("reason: {}", analysis.reason());
                for name in &analysis.suggested_subtask_names {
                    println!("suggested: {name}");
                }
            }
        }

        Command::Tools { prompt, allowed } => {
            let registry = tools::task_registry()?;
            if prompt {
                println!("{}", registry.system_prompt_section());
            } else if let Some(server) = allowed {
                for name in registry.allowed_tools(&server) {
                    println!("{name}");
                }
            } else {
                println!("{}", registry.introspection_text());
            }
        }

        Command::Tool { .. } => bail!("tool cannot be used inside exec"),
        Command::Plan { .. } => bail!("plan cannot be used inside exec"),
        Command::Clear => bail!("clear cannot be used inside exec"),
        Command::Wait { .. } => bail!("wait cannot be used inside exec"),
        Command::Exec => bail!("exec cannot be nested"),
    }

    Ok(())
}

fn parse_exec_line(line: &str) -> Result<Command> {
    let tokens = shlex::split(line).context("unbalanced quotes")?;
    let mut args = vec!["tasktrail".to_string()];
    args.extend(tokens);
    let cli = Cli::try_parse_from(&args).with_context(|| format!("failed to parse: {line}"))?;
    Ok(cli.command)
}

fn run_exec(
    store: &ProgressStore,
    config: &Config,
    session: Option<&str>,
    input: &str,
) -> Result<()> {
    // Parse all commands first, before loading anything
    let mut commands = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command = parse_exec_line(line).with_context(|| format!("line {lineno}"))?;
        // Reject commands that manage the store themselves
        match &command {
            Command::Exec => bail!("line {lineno}: exec cannot be nested"),
            Command::Wait { .. } => bail!("line {lineno}: wait cannot be used inside exec"),
            Command::Tool { .. } => bail!("line {lineno}: tool cannot be used inside exec"),
            Command::Plan { .. } => bail!("line {lineno}: plan cannot be used inside exec"),
            Command::Clear => bail!("line {lineno}: clear cannot be used inside exec"),
            _ => {}
        }
        commands.push((lineno, line.to_string(), command));
    }

    if commands.is_empty() {
        return Ok(());
    }

    store.transact(|progress| {
        stamp_session(progress, session);
        for (lineno, line, command) in commands {
            dispatch(progress, config, command).with_context(|| format!("line {lineno}: {line}"))?;
        }
        Ok(())
    })
}

fn parse_tool_args(args: Option<String>) -> Result<Value> {
    let raw = match args.as_deref() {
        None => return Ok(Value::Object(Default::default())),
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(s) => s.to_string(),
    };
    serde_json::from_str(&raw).context("tool arguments must be a JSON object")
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(p) => Config::load_from(Path::new(p)),
        None => Config::load(),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_file.as_deref())?;
    let config = load_config(cli.config.as_deref())?;
    let store = ProgressStore::new(config.progress_path(cli.file.as_deref()))
        .with_locking(config.lock_enabled());
    let session = cli.session.as_deref();

    match cli.command {
        Command::Exec => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            run_exec(&store, &config, session, &input)?;
        }

        Command::Wait { timeout } => {
            let (_watcher, rx) = watch::watch_file(store.path())?;
            let timeout = timeout.map_or(Duration::MAX, Duration::from_secs);
            if !watch::wait_for_change(&rx, timeout) {
                eprintln!("No change within timeout");
                std::process::exit(1);
            }
        }

        Command::Tool { name, args, json } => {
            let args = parse_tool_args(args)?;
            let registry = tools::task_registry()?;
            let response = registry.dispatch(&store, &name, &args)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response.to_json())?);
            } else {
                println!("{}", response.text);
            }
            if response.is_error {
                std::process::exit(1);
            }
        }

        Command::Plan { text, replace } => {
            let heuristic = PlanningHeuristic::new(config.min_prompt_length());
            let preserve = !replace && config.preserve_existing();
            match heuristic.execute(&store, &text, preserve)? {
                PlanOutcome::Skipped => eprintln!("No plan needed (simple request)"),
                PlanOutcome::Planned {
                    main_task_set,
                    added,
                } => {
                    if main_task_set {
                        eprintln!("Set main task");
                    }
                    if !added.is_empty() {
                        eprintln!("Added subtasks: {}", added.join(", "));
                    }
                }
            }
        }

        Command::Clear => {
            let response = tools::clear_tasks(&store)?;
            eprintln!("{}", response.text);
        }

        other if other.is_mutation() => {
            store.transact(|progress| {
                stamp_session(progress, session);
                dispatch(progress, &config, other)
            })?;
        }

        other => {
            let mut progress = store.load()?;
            dispatch(&mut progress, &config, other)?;
        }
    }

    Ok(())
}
