//! Command-line host for the task store.
//!
//! # Responsibility
//! - Drive `taskdeck_core` end to end against a SQLite file.
//! - Keep output deterministic: plain lines by default, JSON with `--json`.

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::PathBuf;
use taskdeck_core::{
    core_version, default_log_level, due_soon_window, format_timestamp, init_logging,
    parse_timestamp, ping, remaining_or_overdue, SqliteTaskRepository, Task, TaskChanges,
    TaskDraft, TaskIcon, TaskStore, Timestamp,
};

const DEFAULT_DB_FILE_NAME: &str = "taskdeck.sqlite3";

#[derive(Debug, Parser)]
#[command(name = "taskdeck")]
#[command(about = "Schedule named tasks and see what is due next", long_about = None)]
struct Cli {
    /// SQLite database file. Defaults to taskdeck.sqlite3 in the temp dir.
    #[arg(long, env = "TASKDECK_DB_PATH", global = true)]
    db: Option<PathBuf>,
    /// Print machine-readable JSON instead of plain lines
    #[arg(long, global = true)]
    json: bool,
    /// Absolute directory for rolling log files; logging is off without it
    #[arg(long, env = "TASKDECK_LOG_DIR", global = true)]
    log_dir: Option<String>,
    /// Log level used with --log-dir (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a task
    Add {
        /// Letters, digits and spaces, at most 20 characters
        name: String,
        /// Schedule as "dd/mm/yyyy HH:MM"
        #[arg(short, long)]
        at: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Icon key, see `taskdeck icons`
        #[arg(short, long, default_value = "android")]
        icon: String,
    },
    /// Edit a task; omitted fields stay unchanged
    Edit {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        /// Schedule as "dd/mm/yyyy HH:MM"
        #[arg(short, long)]
        at: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        icon: Option<String>,
    },
    /// Delete a task
    Delete { id: i64 },
    /// List tasks, newest first
    List {
        /// Case-insensitive name filter
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Show tasks due within the next window
    Due {
        #[arg(short, long)]
        within_minutes: Option<i64>,
    },
    /// Print the icon catalog
    Icons,
    /// Check core linkage
    Ping,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir).context("failed to start logging")?;
    }

    match cli.command {
        Commands::Ping => {
            println!("taskdeck_core ping={}", ping());
            println!("taskdeck_core version={}", core_version());
            Ok(())
        }
        Commands::Icons => {
            print_icons(cli.json);
            Ok(())
        }
        command => {
            let store = open_store(cli.db)?;
            run_store_command(&store, command, cli.json)
        }
    }
}

fn open_store(db: Option<PathBuf>) -> Result<TaskStore<SqliteTaskRepository>> {
    let path = db.unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
    let repo = SqliteTaskRepository::open(&path)
        .with_context(|| format!("failed to open task database `{}`", path.display()))?;
    let store = TaskStore::open(repo).context("failed to load tasks")?;
    info!(
        "event=cli_store_open module=cli status=ok task_count={}",
        store.len()
    );
    Ok(store)
}

fn run_store_command(
    store: &TaskStore<SqliteTaskRepository>,
    command: Commands,
    json: bool,
) -> Result<()> {
    match command {
        Commands::Add {
            name,
            at,
            description,
            icon,
        } => {
            let draft = TaskDraft::new(name, parse_timestamp(&at)?)
                .with_description(description)
                .with_icon(parse_icon(&icon)?);
            let task = store.add(draft)?;
            print_tasks(&[task], store.now(), json);
        }
        Commands::Edit {
            id,
            name,
            at,
            description,
            icon,
        } => {
            let changes = TaskChanges {
                name,
                description,
                icon: icon.as_deref().map(parse_icon).transpose()?,
                scheduled_at: at.as_deref().map(parse_timestamp).transpose()?,
            };
            let task = store.update(id, changes)?;
            print_tasks(&[task], store.now(), json);
        }
        Commands::Delete { id } => {
            store.delete(id)?;
            if json {
                println!("{}", json!({ "deleted": id }));
            } else {
                println!("deleted {id}");
            }
        }
        Commands::List { query } => {
            let tasks = match query {
                Some(query) => store.filtered_by_query(&query),
                None => store.list(),
            };
            print_tasks(&tasks, store.now(), json);
        }
        Commands::Due { within_minutes } => {
            let window = due_window(within_minutes)?;
            let tasks = store.due_within(window, store.now());
            print_tasks(&tasks, store.now(), json);
        }
        Commands::Icons | Commands::Ping => {}
    }
    Ok(())
}

fn due_window(within_minutes: Option<i64>) -> Result<Duration> {
    match within_minutes {
        Some(minutes) => Duration::try_minutes(minutes)
            .ok_or_else(|| anyhow!("--within-minutes {minutes} is out of range")),
        None => Ok(due_soon_window()),
    }
}

fn parse_icon(raw: &str) -> Result<TaskIcon> {
    if let Ok(index) = raw.parse::<u32>() {
        return Ok(TaskIcon::from_index(index)?);
    }
    TaskIcon::from_key(raw).ok_or_else(|| anyhow!("unknown icon `{raw}`; see `taskdeck icons`"))
}

fn print_tasks(tasks: &[Task], now: Timestamp, json: bool) {
    if json {
        let rows = tasks
            .iter()
            .map(|task| {
                let countdown = remaining_or_overdue(task.scheduled_at, now);
                json!({
                    "task": task,
                    "countdown": countdown,
                    "label": countdown.label(),
                })
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::Value::Array(rows));
        return;
    }

    for task in tasks {
        let countdown = remaining_or_overdue(task.scheduled_at, now);
        println!(
            "{:>4}  {:<20}  {:<14}  {}  {}",
            task.id,
            task.name,
            task.icon.key(),
            format_timestamp(task.scheduled_at),
            countdown.label()
        );
    }
}

fn print_icons(json: bool) {
    if json {
        let rows = TaskIcon::ALL
            .iter()
            .map(|icon| json!({ "index": icon.index(), "key": icon.key() }))
            .collect::<Vec<_>>();
        println!("{}", serde_json::Value::Array(rows));
        return;
    }
    for icon in TaskIcon::ALL {
        println!("{:>2}  {}", icon.index(), icon.key());
    }
}
