//! Interactive line shell over a running engine.
//!
//! Each input line is tokenized (double quotes group words) and parsed with
//! clap, so `help` and per-command `--help` come for free.

use anyhow::{Context, Result, bail};
use chrono::Duration;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use taskminder_core::{Engine, EngineState, Notification, ReminderError, TaskSnapshot};
use tokio::sync::mpsc;

use crate::render;
use crate::time::parse_local_due;

#[derive(Parser, Debug)]
#[command(name = "taskminder", no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Create a task
    Add {
        /// Due time in the display zone, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        due: String,

        /// Reminder lead in minutes (default from config)
        #[arg(long, allow_negative_numbers = true)]
        lead: Option<i64>,

        #[arg(long, short)]
        description: Option<String>,

        /// Task title
        title: Vec<String>,
    },

    /// List every task by due time
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Tasks whose reminder opens within the next N minutes
    Upcoming {
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        minutes: Option<i64>,
    },

    /// Mark a task complete
    Complete { id: u64 },

    /// Remove a task
    Remove { id: u64 },

    /// Run a reminder scan immediately
    Scan,

    /// Engine state and task counts
    Status,

    /// Stop the engine and leave
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct ShellSettings {
    pub tz: Tz,
    pub default_lead_minutes: i64,
    pub upcoming_window_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

pub struct Shell {
    engine: Engine,
    settings: ShellSettings,
}

impl Shell {
    pub fn new(engine: Engine, settings: ShellSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn execute(&self, line: &str) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::say("");
        }

        let args = match split_args(line) {
            Ok(a) => a,
            Err(e) => return Reply::say(e.to_string()),
        };
        let parsed = match Line::try_parse_from(args) {
            Ok(p) => p,
            Err(e) => return Reply::say(e.render().to_string().trim_end()),
        };

        match parsed.command {
            ShellCommand::Add {
                due,
                lead,
                description,
                title,
            } => Reply::say(self.add(&due, lead, description, &title)),
            ShellCommand::List { json } => Reply::say(self.list(json)),
            ShellCommand::Upcoming { minutes } => Reply::say(
                self.upcoming(minutes.unwrap_or(self.settings.upcoming_window_minutes)),
            ),
            ShellCommand::Complete { id } => Reply::say(match self.engine.store().mark_complete(id) {
                Some(_) => "Task marked complete.",
                None => "Task ID not found.",
            }),
            ShellCommand::Remove { id } => Reply::say(if self.engine.store().remove(id) {
                "Task removed."
            } else {
                "Task ID not found."
            }),
            ShellCommand::Scan => {
                let r = self.engine.scan_now();
                Reply::say(format!(
                    "Scan complete: {} checked, {} reminders, {} deadlines.",
                    r.scanned, r.reminders, r.deadlines
                ))
            }
            ShellCommand::Status => Reply::say(self.status()),
            ShellCommand::Quit => Reply {
                text: "Bye.".to_string(),
                quit: true,
            },
        }
    }

    fn add(&self, due: &str, lead: Option<i64>, description: Option<String>, title: &[String]) -> String {
        let title = title.join(" ");
        if title.trim().is_empty() {
            return "Title cannot be empty.".to_string();
        }

        let Ok(due_at) = parse_local_due(due, self.settings.tz) else {
            return "Invalid date format. Use yyyy-MM-dd HH:mm.".to_string();
        };
        let store = self.engine.store();
        if due_at < store.now() {
            return "Due date must be in the future.".to_string();
        }

        let lead = lead.unwrap_or(self.settings.default_lead_minutes);
        if lead < 0 {
            return "Reminder lead time cannot be negative.".to_string();
        }
        let Some(lead) = Duration::try_minutes(lead) else {
            return "Invalid number for reminder lead time.".to_string();
        };

        let description = description.unwrap_or_default();
        match store.add(title.trim(), description.trim(), due_at, lead) {
            Ok(task) => format!("Task created with ID: {}", task.id()),
            Err(ReminderError::InvalidInput(msg)) => msg,
            Err(e) => e.to_string(),
        }
    }

    fn list(&self, json: bool) -> String {
        let tasks = self.engine.store().all_sorted_by_due();
        if json {
            let snaps: Vec<TaskSnapshot> = tasks.iter().map(|t| t.snapshot()).collect();
            return serde_json::to_string_pretty(&snaps)
                .unwrap_or_else(|e| format!("cannot render tasks: {e}"));
        }
        if tasks.is_empty() {
            return "No tasks available.".to_string();
        }
        tasks
            .iter()
            .map(|t| render::describe(t, self.settings.tz))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn upcoming(&self, minutes: i64) -> String {
        let Some(window) = Duration::try_minutes(minutes) else {
            return "Invalid window.".to_string();
        };
        let store = self.engine.store();
        let now = store.now();
        let upcoming = store.due_within_at(now, window);
        if upcoming.is_empty() {
            return format!("No reminders due in the next {minutes} minutes.");
        }

        let mut out = format!("Reminders within {minutes} minutes:");
        for t in &upcoming {
            out.push_str("\n - ");
            out.push_str(&render::reminder_window_line(t, now, self.settings.tz));
        }
        out
    }

    fn status(&self) -> String {
        let store = self.engine.store();
        let state = match self.engine.state() {
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        };
        format!(
            "Engine: {} (every {}s) | Tasks: {} ({} active)",
            state,
            self.engine.config().interval.as_secs(),
            store.len(),
            store.all_active().len()
        )
    }
}

/// Whitespace split with double-quoted groups.
pub fn split_args(line: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    out.push(std::mem::take(&mut cur));
                    in_token = false;
                }
            }
            c => {
                cur.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        bail!("unterminated quote");
    }
    if in_token {
        out.push(cur);
    }
    Ok(out)
}

const BANNER: &str = "taskminder shell. Type `help` for commands, `quit` to leave.";

/// Start the engine and read commands from stdin until `quit`, EOF, or Ctrl-C.
pub async fn run(shell: Shell, mut notes: mpsc::UnboundedReceiver<Notification>) -> Result<()> {
    let tz = shell.settings.tz;
    let printer = tokio::spawn(async move {
        while let Some(note) = notes.recv().await {
            println!("\n{}\x07", render::notification_line(&note, tz));
        }
    });

    shell.engine().start()?;
    println!("{BANNER}");

    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    loop {
        print!("> ");
        std::io::stdout().flush().context("flush stdout")?;

        let line = tokio::select! {
            line = lines.recv() => line.transpose().context("read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let reply = shell.execute(&line);
        if !reply.text.is_empty() {
            println!("{}", reply.text);
        }
        if reply.quit {
            break;
        }
    }

    shell.engine().stop();
    printer.abort();
    Ok(())
}

/// Feed lines from a blocking reader through a channel.
///
/// Reads happen on a plain thread, outside the runtime's blocking pool, so
/// runtime shutdown never waits on a pending read. The channel closes at EOF
/// or after the first read error.
fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<std::io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}
