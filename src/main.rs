use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use tasklist::config::{Backend, Config};
use tasklist::{
    Confirm, Level, Notification, Notify, Session, SnapshotStorage, TaskFilter, TaskId, TaskStore, ViewRow,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "Tasklist - add, complete, filter and clear tasks kept in local storage")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: <config dir>/tasklist/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage backend, overrides the config file
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Snapshot file or database path, overrides the config file
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Show tasks and the number still outstanding
    List {
        #[arg(short, long, default_value = "all")]
        filter: TaskFilter,
    },

    /// Rename a task
    Edit {
        id: TaskId,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Mark a task completed, or outstanding again
    Toggle { id: TaskId },

    /// Delete a task
    Remove { id: TaskId },

    /// Delete every task matching a filter
    Clear {
        #[arg(short, long, default_value = "all")]
        filter: TaskFilter,
    },

    /// Interactive line-based session
    Shell,
}

/// Prompts on stdin unless told to assume yes
struct StdinConfirm {
    assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        print!("{} [y/N] ", prompt);
        if let Err(e) = io::stdout().flush() {
            warn!(error = ?e, "Failed to flush confirmation prompt");
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// Prints notifications by level and counts failures
#[derive(Default)]
struct ConsoleNotifier {
    failures: usize,
}

impl Notify for ConsoleNotifier {
    fn notify(&mut self, notification: Notification) {
        match notification.level {
            Level::Success => println!("{}", notification.message.green()),
            Level::Notice => println!("{}", notification.message.yellow()),
            Level::Failure => {
                self.failures += 1;
                eprintln!("{}", notification.message.red());
            }
        }
    }
}

type CliSession = Session<Box<dyn SnapshotStorage>, StdinConfirm, ConsoleNotifier>;

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(path) = cli.path {
        config.path = Some(path);
    }

    // Open store
    let store = TaskStore::open(config.open_storage()?);
    let mut session = Session::new(
        store,
        StdinConfirm { assume_yes: cli.yes },
        ConsoleNotifier::default(),
    );

    match cli.command {
        Commands::Add { name } => {
            session.add(&name.join(" "));
        }
        Commands::List { filter } => {
            session.set_filter(filter);
            print_rows(&session);
        }
        Commands::Edit { id, name } => {
            if session.begin_edit(id) {
                session.update_draft(&name.join(" "));
                if session.save_edit().is_none() {
                    session.cancel_edit();
                }
            }
        }
        Commands::Toggle { id } => {
            session.toggle(id);
        }
        Commands::Remove { id } => {
            session.remove(id);
        }
        Commands::Clear { filter } => {
            session.set_filter(filter);
            session.clear();
        }
        Commands::Shell => {
            // Failures inside an interactive session are already shown
            run_shell(&mut session)?;
            return Ok(());
        }
    }

    if session.notifier().failures > 0 {
        process::exit(1);
    }

    Ok(())
}

fn print_rows(session: &CliSession) {
    let rows = session.rows();

    if rows.is_empty() {
        println!("{}", format!("No {} tasks", session.filter()).dimmed());
    }

    for row in &rows {
        match row {
            ViewRow::Displayed(task) if task.completed => {
                println!("[x] {} {}", task.id.to_string().dimmed(), task.name.strikethrough().dimmed());
            }
            ViewRow::Displayed(task) => {
                println!("[ ] {} {}", task.id.to_string().dimmed(), task.name);
            }
            ViewRow::Editing { task, pending_name } => {
                let mark = if task.completed { "[x]" } else { "[ ]" };
                println!(
                    "{} {} {} {}",
                    mark,
                    task.id.to_string().dimmed(),
                    pending_name.yellow(),
                    "(editing)".yellow()
                );
            }
        }
    }

    println!("{} ({}): {} remaining", "Tasks".bold(), session.filter(), session.remaining());
}

const SHELL_HELP: &str = "\
commands:
  add <name>        add a task
  edit <id>         start editing a task
  draft <name>      change the pending name
  save [name]       save the edit
  cancel            abandon the edit
  toggle <id>       flip completion
  rm <id>           delete a task
  clear             delete tasks under the current filter
  filter <f>        all | assigned | completed
  list              show tasks
  quit";

fn run_shell(session: &mut CliSession) -> Result<()> {
    println!("{}", SHELL_HELP.dimmed());
    print_rows(session);

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                println!("{}", SHELL_HELP);
                continue;
            }
            "add" => {
                session.add(rest);
            }
            "edit" => {
                if let Some(id) = parse_id(rest) {
                    session.begin_edit(id);
                }
            }
            "draft" => session.update_draft(rest),
            "save" => {
                if !rest.is_empty() {
                    session.update_draft(rest);
                }
                session.save_edit();
            }
            "cancel" => session.cancel_edit(),
            "toggle" => {
                if let Some(id) = parse_id(rest) {
                    session.toggle(id);
                }
            }
            "rm" | "remove" => {
                if let Some(id) = parse_id(rest) {
                    session.remove(id);
                }
            }
            "clear" => {
                session.clear();
            }
            "filter" => match rest.parse::<TaskFilter>() {
                Ok(filter) => {
                    session.set_filter(filter);
                }
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            "list" | "ls" => {}
            other => {
                eprintln!("{}", format!("unknown command '{}', try help", other).red());
                continue;
            }
        }

        print_rows(session);
    }

    Ok(())
}

fn parse_id(raw: &str) -> Option<TaskId> {
    match raw.parse::<TaskId>() {
        Ok(id) => Some(id),
        Err(_) => {
            eprintln!("{}", format!("expected a task id, got '{}'", raw).red());
            None
        }
    }
}
