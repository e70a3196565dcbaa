use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tasktrail",
    about = "Dependency-aware task progress tracker for AI agents",
    version
)]
pub struct Cli {
    /// Path to the progress file [default: ./.task-progress.json]
    #[arg(long, env = "TASKTRAIL_FILE", global = true)]
    pub file: Option<String>,

    /// Path to the TOML config file [default: ./tasktrail.toml]
    #[arg(long, env = "TASKTRAIL_CONFIG", global = true)]
    pub config: Option<String>,

    /// Append log output to this file instead of stderr
    #[arg(long, env = "TASKTRAIL_LOG_FILE", global = true)]
    pub log_file: Option<String>,

    /// Session id recorded in the progress file on mutation
    #[arg(long, env = "TASKTRAIL_SESSION", global = true)]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show a progress summary grouped by status
    Status,

    /// List subtasks in insertion order
    List {
        /// Only pending subtasks whose dependencies are complete
        #[arg(long, conflicts_with = "incomplete")]
        available: bool,
        /// Only subtasks that are not complete or skipped
        #[arg(long)]
        incomplete: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show subtask details
    Show {
        /// Subtask id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set (or replace) the main task
    Main {
        /// Main task description
        description: String,
        /// Initial status (pending, in_progress, complete, blocked, skipped)
        #[arg(short, long, default_value = "in_progress")]
        status: String,
        /// Priority (low, normal, high)
        #[arg(short, long, default_value = "normal")]
        priority: String,
        /// Expected number of subtasks
        #[arg(short, long)]
        estimate: Option<u32>,
    },

    /// Add a pending subtask
    Add {
        /// Subtask id (must be unused)
        id: String,
        /// Subtask name
        name: String,
        /// Longer description
        #[arg(short, long, default_value = "")]
        desc: String,
        /// Id of a subtask that must complete first (repeatable)
        #[arg(long = "dep")]
        deps: Vec<String>,
    },

    /// Change a subtask's status
    SetStatus {
        /// Subtask id
        id: String,
        /// New status (pending, in_progress, complete, blocked, skipped)
        status: String,
        /// Replace the subtask's notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Record a file touched by this subtask (repeatable)
        #[arg(long = "file-modified")]
        files_modified: Vec<String>,
    },

    /// Rename a subtask or replace its notes
    Edit {
        /// Subtask id
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Mark the main task complete
    CompleteMain,

    /// Record a key decision
    Decide {
        /// Decision text
        text: String,
    },

    /// Record a blocker
    Blocker {
        /// Blocker description
        text: String,
        /// Record it as already resolved
        #[arg(long)]
        resolved: bool,
    },

    /// Show the audit log
    Audit {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report dependency cycles among subtasks
    Cycles,

    /// Decide whether a request warrants a plan (no side effects)
    Analyze {
        /// Request text
        text: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seed a main task and subtasks from a request, if it warrants a plan
    Plan {
        /// Request text
        text: String,
        /// Replace an existing main task instead of keeping it
        #[arg(long)]
        replace: bool,
    },

    /// Invoke a registered tool operation
    Tool {
        /// Tool name (see `tasktrail tools`)
        name: String,
        /// JSON arguments object ("-" reads from stdin)
        args: Option<String>,
        /// Print the response envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered tool operations
    Tools {
        /// Print the system-prompt section instead
        #[arg(long, conflicts_with = "allowed")]
        prompt: bool,
        /// Print fully-qualified tool names for this server name
        #[arg(long)]
        allowed: Option<String>,
    },

    /// Discard all progress and delete the progress file
    Clear,

    /// Execute commands from stdin in one all-or-nothing cycle
    Exec,

    /// Block until the progress file changes
    Wait {
        /// Give up after this many seconds (exit status 1)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Command {
    /// Whether the command changes stored progress.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Main { .. }
                | Command::Add { .. }
                | Command::SetStatus { .. }
                | Command::Edit { .. }
                | Command::CompleteMain
                | Command::Decide { .. }
                | Command::Blocker { .. }
        )
    }
}
