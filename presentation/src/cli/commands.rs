//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use taskforge_domain::{ExecutionStrategy, TaskType};

/// Output format for execution results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored summary with artifacts
    Text,
    /// The task and its executions as JSON
    Json,
}

fn parse_strategy(s: &str) -> Result<ExecutionStrategy, String> {
    s.parse()
}

fn parse_task_type(s: &str) -> Result<TaskType, String> {
    s.parse()
}

/// CLI arguments for taskforge
#[derive(Parser, Debug)]
#[command(name = "taskforge")]
#[command(author, version, about = "Classify, plan and run AI coding tasks")]
#[command(long_about = r#"
taskforge turns a coding-task description into an executed result.

The task is classified by complexity, then run with a matching strategy:
  Simple   -> single-shot   one model call
  Medium   -> iterative     draft, self-critique, refine
  Complex  -> multi-agent   plan, then coder and reviewer per step
  Epic     -> hybrid        multi-agent at the highest planning tier

Configuration files are loaded from (in priority order):
1. TASKFORGE_* environment variables
2. --config <path>     Explicit config file
3. ./taskforge.toml    Project-level config
4. ~/.config/taskforge/config.toml   Global config

Example:
  taskforge "Fix null pointer in login handler"
  taskforge -s multi-agent -m gpt-4o "Add an LRU cache to the session store"
"#)]
pub struct Cli {
    /// What the task should accomplish
    pub description: Option<String>,

    /// Short task title (defaults to the first line of the description)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Task type; the classifier decides when omitted
    #[arg(long = "type", value_name = "TYPE", value_parser = parse_task_type)]
    pub task_type: Option<TaskType>,

    /// Force a strategy (single-shot, iterative, multi-agent, hybrid)
    #[arg(short, long, value_name = "STRATEGY", value_parser = parse_strategy)]
    pub strategy: Option<ExecutionStrategy>,

    /// Model to run the task with
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// User the task is recorded and rate-limited under
    #[arg(long, default_value = "local")]
    pub user: String,

    /// Output format (defaults to `output.format` from config)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not echo execution log lines while the task runs
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// Explicit title, or the first line of the description cut to 80 chars.
    pub fn resolved_title(&self) -> Option<String> {
        if let Some(title) = &self.title {
            return Some(title.clone());
        }
        let first_line = self.description.as_deref()?.lines().next()?.trim();
        if first_line.is_empty() {
            return None;
        }
        Some(first_line.chars().take(80).collect())
    }
}
