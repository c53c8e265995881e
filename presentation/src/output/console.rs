//! Console output for task results

use crate::api::{ExecutionDto, TaskDto};
use colored::Colorize;
use serde::Serialize;
use taskforge_domain::{ArtifactKind, CodingTask, ExecutionStatus, TaskExecution, TaskStatus};

/// Formats tasks and executions for console display
pub struct ConsoleFormatter;

#[derive(Serialize)]
struct TaskReport {
    task: TaskDto,
    executions: Vec<ExecutionDto>,
}

impl ConsoleFormatter {
    /// Format a task and its latest execution
    pub fn format(task: &CodingTask) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(task.title()));
        output.push_str(&format!(
            "{} {}   {} {}   {} {}\n",
            "Type:".cyan().bold(),
            task.task_type(),
            "Complexity:".cyan().bold(),
            task.complexity()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unclassified".to_string()),
            "Status:".cyan().bold(),
            Self::status(task.status().as_str(), task.status() == TaskStatus::Completed),
        ));

        let Some(execution) = task.latest_execution() else {
            output.push_str(&Self::footer());
            return output;
        };

        output.push_str(&Self::execution(execution));
        output.push_str(&Self::footer());
        output
    }

    fn execution(execution: &TaskExecution) -> String {
        let mut output = String::new();
        let result = &execution.result;

        output.push_str(&format!(
            "{} {} with {}\n",
            "Strategy:".cyan().bold(),
            execution.strategy,
            execution.model
        ));
        output.push_str(&format!(
            "{} {} tokens, ${:.4}{}\n",
            "Usage:".cyan().bold(),
            result.tokens_used,
            result.cost_usd,
            execution
                .duration()
                .map(|d| format!(", {:.1}s", d.num_milliseconds() as f64 / 1000.0))
                .unwrap_or_default()
        ));

        if let Some(error) = &execution.error_message {
            output.push_str(&format!("\n{} {}\n", "Error:".red().bold(), error));
        }
        if !result.summary.is_empty() {
            output.push_str(&format!("\n{}\n", result.summary));
        }

        for artifact in &result.artifacts {
            // plan JSON is only shown with `--output json`
            if artifact.kind == ArtifactKind::Plan {
                continue;
            }
            output.push_str(&format!(
                "\n{}\n{}\n",
                format!("── {} ──", artifact.name).yellow().bold(),
                artifact.content
            ));
        }

        if !result.suggestions.is_empty() {
            output.push_str(&format!("\n{}\n", "Reviewer Suggestions:".green().bold()));
            for suggestion in &result.suggestions {
                output.push_str(&format!("  * {}\n", suggestion));
            }
        }

        if execution.status == ExecutionStatus::Cancelled {
            output.push_str(&format!("\n{}\n", "Execution was cancelled.".yellow()));
        }
        output
    }

    /// Format as JSON
    pub fn format_json(task: &CodingTask) -> String {
        let report = TaskReport {
            task: TaskDto::from(task),
            executions: task.executions().iter().map(ExecutionDto::from).collect(),
        };
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }

    /// One execution log line as echoed while a task runs
    pub fn log_line(line: &str) -> String {
        format!("{} {}", "│".dimmed(), line.dimmed())
    }

    fn status(status: &str, success: bool) -> String {
        if success {
            status.green().bold().to_string()
        } else {
            status.yellow().bold().to_string()
        }
    }

    fn header(title: &str) -> String {
        let line = "═".repeat(60);
        format!("\n{}\n  {}\n{}\n", line.cyan(), title.bold(), line.cyan())
    }

    fn footer() -> String {
        format!("{}\n", "─".repeat(60).dimmed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskforge_domain::{Artifact, ExecutionResult, ExecutionStrategy, TaskType, Usage};

    fn completed_task() -> CodingTask {
        let mut task =
            CodingTask::new("alice", "Add cache", "Add an LRU cache", TaskType::Feature).unwrap();
        let now = Utc::now();
        let id = task
            .start_execution(ExecutionStrategy::MultiAgent, "gpt-4o", now)
            .unwrap();
        task.mark_execution_running(id, now).unwrap();
        task.complete_execution(
            id,
            ExecutionResult::new(Usage::new(120, 0.0042))
                .with_artifact(Artifact::new("step_1", ArtifactKind::Code, "struct Lru;"))
                .with_artifact(Artifact::new("plan", ArtifactKind::Plan, "{\"steps\":[]}"))
                .with_summary("Completed 1/1 plan steps: Add cache")
                .with_suggestions(vec!["Add eviction metrics".to_string()]),
            now,
        )
        .unwrap();
        task
    }

    #[test]
    fn test_format_shows_result_and_hides_plan_artifact() {
        colored::control::set_override(false);
        let output = ConsoleFormatter::format(&completed_task());
        assert!(output.contains("Add cache"));
        assert!(output.contains("MultiAgent with gpt-4o"));
        assert!(output.contains("120 tokens, $0.0042"));
        assert!(output.contains("struct Lru;"));
        assert!(!output.contains("{\"steps\":[]}"));
        assert!(output.contains("* Add eviction metrics"));
    }

    #[test]
    fn test_format_json_includes_executions() {
        let json: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::format_json(&completed_task())).unwrap();
        assert_eq!(json["task"]["status"], "Completed");
        assert_eq!(json["executions"][0]["tokensUsed"], 120);
        assert_eq!(json["executions"][0]["artifacts"][1]["kind"], "plan");
    }
}
