use serde::Serialize;

use crate::audit::AuditEntry;
use crate::model::{Status, Subtask};
use crate::progress::TaskProgress;

#[derive(Serialize)]
pub struct SubtaskDetail<'a> {
    #[serde(flatten)]
    pub subtask: &'a Subtask,
    pub waiting_on: Vec<&'a str>,
    pub blocks: Vec<&'a str>,
}

impl<'a> SubtaskDetail<'a> {
    pub fn new(progress: &'a TaskProgress, subtask: &'a Subtask) -> Self {
        SubtaskDetail {
            subtask,
            waiting_on: progress.unmet_dependencies(&subtask.id),
            blocks: progress.dependents(&subtask.id),
        }
    }
}

/// Cut `s` to at most `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

pub fn format_subtask_detail(progress: &TaskProgress, sub: &Subtask) -> String {
    let mut out = String::new();
    out.push_str(&format!("Id:          {}\n", sub.id));
    out.push_str(&format!("Name:        {}\n", sub.name));
    out.push_str(&format!("Status:      {}\n", sub.status));
    if !sub.description.is_empty() {
        out.push_str(&format!("Description: {}\n", sub.description));
    }
    if !sub.dependencies.is_empty() {
        out.push_str(&format!("Depends on:  {}\n", sub.dependencies.join(", ")));
    }
    let waiting = progress.unmet_dependencies(&sub.id);
    if !waiting.is_empty() {
        out.push_str(&format!("Waiting on:  {}\n", waiting.join(", ")));
    }
    let dependents = progress.dependents(&sub.id);
    if !dependents.is_empty() {
        out.push_str(&format!("Blocks:      {}\n", dependents.join(", ")));
    }
    if let Some(started) = sub.started_at {
        out.push_str(&format!("Started:     {}\n", started.to_rfc3339()));
    }
    if let Some(completed) = sub.completed_at {
        out.push_str(&format!("Completed:   {}\n", completed.to_rfc3339()));
    }
    if !sub.files_modified.is_empty() {
        out.push_str(&format!("Files:       {}\n", sub.files_modified.join(", ")));
    }
    if !sub.notes.is_empty() {
        out.push('\n');
        out.push_str("Notes:\n");
        for line in sub.notes.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    out
}

pub fn format_subtask_list(subtasks: &[&Subtask]) -> String {
    let mut out = String::new();
    for sub in subtasks {
        let deps = if sub.dependencies.is_empty() {
            String::new()
        } else {
            format!(" (after: {})", sub.dependencies.join(", "))
        };
        out.push_str(&format!(
            "{} {} {}{}\n",
            sub.status.icon(),
            sub.id,
            sub.name,
            deps
        ));
    }
    out
}

fn push_group(lines: &mut Vec<String>, title: &str, marker: &str, items: &[&Subtask], with_notes: bool) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("**{title} ({}):**", items.len()));
    for sub in items {
        if with_notes && !sub.notes.is_empty() {
            lines.push(format!("- {marker} {}: {}", sub.name, sub.notes));
        } else {
            lines.push(format!("- {marker} {}", sub.name));
        }
    }
    lines.push(String::new());
}

fn with_status(progress: &TaskProgress, status: Status) -> Vec<&Subtask> {
    progress
        .subtasks()
        .iter()
        .filter(|s| s.status == status)
        .collect()
}

/// Markdown progress report grouped by status.
pub fn format_summary(progress: &TaskProgress) -> String {
    let Some(main) = progress.main_task.as_ref() else {
        return "No task in progress.".to_string();
    };
    let complete = with_status(progress, Status::Complete);
    let in_progress = with_status(progress, Status::InProgress);
    let pending = with_status(progress, Status::Pending);
    let blocked = with_status(progress, Status::Blocked);

    let mut lines = vec![
        format!("## Task Progress: {}", main.description),
        format!("**Status:** {}", main.status),
        format!(
            "**Progress:** {}/{} subtasks complete",
            complete.len(),
            progress.subtasks().len()
        ),
        String::new(),
    ];
    push_group(&mut lines, "Completed", "✓", &complete, false);
    push_group(&mut lines, "In Progress", "⚡", &in_progress, false);
    push_group(&mut lines, "Pending", "○", &pending, false);
    push_group(&mut lines, "Blocked", "⚠", &blocked, true);

    let cycles = progress.dependency_cycles();
    if !cycles.is_empty() {
        lines.push(format!("**Dependency cycles ({}):**", cycles.len()));
        for cycle in &cycles {
            lines.push(format!("- {}", format_cycle(cycle)));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn format_cycle(cycle: &[String]) -> String {
    let mut ids: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        ids.push(first);
    }
    ids.join(" -> ")
}

pub fn format_audit(entries: &[AuditEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&format!("[{}] {} {}", e.timestamp.to_rfc3339(), e.task_id, e.action));
        match (e.from_status, e.to_status) {
            (Some(from), Some(to)) => out.push_str(&format!(" {from} -> {to}")),
            (None, Some(to)) => out.push_str(&format!(" -> {to}")),
            (Some(from), None) => out.push_str(&format!(" {from} ->")),
            (None, None) => {}
        }
        if let Some(ref details) = e.details {
            out.push_str(&format!(": {details}"));
        }
        out.push('\n');
    }
    out
}
