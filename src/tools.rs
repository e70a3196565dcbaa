//! Operations invoked by the surrounding tool-dispatch layer.
//!
//! Each operation is one load -> mutate -> save cycle against a
//! `ProgressStore` and answers with a short text summary. Argument parsing is
//! lenient: malformed entries inside a list are skipped, but arguments of the
//! wrong overall shape produce an error response.

use anyhow::Result;
use log::info;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Priority, Status};
use crate::output::truncate;
use crate::progress::{TaskProgress, TASK_ID_PREFIX};
use crate::registry::{ToolContext, ToolRegistry, ToolResponse, ToolSpec};
use crate::store::{Commit, ProgressStore};

const MAIN_TASK_ECHO_CHARS: usize = 50;
const ADDED_TASK_ECHO_CHARS: usize = 40;

#[derive(Debug, Default, Deserialize)]
pub struct TodoItem {
    #[serde(default)]
    pub content: String,
    /// Anything other than a known status string counts as pending.
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTasksArgs {
    #[serde(default)]
    pub main_task: Option<String>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskPlanArgs {
    #[serde(default)]
    pub main_task: Option<String>,
    /// New task names. Entries that are not non-blank strings are skipped.
    #[serde(default)]
    pub add_tasks: Vec<Value>,
    /// `{id, name?, status?, notes?}` records. Entries that are not objects,
    /// or that name an unknown id, are skipped.
    #[serde(default)]
    pub modify_tasks: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskModification {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkCompleteArgs {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
}

/// Mark the main task complete once every subtask is finished. Returns
/// whether it was marked by this call.
fn complete_main_if_done(progress: &mut TaskProgress) -> bool {
    let pending_main = progress
        .main_task
        .as_ref()
        .is_some_and(|m| m.status != Status::Complete);
    if pending_main && progress.is_complete() {
        progress.mark_main_complete()
    } else {
        false
    }
}

/// Replace every subtask with `args.todos`, numbered `t1..tn`.
pub fn update_tasks(store: &ProgressStore, args: UpdateTasksArgs) -> Result<ToolResponse> {
    let statuses: Vec<Status> = args
        .todos
        .iter()
        .map(|t| {
            t.status
                .as_ref()
                .and_then(Value::as_str)
                .map_or(Status::Pending, Status::parse_or_pending)
        })
        .collect();

    store.transact(|progress| {
        if let Some(main) = args.main_task.as_deref().filter(|m| !m.is_empty()) {
            progress.set_main_task(main, Status::InProgress, Priority::Normal, None);
        }
        progress.clear_subtasks();
        for (i, (todo, status)) in args.todos.iter().zip(&statuses).enumerate() {
            let id = format!("{TASK_ID_PREFIX}{}", i + 1);
            progress.add_subtask(&id, &todo.content, "", Vec::new())?;
            progress.update_status(&id, *status, None, None)?;
        }
        complete_main_if_done(progress);
        Ok(())
    })?;

    let count = |s: Status| statuses.iter().filter(|&&x| x == s).count();
    Ok(ToolResponse::ok(format!(
        "Tasks updated: {} complete, {} in progress, {} pending",
        count(Status::Complete),
        count(Status::InProgress),
        count(Status::Pending)
    )))
}

/// Apply one modification record. Mutations are reported in `changes`;
/// rejected input is reported in `ignored` and leaves the subtask untouched.
fn modify_task(
    progress: &mut TaskProgress,
    record: &Value,
    changes: &mut Vec<String>,
    ignored: &mut Vec<String>,
) -> Result<()> {
    if !record.is_object() {
        return Ok(());
    }
    let Ok(m) = serde_json::from_value::<TaskModification>(record.clone()) else {
        return Ok(());
    };
    let Some(id) = m.id.filter(|id| progress.contains(id)) else {
        return Ok(());
    };

    let status = match &m.status {
        Some(raw) => match raw.as_str().map(Status::parse) {
            Some(Ok(status)) => Some(status),
            _ => {
                let shown = raw.as_str().map_or_else(|| raw.to_string(), str::to_string);
                ignored.push(format!("Ignored [{id}]: invalid status '{shown}'"));
                None
            }
        },
        None => None,
    };
    let notes = m.notes.as_deref();

    // Notes ride along with a status change when there is one.
    let edit_notes = if status.is_some() { None } else { notes };
    let mut fields: Vec<String> = progress
        .edit_subtask(&id, m.name.as_deref(), edit_notes)?
        .into_iter()
        .map(str::to_string)
        .collect();
    if let Some(status) = status {
        progress.update_status(&id, status, notes, None)?;
        fields.push(format!("status={status}"));
    }
    if !fields.is_empty() {
        changes.push(format!("Modified [{id}]: {}", fields.join(", ")));
    }
    Ok(())
}

/// Add and modify subtasks without touching the rest of the plan.
pub fn update_task_plan(store: &ProgressStore, args: UpdateTaskPlanArgs) -> Result<ToolResponse> {
    let (changes, ignored) = store.cycle(|progress| {
        let mut changes = Vec::new();
        let mut ignored = Vec::new();

        if let Some(main) = args.main_task.as_deref().filter(|m| !m.is_empty()) {
            progress.set_main_task(main, Status::InProgress, Priority::Normal, None);
            changes.push(format!(
                "Set main task: {}",
                truncate(main, MAIN_TASK_ECHO_CHARS)
            ));
        }

        for name in &args.add_tasks {
            let Some(name) = name.as_str().map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };
            let id = progress.next_free_id(1);
            progress.add_subtask(&id, name, "", Vec::new())?;
            changes.push(format!(
                "Added [{id}]: {}",
                truncate(name, ADDED_TASK_ECHO_CHARS)
            ));
        }

        for record in &args.modify_tasks {
            modify_task(progress, record, &mut changes, &mut ignored)?;
        }

        if complete_main_if_done(progress) {
            changes.push("All tasks complete - marked main task done".to_string());
        }

        if changes.is_empty() {
            Ok(Commit::Discard((changes, ignored)))
        } else {
            Ok(Commit::Save((changes, ignored)))
        }
    })?;

    let mut text = if changes.is_empty() {
        "No changes made. Provide add_tasks or modify_tasks.".to_string()
    } else {
        format!("Task plan updated ({} changes):", changes.len())
    };
    for line in changes.iter().chain(&ignored) {
        text.push_str(&format!("\n  - {line}"));
    }
    Ok(ToolResponse::ok(text))
}

/// Resolve `identifier` to a subtask id: exact id first, then the first
/// subtask whose name contains it, ignoring case.
pub fn resolve_subtask(progress: &TaskProgress, identifier: &str) -> Option<String> {
    if progress.contains(identifier) {
        return Some(identifier.to_string());
    }
    let needle = identifier.to_lowercase();
    progress
        .subtasks()
        .iter()
        .find(|s| s.name.to_lowercase().contains(&needle))
        .map(|s| s.id.clone())
}

/// Mark one subtask complete, found by id or by name.
pub fn mark_task_complete(store: &ProgressStore, args: MarkCompleteArgs) -> Result<ToolResponse> {
    let Some(identifier) = args.task_id.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(ToolResponse::error("Error: task_id is required"));
    };

    store.cycle(|progress| {
        let Some(id) = resolve_subtask(progress, identifier) else {
            let available = progress.subtask_ids().join(", ");
            return Ok(Commit::Discard(ToolResponse::error(format!(
                "Task not found: '{identifier}'. Available: [{available}]"
            ))));
        };
        let name = progress
            .get_subtask(&id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        if progress
            .get_subtask(&id)
            .is_some_and(|s| s.status == Status::Complete)
        {
            return Ok(Commit::Discard(ToolResponse::ok(format!(
                "Task '{name}' is already complete."
            ))));
        }

        let files = (!args.files_modified.is_empty()).then_some(args.files_modified.as_slice());
        progress.update_status(&id, Status::Complete, args.notes.as_deref(), files)?;
        complete_main_if_done(progress);
        info!("marked {id} complete");

        let mut message = format!("Marked '{name}' as complete.");
        let remaining = progress.get_incomplete().len();
        if progress.main_task.is_some() && progress.is_complete() {
            message.push_str(" All tasks complete!");
        } else if remaining > 0 {
            message.push_str(&format!(" {remaining} task(s) remaining."));
        }
        Ok(Commit::Save(ToolResponse::ok(message)))
    })
}

/// Discard all state and delete the backing file.
pub fn clear_tasks(store: &ProgressStore) -> Result<ToolResponse> {
    store.cycle(|progress| {
        store.clear(progress)?;
        Ok(Commit::Discard(()))
    })?;
    Ok(ToolResponse::ok("Task progress cleared."))
}

fn parse_args<T: DeserializeOwned + Default>(args: &Value) -> std::result::Result<T, ToolResponse> {
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args.clone())
        .map_err(|e| ToolResponse::error(format!("Error: invalid arguments: {e}")))
}

fn handle_update_tasks(ctx: &ToolContext<'_>, args: &Value) -> Result<ToolResponse> {
    match parse_args(args) {
        Ok(args) => update_tasks(ctx.store, args),
        Err(resp) => Ok(resp),
    }
}

fn handle_update_task_plan(ctx: &ToolContext<'_>, args: &Value) -> Result<ToolResponse> {
    match parse_args(args) {
        Ok(args) => update_task_plan(ctx.store, args),
        Err(resp) => Ok(resp),
    }
}

fn handle_mark_task_complete(ctx: &ToolContext<'_>, args: &Value) -> Result<ToolResponse> {
    match parse_args(args) {
        Ok(args) => mark_task_complete(ctx.store, args),
        Err(resp) => Ok(resp),
    }
}

fn handle_clear_tasks(ctx: &ToolContext<'_>, _args: &Value) -> Result<ToolResponse> {
    clear_tasks(ctx.store)
}

fn handle_list_tools(ctx: &ToolContext<'_>, _args: &Value) -> Result<ToolResponse> {
    Ok(ToolResponse::ok(ctx.registry.introspection_text()))
}

/// Register the task operations on `registry`.
pub fn register_all(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(
        ToolSpec {
            name: "update_tasks",
            description: "Replace the task list. Every call clears the existing subtasks and \
                          rebuilds them from `todos`. Status can be: pending, in_progress, \
                          complete, blocked, skipped.",
            parameters: vec![
                ("main_task", "Brief description of the overall task (optional)"),
                (
                    "todos",
                    "List of objects with 'content' (task description) and 'status'",
                ),
            ],
        },
        handle_update_tasks,
    )?;
    registry.register(
        ToolSpec {
            name: "clear_tasks",
            description: "Clear all task progress. Use when starting fresh.",
            parameters: Vec::new(),
        },
        handle_clear_tasks,
    )?;
    registry.register(
        ToolSpec {
            name: "update_task_plan",
            description: "Add new tasks or modify existing ones without replacing the plan. \
                          To replace the whole plan, use clear_tasks first.",
            parameters: vec![
                ("add_tasks", "List of new task descriptions to add (strings)"),
                (
                    "modify_tasks",
                    "List of {id, name?, status?, notes?} to modify existing tasks",
                ),
                ("main_task", "Optional: set or update the main task description"),
            ],
        },
        handle_update_task_plan,
    )?;
    registry.register(
        ToolSpec {
            name: "mark_task_complete",
            description: "Mark one task as complete as soon as it is finished. \
                          Identify it by id or by part of its name.",
            parameters: vec![
                ("task_id", "The task id (e.g. 't1') or text matching the task name"),
                ("notes", "Optional notes about what was accomplished"),
                ("files_modified", "Optional list of files created or modified"),
            ],
        },
        handle_mark_task_complete,
    )?;
    registry.register(
        ToolSpec {
            name: "list_tools",
            description: "List the available tools with their parameters.",
            parameters: Vec::new(),
        },
        handle_list_tools,
    )?;
    Ok(())
}

/// A registry holding the task operations.
pub fn task_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> ProgressStore {
        ProgressStore::new(dir.path().join(".task-progress.json"))
    }

    fn todos(items: &[(&str, &str)]) -> UpdateTasksArgs {
        UpdateTasksArgs {
            main_task: Some("Compare vendors".into()),
            todos: items
                .iter()
                .map(|(c, s)| TodoItem {
                    content: c.to_string(),
                    status: Some(json!(s)),
                })
                .collect(),
        }
    }

    fn plan(value: Value) -> UpdateTaskPlanArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn full_replace_rebuilds_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let resp = update_tasks(
            &store,
            todos(&[("A", "complete"), ("B", "in_progress"), ("C", "bogus")]),
        )
        .unwrap();
        assert_eq!(resp.text, "Tasks updated: 1 complete, 1 in progress, 1 pending");
        assert!(!resp.is_error);

        let p = store.load().unwrap();
        assert_eq!(p.subtask_ids(), vec!["t1", "t2", "t3"]);
        assert_eq!(p.get_subtask("t3").unwrap().status, Status::Pending);
        assert!(p.get_subtask("t2").unwrap().started_at.is_some());

        update_tasks(&store, todos(&[("Only", "pending")])).unwrap();
        let p = store.load().unwrap();
        assert_eq!(p.subtask_ids(), vec!["t1"]);
        assert_eq!(p.get_subtask("t1").unwrap().name, "Only");
    }

    #[test]
    fn full_replace_treats_non_string_status_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let registry = task_registry().unwrap();
        let resp = registry
            .dispatch(
                &store,
                "update_tasks",
                &json!({"todos": [
                    {"content": "A", "status": 3},
                    {"content": "B", "status": "complete"}
                ]}),
            )
            .unwrap();
        assert!(!resp.is_error, "{}", resp.text);
        assert_eq!(resp.text, "Tasks updated: 1 complete, 0 in progress, 1 pending");

        let p = store.load().unwrap();
        assert_eq!(p.subtask_ids(), vec!["t1", "t2"]);
        assert_eq!(p.get_subtask("t1").unwrap().status, Status::Pending);
        assert_eq!(p.get_subtask("t2").unwrap().status, Status::Complete);
    }

    #[test]
    fn full_replace_completes_main() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_tasks(&store, todos(&[("A", "complete"), ("B", "skipped")])).unwrap();
        let p = store.load().unwrap();
        assert_eq!(p.main_task.unwrap().status, Status::Complete);
    }

    #[test]
    fn additive_allocates_first_free_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .transact(|p| {
                p.add_subtask("t1", "A", "", vec![])?;
                p.add_subtask("t3", "C", "", vec![])?;
                Ok(())
            })
            .unwrap();
        let resp = update_task_plan(&store, plan(json!({"add_tasks": ["B", "D"]}))).unwrap();
        assert_eq!(
            resp.text,
            "Task plan updated (2 changes):\n  - Added [t2]: B\n  - Added [t4]: D"
        );
        assert_eq!(store.load().unwrap().subtask_ids(), vec!["t1", "t3", "t2", "t4"]);
    }

    #[test]
    fn additive_skips_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let resp = update_task_plan(
            &store,
            plan(json!({
                "add_tasks": [42, "  ", null, "  Real task  "],
                "modify_tasks": ["nope", {"id": "t9", "status": "complete"}, {"name": "no id"}]
            })),
        )
        .unwrap();
        assert_eq!(resp.text, "Task plan updated (1 changes):\n  - Added [t1]: Real task");
        assert_eq!(store.load().unwrap().get_subtask("t1").unwrap().name, "Real task");
    }

    #[test]
    fn additive_modifications() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_task_plan(&store, plan(json!({"main_task": "M", "add_tasks": ["A", "B"]}))).unwrap();

        let resp = update_task_plan(
            &store,
            plan(json!({"modify_tasks": [
                {"id": "t1", "name": "A2", "status": "in_progress", "notes": "halfway"},
                {"id": "t2", "notes": "later"},
                {"id": "t2", "status": "finished"}
            ]})),
        )
        .unwrap();
        assert!(resp.text.contains("Modified [t1]: name, status=in_progress"));
        assert!(resp.text.contains("Modified [t2]: notes"));
        assert!(resp.text.contains("Ignored [t2]: invalid status 'finished'"));

        let p = store.load().unwrap();
        let t1 = p.get_subtask("t1").unwrap();
        assert_eq!(t1.name, "A2");
        assert_eq!(t1.status, Status::InProgress);
        assert_eq!(t1.notes, "halfway");
        let t2 = p.get_subtask("t2").unwrap();
        assert_eq!(t2.status, Status::Pending);
        assert_eq!(t2.notes, "later");
        let updated = p
            .audit_log()
            .iter()
            .filter(|e| e.action == AuditAction::Updated)
            .count();
        assert_eq!(updated, 2);
    }

    #[test]
    fn additive_auto_completes_main() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_task_plan(&store, plan(json!({"main_task": "M", "add_tasks": ["A"]}))).unwrap();
        let resp = update_task_plan(
            &store,
            plan(json!({"modify_tasks": [{"id": "t1", "status": "complete"}]})),
        )
        .unwrap();
        assert!(resp
            .text
            .ends_with("  - All tasks complete - marked main task done"));
        assert_eq!(store.load().unwrap().main_task.unwrap().status, Status::Complete);
    }

    #[test]
    fn additive_without_changes_does_not_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let resp = update_task_plan(&store, UpdateTaskPlanArgs::default()).unwrap();
        assert_eq!(resp.text, "No changes made. Provide add_tasks or modify_tasks.");
        assert!(!store.path().exists());
    }

    #[test]
    fn ignored_status_alone_does_not_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_task_plan(&store, plan(json!({"main_task": "M", "add_tasks": ["A"]}))).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let resp = update_task_plan(
            &store,
            plan(json!({"modify_tasks": [
                {"id": "t1", "status": "finished"},
                {"id": "t1", "status": 7}
            ]})),
        )
        .unwrap();
        assert!(resp.text.starts_with("No changes made."), "{}", resp.text);
        assert!(resp.text.contains("Ignored [t1]: invalid status 'finished'"));
        assert!(resp.text.contains("Ignored [t1]: invalid status '7'"));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn change_summary_truncates_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let long = "x".repeat(60);
        let resp = update_task_plan(
            &store,
            plan(json!({"main_task": &long, "add_tasks": [&long]})),
        )
        .unwrap();
        assert!(resp
            .text
            .contains(&format!("Set main task: {}...", "x".repeat(50))));
        assert!(resp
            .text
            .contains(&format!("Added [t1]: {}...", "x".repeat(40))));
    }

    #[test]
    fn mark_complete_by_id_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_tasks(
            &store,
            todos(&[("Research DocuSign", "pending"), ("Research Adobe", "pending")]),
        )
        .unwrap();

        let resp = mark_task_complete(
            &store,
            MarkCompleteArgs {
                task_id: Some("adobe".into()),
                notes: Some("found pricing".into()),
                files_modified: vec!["adobe.md".into()],
            },
        )
        .unwrap();
        assert_eq!(resp.text, "Marked 'Research Adobe' as complete. 1 task(s) remaining.");
        let p = store.load().unwrap();
        let t2 = p.get_subtask("t2").unwrap();
        assert_eq!(t2.notes, "found pricing");
        assert_eq!(t2.files_modified, vec!["adobe.md"]);

        let resp = mark_task_complete(
            &store,
            MarkCompleteArgs {
                task_id: Some("t1".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(resp.text, "Marked 'Research DocuSign' as complete. All tasks complete!");
        assert_eq!(store.load().unwrap().main_task.unwrap().status, Status::Complete);
    }

    #[test]
    fn name_match_takes_first_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_tasks(&store, todos(&[("Research A", "pending"), ("Research B", "pending")]))
            .unwrap();
        let p = store.load().unwrap();
        assert_eq!(resolve_subtask(&p, "RESEARCH").as_deref(), Some("t1"));
        assert_eq!(resolve_subtask(&p, "t2").as_deref(), Some("t2"));
        assert_eq!(resolve_subtask(&p, "zzz"), None);
    }

    #[test]
    fn mark_complete_already_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_tasks(&store, todos(&[("A", "complete"), ("B", "pending")])).unwrap();
        let before = store.load().unwrap().audit_log().len();
        let resp = mark_task_complete(
            &store,
            MarkCompleteArgs {
                task_id: Some("t1".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(resp.text, "Task 'A' is already complete.");
        assert!(!resp.is_error);
        assert_eq!(store.load().unwrap().audit_log().len(), before);
    }

    #[test]
    fn mark_complete_unknown_lists_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_tasks(&store, todos(&[("A", "pending"), ("B", "pending")])).unwrap();
        let before = store.load().unwrap();
        let resp = mark_task_complete(
            &store,
            MarkCompleteArgs {
                task_id: Some("nonexistent".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(resp.is_error);
        assert_eq!(resp.text, "Task not found: 'nonexistent'. Available: [t1, t2]");
        assert_eq!(store.load().unwrap(), before);
    }

    #[test]
    fn mark_complete_requires_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let resp = mark_task_complete(&store, MarkCompleteArgs::default()).unwrap();
        assert!(resp.is_error);
        assert_eq!(resp.text, "Error: task_id is required");
        assert!(!store.path().exists());
    }

    #[test]
    fn clear_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        update_tasks(&store, todos(&[("A", "pending")])).unwrap();
        let resp = clear_tasks(&store).unwrap();
        assert_eq!(resp.text, "Task progress cleared.");
        assert!(!store.path().exists());
        assert!(store.load().unwrap().main_task.is_none());
    }

    #[test]
    fn registry_dispatches_json_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let registry = task_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "update_tasks",
                "clear_tasks",
                "update_task_plan",
                "mark_task_complete",
                "list_tools"
            ]
        );

        let resp = registry
            .dispatch(
                &store,
                "update_tasks",
                &json!({"todos": [{"content": "A", "status": "complete"}]}),
            )
            .unwrap();
        assert_eq!(resp.text, "Tasks updated: 1 complete, 0 in progress, 0 pending");

        let resp = registry
            .dispatch(&store, "update_tasks", &json!({"todos": "not a list"}))
            .unwrap();
        assert!(resp.is_error);
        assert!(resp.text.starts_with("Error: invalid arguments"));

        let resp = registry.dispatch(&store, "list_tools", &Value::Null).unwrap();
        assert!(resp.text.contains("## mark_task_complete"));
    }
}
