//! The task graph: one main task, a keyed set of subtasks with dependency
//! edges, free-form context notes and the audit log of every mutation.
//!
//! Any status may follow any other. `started_at` is set the first time a
//! subtask enters `in_progress` and `completed_at` the first time it enters
//! `complete`; neither is overwritten afterwards.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::audit::{AuditAction, AuditLog, MAIN_TASK_ID};
use crate::error::TaskError;
use crate::model::{Blocker, Context, Decision, MainTask, Priority, Status, Subtask, Timestamp};

/// Prefix of ids allocated by the tool-facing operations (`t1`, `t2`, ...).
pub const TASK_ID_PREFIX: &str = "t";

#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub session_id: Option<String>,
    pub main_task: Option<MainTask>,
    pub context: Context,
    subtasks: Vec<Subtask>,
    audit_log: AuditLog,
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskProgress {
    pub fn new() -> Self {
        let now = Utc::now();
        TaskProgress {
            created_at: now,
            updated_at: now,
            session_id: None,
            main_task: None,
            context: Context::default(),
            subtasks: Vec::new(),
            audit_log: AuditLog::new(),
        }
    }

    /// Rebuild an aggregate from persisted parts. A repeated subtask id keeps
    /// the position of its first occurrence and the content of its last.
    pub(crate) fn from_parts(
        created_at: Timestamp,
        updated_at: Timestamp,
        session_id: Option<String>,
        main_task: Option<MainTask>,
        subtasks: Vec<Subtask>,
        context: Context,
        audit_log: AuditLog,
    ) -> Self {
        let mut deduped: Vec<Subtask> = Vec::with_capacity(subtasks.len());
        for sub in subtasks {
            match deduped.iter_mut().find(|s| s.id == sub.id) {
                Some(existing) => *existing = sub,
                None => deduped.push(sub),
            }
        }
        TaskProgress {
            created_at,
            updated_at,
            session_id,
            main_task,
            context,
            subtasks: deduped,
            audit_log,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn get_subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    fn subtask_mut(&mut self, id: &str) -> Result<&mut Subtask, TaskError> {
        self.subtasks
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_subtask(id).is_some()
    }

    pub fn subtask_ids(&self) -> Vec<&str> {
        self.subtasks.iter().map(|s| s.id.as_str()).collect()
    }

    /// Replace the main task.
    pub fn set_main_task(
        &mut self,
        description: &str,
        status: Status,
        priority: Priority,
        estimated_subtasks: Option<u32>,
    ) {
        self.main_task = Some(MainTask {
            description: description.to_string(),
            status,
            priority,
            estimated_subtasks,
        });
        self.audit_log.record(
            MAIN_TASK_ID,
            AuditAction::Created,
            None,
            Some(status),
            Some(description.to_string()),
        );
        self.touch();
    }

    /// Add a pending subtask. Dependencies are not checked: an id that never
    /// exists simply keeps the subtask out of `get_available`.
    pub fn add_subtask(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        dependencies: Vec<String>,
    ) -> Result<&Subtask, TaskError> {
        if self.contains(id) {
            return Err(TaskError::DuplicateId(id.to_string()));
        }
        self.subtasks
            .push(Subtask::new(id, name, description, dependencies));
        self.audit_log.record(
            id,
            AuditAction::Created,
            None,
            Some(Status::Pending),
            Some(name.to_string()),
        );
        self.touch();
        Ok(&self.subtasks[self.subtasks.len() - 1])
    }

    /// Set a subtask's status and return the status it had before.
    ///
    /// Non-empty `notes` replace the existing notes; `files_modified` are
    /// appended.
    pub fn update_status(
        &mut self,
        id: &str,
        status: Status,
        notes: Option<&str>,
        files_modified: Option<&[String]>,
    ) -> Result<Status, TaskError> {
        let now = Utc::now();
        let sub = self.subtask_mut(id)?;
        let previous = sub.status;
        sub.status = status;

        if status == Status::InProgress && sub.started_at.is_none() {
            sub.started_at = Some(now);
        }
        if status == Status::Complete && sub.completed_at.is_none() {
            sub.completed_at = Some(now);
        }
        if let Some(n) = notes.filter(|n| !n.is_empty()) {
            sub.notes = n.to_string();
        }
        if let Some(files) = files_modified {
            sub.files_modified.extend(files.iter().cloned());
        }

        self.audit_log.record(
            id,
            AuditAction::StatusChange,
            Some(previous),
            Some(status),
            None,
        );
        self.touch();
        Ok(previous)
    }

    /// Rename a subtask and/or replace its notes without touching its status.
    /// Returns the names of the fields that changed; nothing is recorded when
    /// the list is empty.
    pub fn edit_subtask(
        &mut self,
        id: &str,
        name: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Vec<&'static str>, TaskError> {
        let sub = self.subtask_mut(id)?;
        let mut edited = Vec::new();
        if let Some(n) = name.filter(|n| !n.is_empty()) {
            sub.name = n.to_string();
            edited.push("name");
        }
        if let Some(n) = notes.filter(|n| !n.is_empty()) {
            sub.notes = n.to_string();
            edited.push("notes");
        }
        if !edited.is_empty() {
            self.audit_log.record(
                id,
                AuditAction::Updated,
                None,
                None,
                Some(edited.join(", ")),
            );
            self.touch();
        }
        Ok(edited)
    }

    /// Drop every subtask. The audit log keeps the history of what was removed.
    pub fn clear_subtasks(&mut self) {
        if self.subtasks.is_empty() {
            return;
        }
        let removed = self.subtasks.len();
        self.subtasks.clear();
        self.audit_log.record(
            MAIN_TASK_ID,
            AuditAction::Updated,
            None,
            None,
            Some(format!("cleared {removed} subtask(s)")),
        );
        self.touch();
    }

    fn dependency_met(&self, dep_id: &str) -> bool {
        self.get_subtask(dep_id)
            .is_some_and(|dep| dep.status == Status::Complete)
    }

    /// Pending subtasks whose dependencies all exist and are complete.
    pub fn get_available(&self) -> Vec<&Subtask> {
        self.subtasks
            .iter()
            .filter(|s| s.status == Status::Pending)
            .filter(|s| s.dependencies.iter().all(|d| self.dependency_met(d)))
            .collect()
    }

    pub fn get_incomplete(&self) -> Vec<&Subtask> {
        self.subtasks
            .iter()
            .filter(|s| !s.status.is_finished())
            .collect()
    }

    /// Dependencies of `id` that are not yet satisfied, including ids that
    /// name no subtask at all.
    pub fn unmet_dependencies(&self, id: &str) -> Vec<&str> {
        match self.get_subtask(id) {
            Some(sub) => sub
                .dependencies
                .iter()
                .filter(|d| !self.dependency_met(d))
                .map(String::as_str)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Subtasks that list `id` among their dependencies.
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.subtasks
            .iter()
            .filter(|s| s.dependencies.iter().any(|d| d == id))
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        if self.subtasks.is_empty() {
            return self
                .main_task
                .as_ref()
                .is_none_or(|m| m.status == Status::Complete);
        }
        self.subtasks.iter().all(|s| s.status.is_finished())
    }

    /// Mark the main task complete. Returns false when there is no main task.
    pub fn mark_main_complete(&mut self) -> bool {
        let Some(main) = self.main_task.as_mut() else {
            return false;
        };
        let previous = main.status;
        main.status = Status::Complete;
        self.audit_log.record(
            MAIN_TASK_ID,
            AuditAction::StatusChange,
            Some(previous),
            Some(Status::Complete),
            None,
        );
        self.touch();
        true
    }

    pub fn add_decision(&mut self, decision: &str) {
        self.context.key_decisions.push(Decision {
            timestamp: Utc::now(),
            decision: decision.to_string(),
        });
        self.touch();
    }

    pub fn add_blocker(&mut self, blocker: &str, resolved: bool) {
        self.context.blockers_encountered.push(Blocker {
            timestamp: Utc::now(),
            blocker: blocker.to_string(),
            resolved,
        });
        self.touch();
    }

    /// First `t<n>` id with `n >= start` that is not in use.
    pub fn next_free_id(&self, start: usize) -> String {
        let mut n = start.max(1);
        loop {
            let id = format!("{TASK_ID_PREFIX}{n}");
            if !self.contains(&id) {
                return id;
            }
            n += 1;
        }
    }

    /// Discard the main task, subtasks, context and audit log.
    pub fn reset(&mut self) {
        self.main_task = None;
        self.subtasks.clear();
        self.audit_log.clear();
        self.context = Context::default();
        self.touch();
    }

    /// Report every dependency cycle among existing subtasks. Each cycle is
    /// listed once, rotated so that it starts at its earliest-inserted member.
    /// Subtasks on a cycle can never become available.
    pub fn dependency_cycles(&self) -> Vec<Vec<String>> {
        let order: HashMap<&str, usize> = self
            .subtasks
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut finished: HashSet<&str> = HashSet::new();

        for root in &self.subtasks {
            if finished.contains(root.id.as_str()) {
                continue;
            }
            let mut path: Vec<&str> = Vec::new();
            self.walk_cycles(
                root.id.as_str(),
                &order,
                &mut path,
                &mut finished,
                &mut seen,
                &mut cycles,
            );
        }
        cycles
    }

    fn walk_cycles<'a>(
        &'a self,
        id: &'a str,
        order: &HashMap<&str, usize>,
        path: &mut Vec<&'a str>,
        finished: &mut HashSet<&'a str>,
        seen: &mut HashSet<Vec<String>>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        if let Some(pos) = path.iter().position(|p| *p == id) {
            let cycle = &path[pos..];
            let start = cycle
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| order.get(*c).copied().unwrap_or(usize::MAX))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let rotated: Vec<String> = cycle[start..]
                .iter()
                .chain(cycle[..start].iter())
                .map(|s| s.to_string())
                .collect();
            if seen.insert(rotated.clone()) {
                cycles.push(rotated);
            }
            return;
        }
        if finished.contains(id) {
            return;
        }
        let Some(sub) = self.get_subtask(id) else {
            return;
        };
        path.push(id);
        for dep in &sub.dependencies {
            if order.contains_key(dep.as_str()) {
                self.walk_cycles(dep.as_str(), order, path, finished, seen, cycles);
            }
        }
        path.pop();
        finished.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(subtasks: &[&Subtask]) -> Vec<String> {
        subtasks.iter().map(|s| s.id.clone()).collect()
    }

    fn deps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn available_respects_dependencies() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t2", "B", "", deps(&["t1"])).unwrap();
        assert_eq!(ids(&p.get_available()), vec!["t1"]);

        p.update_status("t1", Status::Complete, None, None).unwrap();
        assert_eq!(ids(&p.get_available()), vec!["t2"]);
    }

    #[test]
    fn dangling_dependency_is_never_available() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", deps(&["ghost"])).unwrap();
        assert!(p.get_available().is_empty());
        assert_eq!(p.unmet_dependencies("t1"), vec!["ghost"]);
    }

    #[test]
    fn non_pending_subtasks_are_not_available() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t2", "B", "", vec![]).unwrap();
        p.update_status("t2", Status::Blocked, None, None).unwrap();
        assert_eq!(ids(&p.get_available()), vec!["t1"]);
    }

    #[test]
    fn skipped_dependency_does_not_satisfy() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t2", "B", "", deps(&["t1"])).unwrap();
        p.update_status("t1", Status::Skipped, None, None).unwrap();
        assert!(p.get_available().is_empty());
    }

    #[test]
    fn update_unknown_subtask_is_not_found() {
        let mut p = TaskProgress::new();
        let err = p
            .update_status("missing", Status::Complete, None, None)
            .unwrap_err();
        assert_eq!(err, TaskError::NotFound("missing".into()));
        assert!(p.audit_log().is_empty());
    }

    #[test]
    fn duplicate_id_is_rejected_without_audit() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "Original", "", vec![]).unwrap();
        let err = p.add_subtask("t1", "Replacement", "", vec![]).unwrap_err();
        assert_eq!(err, TaskError::DuplicateId("t1".into()));
        assert_eq!(p.get_subtask("t1").unwrap().name, "Original");
        assert_eq!(p.audit_log().len(), 1);
    }

    #[test]
    fn started_at_is_stamped_once() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.update_status("t1", Status::InProgress, None, None).unwrap();
        let first = p.get_subtask("t1").unwrap().started_at;
        assert!(first.is_some());

        p.update_status("t1", Status::Blocked, None, None).unwrap();
        p.update_status("t1", Status::InProgress, None, None).unwrap();
        assert_eq!(p.get_subtask("t1").unwrap().started_at, first);
    }

    #[test]
    fn completed_at_is_stamped_once() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.update_status("t1", Status::Complete, None, None).unwrap();
        let first = p.get_subtask("t1").unwrap().completed_at;
        assert!(first.is_some());

        p.update_status("t1", Status::Pending, None, None).unwrap();
        p.update_status("t1", Status::Complete, None, None).unwrap();
        let sub = p.get_subtask("t1").unwrap();
        assert_eq!(sub.completed_at, first);
        assert!(sub.started_at.is_none());
    }

    #[test]
    fn any_transition_is_allowed() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        for from in Status::ALL {
            for to in Status::ALL {
                p.update_status("t1", from, None, None).unwrap();
                assert_eq!(p.update_status("t1", to, None, None).unwrap(), from);
            }
        }
    }

    #[test]
    fn update_records_notes_and_files() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        let files = vec!["src/a.rs".to_string()];
        p.update_status("t1", Status::InProgress, Some("started"), Some(&files))
            .unwrap();
        let more = vec!["src/b.rs".to_string()];
        p.update_status("t1", Status::Complete, Some(""), Some(&more))
            .unwrap();

        let sub = p.get_subtask("t1").unwrap();
        assert_eq!(sub.notes, "started");
        assert_eq!(sub.files_modified, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn every_mutation_writes_one_audit_entry() {
        let mut p = TaskProgress::new();
        p.set_main_task("Ship it", Status::InProgress, Priority::High, Some(2));
        assert_eq!(p.audit_log().len(), 1);
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        assert_eq!(p.audit_log().len(), 2);
        p.update_status("t1", Status::Complete, None, None).unwrap();
        assert_eq!(p.audit_log().len(), 3);
        p.edit_subtask("t1", Some("A2"), None).unwrap();
        assert_eq!(p.audit_log().len(), 4);
        assert!(p.mark_main_complete());
        assert_eq!(p.audit_log().len(), 5);

        let last = p.audit_log().last().unwrap();
        assert_eq!(last.task_id, MAIN_TASK_ID);
        assert_eq!(last.action, AuditAction::StatusChange);
        assert_eq!(last.from_status, Some(Status::InProgress));
        assert_eq!(last.to_status, Some(Status::Complete));
    }

    #[test]
    fn status_change_entry_records_both_statuses() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.update_status("t1", Status::InProgress, None, None).unwrap();
        let entry = p.audit_log().last().unwrap();
        assert_eq!(entry.task_id, "t1");
        assert_eq!(entry.from_status, Some(Status::Pending));
        assert_eq!(entry.to_status, Some(Status::InProgress));
    }

    #[test]
    fn edit_without_changes_records_nothing() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        let edited = p.edit_subtask("t1", Some(""), None).unwrap();
        assert!(edited.is_empty());
        assert_eq!(p.audit_log().len(), 1);
        assert!(p.edit_subtask("nope", Some("x"), None).is_err());
    }

    #[test]
    fn completion_without_subtasks_follows_main_task() {
        let mut p = TaskProgress::new();
        assert!(p.is_complete());
        p.set_main_task("Goal", Status::InProgress, Priority::Normal, None);
        assert!(!p.is_complete());
        p.mark_main_complete();
        assert!(p.is_complete());
    }

    #[test]
    fn completion_with_subtasks_ignores_main_task() {
        let mut p = TaskProgress::new();
        p.set_main_task("Goal", Status::InProgress, Priority::Normal, None);
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t2", "B", "", vec![]).unwrap();
        assert!(!p.is_complete());
        p.update_status("t1", Status::Complete, None, None).unwrap();
        p.update_status("t2", Status::Skipped, None, None).unwrap();
        assert!(p.is_complete());
        assert!(p.get_incomplete().is_empty());
    }

    #[test]
    fn mark_main_complete_without_main_is_noop() {
        let mut p = TaskProgress::new();
        assert!(!p.mark_main_complete());
        assert!(p.audit_log().is_empty());
    }

    #[test]
    fn incomplete_excludes_complete_and_skipped() {
        let mut p = TaskProgress::new();
        for id in ["t1", "t2", "t3", "t4"] {
            p.add_subtask(id, id, "", vec![]).unwrap();
        }
        p.update_status("t1", Status::Complete, None, None).unwrap();
        p.update_status("t2", Status::Skipped, None, None).unwrap();
        p.update_status("t3", Status::Blocked, None, None).unwrap();
        assert_eq!(ids(&p.get_incomplete()), vec!["t3", "t4"]);
    }

    #[test]
    fn next_free_id_skips_used_slots() {
        let mut p = TaskProgress::new();
        assert_eq!(p.next_free_id(1), "t1");
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t3", "C", "", vec![]).unwrap();
        assert_eq!(p.next_free_id(1), "t2");
        assert_eq!(p.next_free_id(3), "t4");
    }

    #[test]
    fn clear_subtasks_keeps_history() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.clear_subtasks();
        assert!(p.subtasks().is_empty());
        assert_eq!(p.audit_log().len(), 2);
        assert_eq!(p.audit_log().last().unwrap().action, AuditAction::Updated);
    }

    #[test]
    fn reset_discards_everything() {
        let mut p = TaskProgress::new();
        p.set_main_task("Goal", Status::InProgress, Priority::Normal, None);
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_decision("use JSON");
        p.add_blocker("rate limit", false);
        p.reset();
        assert!(p.main_task.is_none());
        assert!(p.subtasks().is_empty());
        assert!(p.audit_log().is_empty());
        assert_eq!(p.context, Context::default());
    }

    #[test]
    fn context_notes_are_appended() {
        let mut p = TaskProgress::new();
        p.add_decision("compare on price");
        p.add_blocker("missing data", true);
        assert_eq!(p.context.key_decisions[0].decision, "compare on price");
        assert!(p.context.blockers_encountered[0].resolved);
        assert!(p.audit_log().is_empty());
    }

    #[test]
    fn dependents_and_unmet() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t2", "B", "", deps(&["t1"])).unwrap();
        p.add_subtask("t3", "C", "", deps(&["t1", "t2"])).unwrap();
        assert_eq!(p.dependents("t1"), vec!["t2", "t3"]);
        p.update_status("t1", Status::Complete, None, None).unwrap();
        assert_eq!(p.unmet_dependencies("t3"), vec!["t2"]);
    }

    #[test]
    fn cycles_are_reported_once() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", deps(&["t3"])).unwrap();
        p.add_subtask("t2", "B", "", deps(&["t1"])).unwrap();
        p.add_subtask("t3", "C", "", deps(&["t2"])).unwrap();
        p.add_subtask("t4", "D", "", deps(&["t4"])).unwrap();
        p.add_subtask("t5", "E", "", deps(&["t1", "ghost"])).unwrap();

        let cycles = p.dependency_cycles();
        assert_eq!(
            cycles,
            vec![
                vec!["t1".to_string(), "t3".to_string(), "t2".to_string()],
                vec!["t4".to_string()],
            ]
        );
        assert!(p.get_available().is_empty());
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let mut p = TaskProgress::new();
        p.add_subtask("t1", "A", "", vec![]).unwrap();
        p.add_subtask("t2", "B", "", deps(&["t1"])).unwrap();
        p.add_subtask("t3", "C", "", deps(&["t1", "t2", "t1"])).unwrap();
        assert!(p.dependency_cycles().is_empty());
    }

    #[test]
    fn from_parts_collapses_duplicate_ids() {
        let now = Utc::now();
        let p = TaskProgress::from_parts(
            now,
            now,
            None,
            None,
            vec![
                Subtask::new("t1", "first", "", vec![]),
                Subtask::new("t2", "other", "", vec![]),
                Subtask::new("t1", "second", "", vec![]),
            ],
            Context::default(),
            AuditLog::new(),
        );
        assert_eq!(p.subtask_ids(), vec!["t1", "t2"]);
        assert_eq!(p.get_subtask("t1").unwrap().name, "second");
    }
}
