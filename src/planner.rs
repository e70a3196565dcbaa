//! Rule-based detection of requests that deserve an up-front task plan.
//!
//! Each signal is evaluated independently and contributes human-readable
//! reasons; a request is planned if any signal fires. There is no weighting.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use anyhow::Result;
use log::info;
use regex::Regex;
use serde::Serialize;

use crate::model::{Priority, Status};
use crate::output::truncate;
use crate::progress::TASK_ID_PREFIX;
use crate::store::ProgressStore;

pub const DEFAULT_MIN_PROMPT_LENGTH: usize = 100;

/// Longest main-task description derived from a request.
pub const MAIN_TASK_MAX_CHARS: usize = 100;

const EXPLICIT_PLAN_PHRASES: &[&str] = &[
    "create a plan",
    "break down",
    "step by step",
    "multiple steps",
    "list of tasks",
    "in order to",
];

const SEQUENCE_WORDS: &[&str] = &["first", "then", "next", "finally", "after", "before", "step"];

const ACTION_VERBS: &[&str] = &[
    "analyze",
    "compare",
    "research",
    "create",
    "generate",
    "build",
    "write",
    "summarize",
    "investigate",
    "review",
    "evaluate",
    "assess",
    "examine",
];

static ENUMERATION: OnceLock<Regex> = OnceLock::new();

fn enumeration_regex() -> &'static Regex {
    ENUMERATION.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:\d+[.)]|\*|-)\s+").expect("ENUMERATION regex should be valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanningAnalysis {
    pub should_plan: bool,
    pub reasons: Vec<String>,
    pub suggested_subtask_names: Vec<String>,
}

impl PlanningAnalysis {
    pub fn reason(&self) -> String {
        if self.reasons.is_empty() {
            "simple request".to_string()
        } else {
            self.reasons.join("; ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// No signal fired; storage was not touched.
    Skipped,
    Planned {
        main_task_set: bool,
        added: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct PlanningHeuristic {
    min_prompt_length: usize,
}

impl Default for PlanningHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PROMPT_LENGTH)
    }
}

/// Words are maximal runs of alphanumeric characters.
fn word_set(text: &str) -> HashSet<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl PlanningHeuristic {
    pub fn new(min_prompt_length: usize) -> Self {
        PlanningHeuristic { min_prompt_length }
    }

    pub fn analyze(&self, text: &str) -> PlanningAnalysis {
        let lower = text.to_lowercase();
        let words = word_set(&lower);
        let mut reasons = Vec::new();
        let mut suggested = Vec::new();

        for phrase in EXPLICIT_PLAN_PHRASES {
            if lower.contains(phrase) {
                reasons.push(format!("explicit planning request: '{phrase}'"));
            }
        }

        if enumeration_regex().is_match(text) {
            reasons.push("contains enumerated items".to_string());
        }

        let sequence: BTreeSet<&str> = SEQUENCE_WORDS
            .iter()
            .copied()
            .filter(|w| words.contains(w))
            .collect();
        if sequence.len() >= 2 {
            let list: Vec<&str> = sequence.into_iter().collect();
            reasons.push(format!("sequence words: {}", list.join(", ")));
        }

        let verbs: BTreeSet<&str> = ACTION_VERBS
            .iter()
            .copied()
            .filter(|w| words.contains(w))
            .collect();
        if verbs.len() >= 2 {
            let list: Vec<&str> = verbs.iter().copied().collect();
            reasons.push(format!("multiple actions: {}", list.join(", ")));
            suggested.extend(verbs.iter().map(|v| format!("{} task", capitalize(v))));
        }

        if lower.contains(" vs ") || lower.contains(" versus ") {
            reasons.push("comparison request (vs)".to_string());
        } else if lower.contains("compare") && lower.contains(" to ") {
            reasons.push("comparison request (compare...to)".to_string());
        }

        if text.chars().count() > self.min_prompt_length && text.contains(',') {
            let clauses = lower.matches(',').count() + lower.matches(" and ").count();
            if clauses >= 2 {
                reasons.push("long prompt with multiple clauses".to_string());
            }
        }

        PlanningAnalysis {
            should_plan: !reasons.is_empty(),
            reasons,
            suggested_subtask_names: suggested,
        }
    }

    /// Seed a plan for `text` if it warrants one.
    ///
    /// With `preserve_existing`, an existing main task is left alone;
    /// otherwise it is replaced. Suggested subtasks are appended with ids
    /// continuing from the current subtask count.
    pub fn execute(
        &self,
        store: &ProgressStore,
        text: &str,
        preserve_existing: bool,
    ) -> Result<PlanOutcome> {
        let analysis = self.analyze(text);
        if !analysis.should_plan {
            return Ok(PlanOutcome::Skipped);
        }
        info!("planning triggered: {}", analysis.reason());

        store.transact(|progress| {
            let main_task_set = !(preserve_existing && progress.main_task.is_some());
            if main_task_set {
                let description = truncate(text, MAIN_TASK_MAX_CHARS);
                progress.set_main_task(&description, Status::InProgress, Priority::Normal, None);
            }

            let mut added = Vec::new();
            let mut next = progress.subtasks().len() + 1;
            for name in &analysis.suggested_subtask_names {
                let id = progress.next_free_id(next);
                progress.add_subtask(&id, name, "", Vec::new())?;
                next = id
                    .strip_prefix(TASK_ID_PREFIX)
                    .and_then(|n| n.parse::<usize>().ok())
                    .map_or(next, |n| n + 1);
                added.push(id);
            }

            Ok(PlanOutcome::Planned {
                main_task_set,
                added,
            })
        })
    }
}
