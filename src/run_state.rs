//! Per-session check state.
//!
//! `RunState` holds one entry per configured check, the overall summary and
//! the todo list. Its keys are fixed when it is created: records naming an
//! unknown check id are dropped rather than added.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Check, CheckStatus, ResultRecord};

/// Identifier of one run within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunId(Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckState {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl CheckState {
    fn idle() -> Self {
        Self {
            status: CheckStatus::Idle,
            summary: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunState {
    checks: Vec<Check>,
    states: HashMap<String, CheckState>,
    summary: String,
    todo: Vec<String>,
    current_run: Option<RunId>,
    running: bool,
    error: Option<String>,
}

impl RunState {
    /// Create state for a checklist with every check idle.
    pub fn new(checks: Vec<Check>) -> Self {
        let states = checks
            .iter()
            .map(|check| (check.id.clone(), CheckState::idle()))
            .collect();
        Self {
            checks,
            states,
            summary: String::new(),
            todo: Vec::new(),
            current_run: None,
            running: false,
            error: None,
        }
    }

    /// Start a new run, superseding any previous one.
    ///
    /// Every check moves to `processing` and the summary, todo list and error
    /// are cleared.
    pub fn begin_run(&mut self) -> RunId {
        if let (true, Some(previous)) = (self.running, self.current_run) {
            debug!("Run {} superseded", previous);
        }

        for state in self.states.values_mut() {
            *state = CheckState {
                status: CheckStatus::Processing,
                summary: None,
            };
        }
        self.summary.clear();
        self.todo.clear();
        self.error = None;
        self.running = true;

        let run = RunId::new();
        self.current_run = Some(run);
        run
    }

    /// Apply one record of `run`. Returns whether the state changed.
    pub fn apply(&mut self, run: RunId, record: ResultRecord) -> bool {
        if self.current_run != Some(run) {
            debug!("Ignoring record from superseded run {}", run);
            return false;
        }

        match record {
            ResultRecord::Verdict {
                id,
                status,
                summary,
            } => match self.states.get_mut(&id) {
                Some(state) => {
                    let next = CheckState { status, summary };
                    let changed = *state != next;
                    *state = next;
                    changed
                }
                None => {
                    warn!("Ignoring verdict for unknown check {:?}", id);
                    false
                }
            },
            ResultRecord::Summary(summary) => {
                let changed = self.summary != summary;
                self.summary = summary;
                changed
            }
            ResultRecord::Todo(items) => {
                let changed = self.todo != items;
                self.todo = items;
                changed
            }
        }
    }

    /// Mark `run` as finished, keeping whatever states it reached.
    pub fn finish_run(&mut self, run: RunId, error: Option<String>) {
        if self.current_run != Some(run) {
            return;
        }
        self.running = false;
        self.error = error;
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    #[allow(dead_code)]
    pub fn check_state(&self, id: &str) -> Option<&CheckState> {
        self.states.get(id)
    }

    /// Checks with their states, in checklist order.
    pub fn entries(&self) -> impl Iterator<Item = (&Check, &CheckState)> {
        self.checks
            .iter()
            .filter_map(|check| self.states.get(&check.id).map(|state| (check, state)))
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn todo(&self) -> &[String] {
        &self.todo
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checks(ids: &[&str]) -> Vec<Check> {
        ids.iter()
            .map(|id| Check {
                id: id.to_string(),
                name: id.to_uppercase(),
                description: String::new(),
                prompt: String::new(),
            })
            .collect()
    }

    fn verdict(id: &str, status: CheckStatus, summary: &str) -> ResultRecord {
        ResultRecord::Verdict {
            id: id.to_string(),
            status,
            summary: Some(summary.to_string()),
        }
    }

    #[test]
    fn test_new_state_is_idle_for_every_check() {
        let state = RunState::new(checks(&["c1", "c2"]));
        assert_eq!(state.entries().count(), 2);
        assert!(state
            .entries()
            .all(|(_, s)| s.status == CheckStatus::Idle));
        assert!(!state.is_running());
    }

    #[test]
    fn test_begin_run_marks_all_processing() {
        let mut state = RunState::new(checks(&["c1", "c2"]));
        let run = state.begin_run();
        state.apply(run, ResultRecord::Summary("old".to_string()));
        state.finish_run(run, None);

        state.begin_run();
        assert!(state.is_running());
        assert_eq!(state.summary(), "");
        assert!(state
            .entries()
            .all(|(_, s)| s.status == CheckStatus::Processing));
    }

    #[test]
    fn test_apply_verdict_is_idempotent() {
        let mut state = RunState::new(checks(&["c1"]));
        let run = state.begin_run();

        assert!(state.apply(run, verdict("c1", CheckStatus::Pass, "ok")));
        let once = state.check_state("c1").cloned();
        assert!(!state.apply(run, verdict("c1", CheckStatus::Pass, "ok")));
        assert_eq!(state.check_state("c1").cloned(), once);
        assert_eq!(
            once,
            Some(CheckState {
                status: CheckStatus::Pass,
                summary: Some("ok".to_string()),
            })
        );
    }

    #[test]
    fn test_unknown_check_id_is_ignored() {
        let mut state = RunState::new(checks(&["c1"]));
        let run = state.begin_run();
        assert!(!state.apply(run, verdict("zz", CheckStatus::Fail, "?")));
        assert!(state.check_state("zz").is_none());
        assert_eq!(state.entries().count(), 1);
    }

    #[test]
    fn test_superseded_run_records_are_ignored() {
        let mut state = RunState::new(checks(&["c1"]));
        let first = state.begin_run();
        let second = state.begin_run();

        assert!(!state.apply(first, verdict("c1", CheckStatus::Fail, "late")));
        state.finish_run(first, Some("aborted".to_string()));
        assert!(state.is_running());
        assert_eq!(state.error(), None);

        assert!(state.apply(second, verdict("c1", CheckStatus::Pass, "ok")));
        state.finish_run(second, None);
        assert!(!state.is_running());
    }

    #[test]
    fn test_failed_run_keeps_partial_states() {
        let mut state = RunState::new(checks(&["c1", "c2"]));
        let run = state.begin_run();
        state.apply(run, verdict("c1", CheckStatus::Fail, "missing"));
        state.finish_run(run, Some("stream broke".to_string()));

        assert!(!state.is_running());
        assert_eq!(state.error(), Some("stream broke"));
        assert_eq!(state.check_state("c1").unwrap().status, CheckStatus::Fail);
        assert_eq!(
            state.check_state("c2").unwrap().status,
            CheckStatus::Processing
        );
    }

    #[test]
    fn test_todo_replaced_wholesale() {
        let mut state = RunState::new(checks(&[]));
        let run = state.begin_run();
        state.apply(run, ResultRecord::Todo(vec!["a".into(), "b".into()]));
        state.apply(run, ResultRecord::Todo(vec!["c".into()]));
        assert_eq!(state.todo(), ["c".to_string()]);
    }
}
