//! Rendering of a finished run for the terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::CheckStatus;
use crate::run_state::{CheckState, RunState};

/// JSON form of a run's final state.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub finished_at: DateTime<Utc>,
    pub checks: Vec<CheckReport<'a>>,
    pub summary: &'a str,
    pub todo: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    pub id: &'a str,
    pub name: &'a str,
    #[serde(flatten)]
    pub state: &'a CheckState,
}

impl<'a> RunReport<'a> {
    pub fn from_state(state: &'a RunState) -> Self {
        Self {
            finished_at: Utc::now(),
            checks: state
                .entries()
                .map(|(check, check_state)| CheckReport {
                    id: &check.id,
                    name: &check.name,
                    state: check_state,
                })
                .collect(),
            summary: state.summary(),
            todo: state.todo(),
            error: state.error(),
        }
    }
}

fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Idle => "[    ]",
        CheckStatus::Processing => "[ .. ]",
        CheckStatus::Pass => "[PASS]",
        CheckStatus::Fail => "[FAIL]",
        CheckStatus::Warning => "[WARN]",
    }
}

/// Plain-text report: one line per check, then summary, todo items and error.
pub fn render_text(state: &RunState) -> String {
    let mut out = String::new();

    for (check, check_state) in state.entries() {
        out.push_str(&format!("{} {}\n", status_label(check_state.status), check.name));
        if let Some(summary) = check_state.summary.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("       {}\n", summary));
        }
    }

    if !state.summary().is_empty() {
        out.push_str(&format!("\nSummary:\n  {}\n", state.summary()));
    }

    if !state.todo().is_empty() {
        out.push_str("\nTo do:\n");
        for (index, item) in state.todo().iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", index + 1, item));
        }
    }

    if let Some(error) = state.error() {
        out.push_str(&format!("\nError: {}\n", error));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Check, ResultRecord};

    fn sample_state() -> RunState {
        let checks = vec![
            Check {
                id: "c1".into(),
                name: "Effective date".into(),
                description: String::new(),
                prompt: String::new(),
            },
            Check {
                id: "c2".into(),
                name: "Form numbers".into(),
                description: String::new(),
                prompt: String::new(),
            },
        ];
        let mut state = RunState::new(checks);
        let run = state.begin_run();
        state.apply(
            run,
            ResultRecord::Verdict {
                id: "c1".into(),
                status: CheckStatus::Pass,
                summary: Some("Stated on page 1".into()),
            },
        );
        state.apply(run, ResultRecord::Summary("Mostly complete".into()));
        state.apply(run, ResultRecord::Todo(vec!["Number form B".into()]));
        state.finish_run(run, None);
        state
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&sample_state());
        assert_eq!(
            text,
            "[PASS] Effective date\n       Stated on page 1\n[ .. ] Form numbers\n\nSummary:\n  Mostly complete\n\nTo do:\n  1. Number form B\n"
        );
    }

    #[test]
    fn test_json_report() {
        let state = sample_state();
        let value = serde_json::to_value(RunReport::from_state(&state)).unwrap();
        assert_eq!(value["checks"][0]["id"], "c1");
        assert_eq!(value["checks"][0]["status"], "pass");
        assert_eq!(value["checks"][1]["status"], "processing");
        assert!(value["checks"][1].get("summary").is_none());
        assert_eq!(value["todo"][0], "Number form B");
        assert!(value.get("error").is_none());
    }
}
