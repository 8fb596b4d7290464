//! Static checklist definitions.
//!
//! The checklist is loaded once at startup, either from a JSON file given on
//! the command line or from the built-in default list, and never changes for
//! the lifetime of the process.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::domain::Check;

/// Built-in checklist used when no `--checks` file is given.
const DEFAULT_CHECKS_JSON: &str = include_str!("default_checks.json");

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("failed to read checklist {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse checklist: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("check at position {0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate check id: {0}")]
    DuplicateId(String),
}

/// Parse a checklist from JSON text and validate its ids.
pub fn parse_checklist(raw: &str) -> Result<Vec<Check>, ChecklistError> {
    let checks: Vec<Check> = serde_json::from_str(raw)?;
    validate(&checks)?;
    Ok(checks)
}

/// Load the checklist from `path`, or the built-in list when `path` is `None`.
pub fn load_checklist(path: Option<&Path>) -> Result<Vec<Check>, ChecklistError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ChecklistError::Read {
                path: path.display().to_string(),
                source,
            })?;
            let checks = parse_checklist(&raw)?;
            debug!("Loaded {} checks from {}", checks.len(), path.display());
            Ok(checks)
        }
        None => default_checklist(),
    }
}

pub fn default_checklist() -> Result<Vec<Check>, ChecklistError> {
    parse_checklist(DEFAULT_CHECKS_JSON)
}

fn validate(checks: &[Check]) -> Result<(), ChecklistError> {
    let mut seen = HashSet::new();
    for (index, check) in checks.iter().enumerate() {
        if check.id.trim().is_empty() {
            return Err(ChecklistError::EmptyId(index));
        }
        if !seen.insert(check.id.as_str()) {
            return Err(ChecklistError::DuplicateId(check.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_checklist_is_valid() {
        let checks = default_checklist().unwrap();
        assert!(!checks.is_empty());
        assert!(checks.iter().all(|c| !c.prompt.is_empty()));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let raw = r#"[
            {"id":"a","name":"A","description":"","prompt":""},
            {"id":"a","name":"B","description":"","prompt":""}
        ]"#;
        let err = parse_checklist(raw).unwrap_err();
        assert!(matches!(err, ChecklistError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_empty_id_rejected() {
        let raw = r#"[{"id":" ","name":"A","description":"","prompt":""}]"#;
        assert!(matches!(
            parse_checklist(raw).unwrap_err(),
            ChecklistError::EmptyId(0)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"c1","name":"One","description":"d","prompt":"p"}}]"#
        )
        .unwrap();

        let checks = load_checklist(Some(file.path())).unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].id, "c1");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_checklist(Some(Path::new("/nonexistent/checks.json"))).unwrap_err();
        assert!(matches!(err, ChecklistError::Read { .. }));
    }
}
