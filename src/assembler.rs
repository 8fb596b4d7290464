//! Prompt assembly for a compliance run.
//!
//! Turns the checklist and the uploaded files into the single user message
//! sent upstream, alongside the fixed system instruction.

use crate::domain::{Check, EncodedFile};

/// Separator line between file blocks.
const FILE_SEPARATOR: &str = "----";

/// System instruction sent with every run.
///
/// The model is told to answer with newline-delimited JSON in three shapes,
/// which is what the result demultiplexer expects to read back.
pub const SYSTEM_PROMPT: &str = "\
You are a SERFF compliance analyzer for New Jersey insurance filings. Your task is to analyze uploaded documents and perform specific compliance checks.

RESPONSE FORMAT:
You must return newline-delimited JSON objects in this exact order:
1. One JSON object for each check: {\"check\": {\"id\": \"check-id\", \"status\": \"pass|fail|warning\", \"summary\": \"brief explanation\"}}
2. One summary JSON: {\"summary\": \"overall assessment text\"}
3. One todo JSON: {\"todo\": [\"action item 1\", \"action item 2\"]}

INSTRUCTIONS:
- Process each check one by one independently
- Focus absolutely on that single check every time
- Status must be exactly: \"pass\", \"fail\", or \"warning\"
- Keep summaries brief and actionable";

/// Build the user message carrying the checks and the files.
pub fn build_user_message(
    checks: &[Check],
    files: &[EncodedFile],
) -> Result<String, serde_json::Error> {
    let checks_block = serde_json::to_string_pretty(checks)?;
    let files_block = files
        .iter()
        .map(file_block)
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "CHECKS TO PERFORM:\n{checks_block}\n\nUPLOADED FILES:\n{files_block}\n{FILE_SEPARATOR}"
    ))
}

fn file_block(file: &EncodedFile) -> String {
    [
        FILE_SEPARATOR.to_string(),
        format!("NAME: {}", file.name),
        format!("MIME_TYPE: {}", file.effective_mime_type()),
        format!("CONTENT_BASE64: {}", file.content),
    ]
    .join("\n")
}
