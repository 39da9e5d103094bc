// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::edit::{apply_hunk, find_hunk_position, parse_hunks};
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// One file's worth of diff hunks within a `multi_edit` batch.
struct FileEdit {
    path: String,
    diff: String,
}

fn parse_edits(call: &ToolCall) -> Result<Vec<FileEdit>, String> {
    let edits = call
        .args
        .get("edits")
        .and_then(|v| v.as_array())
        .ok_or("missing required parameter: edits (array)")?;
    if edits.is_empty() {
        return Err("edits must contain at least one entry".to_string());
    }
    edits
        .iter()
        .map(|e| {
            let path = e
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or("each edit requires a path")?
                .to_string();
            let diff = e
                .get("diff")
                .and_then(|v| v.as_str())
                .ok_or("each edit requires a diff")?
                .to_string();
            Ok(FileEdit { path, diff })
        })
        .collect()
}

/// Applies a single file's diff in-place. Returns an error string, never
/// leaving a partially-written file behind.
async fn apply_file_edit(edit: &FileEdit) -> Result<(), String> {
    let hunks = parse_hunks(&edit.diff)?;

    let content = tokio::fs::read_to_string(&edit.path)
        .await
        .map_err(|e| format!("read error: {e}"))?;

    let had_trailing_newline = content.ends_with('\n');
    let mut file_lines: Vec<String> = content.lines().map(str::to_string).collect();

    for (idx, hunk) in hunks.iter().enumerate() {
        let search = hunk.search_lines();
        match find_hunk_position(&file_lines, &search, hunk.old_start_hint) {
            Ok((pos, delta)) => {
                file_lines = apply_hunk(&file_lines, hunk, pos, delta);
            }
            Err(e) => {
                let prefix = if hunks.len() > 1 {
                    format!("hunk {}: ", idx + 1)
                } else {
                    String::new()
                };
                return Err(format!("{prefix}{e}"));
            }
        }
    }

    let mut new_content = file_lines.join("\n");
    if had_trailing_newline {
        new_content.push('\n');
    }

    tokio::fs::write(&edit.path, &new_content)
        .await
        .map_err(|e| format!("write failed: {e}"))
}

/// Applies a batch of independent diff edits, one or more files at a time,
/// in the order given. Every edit is validated (parsed + location-resolved)
/// against its own file; a failure on one file does not touch the others,
/// but stops the batch — edits after the failing one are never attempted.
pub struct MultiEditTool;

#[async_trait]
impl Tool for MultiEditTool {
    fn name(&self) -> &str {
        "multi_edit"
    }

    fn description(&self) -> &str {
        "Apply a batch of diff edits across one or more files in a single call.\n\
         \n\
         Each entry in `edits` has the same shape as the `edit` tool's\n\
         arguments: { \"path\": ..., \"diff\": ... } with @@ hunks.\n\
         \n\
         Edits are applied in order. If an edit fails (context not found,\n\
         missing file), the batch stops immediately — edits already applied\n\
         stay applied, and edits after the failure are skipped. The response\n\
         reports exactly how many edits succeeded and where it stopped.\n\
         \n\
         Use this instead of multiple `edit` calls when changes to several\n\
         files are logically one unit of work (e.g. a rename touching three\n\
         call sites)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "edits": {
                    "type": "array",
                    "description": "Ordered list of file edits to apply",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string", "description": "File to edit" },
                            "diff": { "type": "string", "description": "Unified diff hunks to apply" }
                        },
                        "required": ["path", "diff"],
                        "additionalProperties": false
                    },
                    "minItems": 1
                }
            },
            "required": ["edits"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    fn consent(&self, call: &ToolCall) -> Option<String> {
        let paths: Vec<&str> = call
            .args
            .get("edits")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|e| e.get("path").and_then(|p| p.as_str())).collect())
            .unwrap_or_default();
        if paths.is_empty() {
            None
        } else {
            Some(paths.join(", "))
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let edits = match parse_edits(call) {
            Ok(e) => e,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        debug!(count = edits.len(), "multi_edit tool");

        for (i, edit) in edits.iter().enumerate() {
            if let Err(e) = apply_file_edit(edit).await {
                return ToolOutput::err(
                    &call.id,
                    format!(
                        "edit {} of {} failed for {}: {e}\n{} edit(s) applied before the failure.",
                        i + 1,
                        edits.len(),
                        edit.path,
                        i
                    ),
                );
            }
        }

        ToolOutput::ok(&call.id, format!("{} edit(s) successfully applied", edits.len()))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
