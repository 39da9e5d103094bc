// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crush_workspace::{glob_search, IgnoreResolver};

use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const DEFAULT_MAX_RESULTS: usize = 200;

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str { "glob" }

    fn description(&self) -> &str {
        "Search for files matching a doublestar glob pattern recursively under a root \
         directory. Results honor .gitignore/.crushignore and common ignore rules, and are \
         sorted by modification time (newest first).\n\n\
         Right: {\"pattern\": \"**/*.rs\", \"root\": \"/path/to/project\", \"max_results\": 200}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Doublestar glob pattern (e.g. '**/*.rs', '*.toml')"
                },
                "root": {
                    "type": "string",
                    "description": "Root directory to search from (default: current directory)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 200)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy { ApprovalPolicy::Auto }

    fn output_category(&self) -> OutputCategory { OutputCategory::MatchList }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let pattern = match call.args.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'pattern'"),
        };
        let root = call
            .args
            .get("root")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        let max_results = call
            .args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_RESULTS as u64) as usize;

        debug!(pattern = %pattern, root = %root, max_results, "glob tool");

        let root_path = std::path::PathBuf::from(&root);
        let result = tokio::task::spawn_blocking(move || {
            let ignore = IgnoreResolver::new(&root_path);
            glob_search(&root_path, &pattern, &ignore, max_results)
        })
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("glob error: {e}")),
        };

        if result.matches.is_empty() {
            return ToolOutput::ok(&call.id, "(no matches)");
        }

        let mut lines: Vec<String> = result
            .matches
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        if result.truncated {
            lines.push(format!("...[truncated at {max_results} results]"));
        }

        ToolOutput::ok(&call.id, lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "g1".into(), name: "glob".into(), args }
    }

    #[tokio::test]
    async fn finds_toml_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), b"[package]").unwrap();

        let t = GlobTool;
        let out = t.execute(&call(json!({
            "pattern": "*.toml",
            "root": dir.path().to_str().unwrap()
        }))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("Cargo.toml"));
    }

    #[tokio::test]
    async fn finds_with_double_star_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("build").join("release");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("app.bin"), b"\x00\x01\x02").unwrap();

        let t = GlobTool;
        let out = t.execute(&call(json!({
            "pattern": "**/*.bin",
            "root": dir.path().to_str().unwrap()
        }))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("app.bin"), "got: {}", out.content);
    }

    #[tokio::test]
    async fn ignores_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config.rs"), "x").unwrap();
        std::fs::write(dir.path().join("lib.rs"), "x").unwrap();

        let t = GlobTool;
        let out = t.execute(&call(json!({
            "pattern": "**/*.rs",
            "root": dir.path().to_str().unwrap()
        }))).await;
        assert!(out.content.contains("lib.rs"));
        assert!(!out.content.contains(".git"));
    }

    #[tokio::test]
    async fn no_match_returns_no_matches_message() {
        let t = GlobTool;
        let out = t.execute(&call(json!({
            "pattern": "*.xyz_nonexistent_ext",
            "root": "/tmp"
        }))).await;
        assert!(!out.is_error);
        assert!(out.content.contains("no matches"));
    }

    #[tokio::test]
    async fn max_results_is_respected_and_reports_truncation() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.rs")), "fn main() {}").unwrap();
        }

        let t = GlobTool;
        let out = t.execute(&call(json!({
            "pattern": "*.rs",
            "root": dir.path().to_str().unwrap(),
            "max_results": 2
        }))).await;
        assert!(!out.is_error);
        assert!(out.content.contains("truncated"));
    }

    #[tokio::test]
    async fn missing_pattern_is_error() {
        let t = GlobTool;
        let out = t.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'pattern'"));
    }
}
