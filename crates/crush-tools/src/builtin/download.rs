// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

const DEFAULT_MAX_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Downloads a URL's raw bytes to a local file, bounded by a byte cap and a
/// deadline. Unlike `fetch`, the body is never decoded or interpreted — this
/// is the tool for binary payloads (archives, images, firmware blobs, …).
pub struct DownloadTool;

#[async_trait]
impl Tool for DownloadTool {
    fn name(&self) -> &str { "download" }

    fn description(&self) -> &str {
        "Download a URL's raw bytes to a local file.\n\n\
         ## Usage\n\
         - Fetch binary content (archives, images, release assets) to disk\n\
         - Unlike fetch, the body is never decoded as text or HTML\n\n\
         ## Limitations\n\
         - Bounded by a byte cap (default 100MB) and a deadline (default 120s)\n\
         - Exceeding either aborts the download and removes the partial file\n\
         - No authentication support\n\n\
         ## Examples\n\
         <example>\n\
         download: url=\"https://example.com/release.tar.gz\", dest=\"/tmp/release.tar.gz\"\n\
         </example>"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to download (http or https)"
                },
                "dest": {
                    "type": "string",
                    "description": "Local file path to write the downloaded bytes to"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Maximum bytes to accept (default 104857600)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Deadline for the whole download in seconds (default 120)"
                }
            },
            "required": ["url", "dest"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy { ApprovalPolicy::Ask }

    fn consent(&self, call: &ToolCall) -> Option<String> {
        call.args.get("dest").and_then(|v| v.as_str()).map(String::from)
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = match call.args.get("url").and_then(|v| v.as_str()) {
            Some(u) => u.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'url'"),
        };
        let dest = match call.args.get("dest").and_then(|v| v.as_str()) {
            Some(d) => d.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'dest'"),
        };
        let max_bytes = call.args.get("max_bytes").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_MAX_BYTES);
        let timeout_secs = call.args.get("timeout_secs").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_TIMEOUT_SECS);

        debug!(url = %url, dest = %dest, "download tool");

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            download_to_file(&url, &dest, max_bytes),
        )
        .await;

        match result {
            Ok(Ok(written)) => ToolOutput::ok(&call.id, format!("wrote {written} bytes to {dest}")),
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_file(&dest).await;
                ToolOutput::err(&call.id, format!("download error: {e}"))
            }
            Err(_) => {
                let _ = tokio::fs::remove_file(&dest).await;
                ToolOutput::err(&call.id, format!("timeout after {timeout_secs}s"))
            }
        }
    }
}

async fn download_to_file(url: &str, dest: &str, max_bytes: u64) -> anyhow::Result<u64> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent("crush-agent/0.1")
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            anyhow::bail!("content-length {len} exceeds max_bytes {max_bytes}");
        }
    }

    if let Some(parent) = std::path::Path::new(dest).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > max_bytes {
            anyhow::bail!("download exceeded max_bytes {max_bytes}");
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::ToolCall;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "d1".into(), name: "download".into(), args }
    }

    #[test]
    fn schema_requires_url_and_dest() {
        let t = DownloadTool;
        let schema = t.parameters_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v.as_str() == Some("url")));
        assert!(required.iter().any(|v| v.as_str() == Some("dest")));
    }

    #[test]
    fn consent_reports_dest() {
        let t = DownloadTool;
        let c = call(json!({"url": "https://example.com/f.bin", "dest": "/tmp/f.bin"}));
        assert_eq!(t.consent(&c).as_deref(), Some("/tmp/f.bin"));
    }

    #[tokio::test]
    async fn missing_url_is_error() {
        let t = DownloadTool;
        let out = t.execute(&call(json!({"dest": "/tmp/x.bin"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'url'"));
    }

    #[tokio::test]
    async fn missing_dest_is_error() {
        let t = DownloadTool;
        let out = t.execute(&call(json!({"url": "https://example.com/x.bin"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'dest'"));
    }
}
