//! Minimal `Content-Length`-framed JSON-RPC 2.0 codec over a child process's
//! stdio, the same framing shape `rmcp`'s stdio transport uses. Only the
//! envelope is interpreted here; method-specific payloads are left as raw
//! [`serde_json::Value`].

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl RpcMessage {
    pub fn request(id: i64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::Value::from(id)),
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }
}

pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &RpcMessage,
) -> Result<(), CodecError> {
    let body = serde_json::to_vec(msg)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<RpcMessage>, CodecError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| CodecError::Malformed(format!("bad Content-Length: {value}")))?,
            );
        }
    }
    let len = content_length
        .ok_or_else(|| CodecError::Malformed("missing Content-Length header".to_string()))?;
    let mut body = vec![0u8; len];
    tokio::io::AsyncReadExt::read_exact(reader, &mut body).await?;
    let msg: RpcMessage = serde_json::from_slice(&body)?;
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_request_through_the_framing() {
        let mut buf = Vec::new();
        let req = RpcMessage::request(1, "initialize", serde_json::json!({"capabilities": {}}));
        write_message(&mut buf, &req).await.unwrap();

        let mut reader = tokio::io::BufReader::new(buf.as_slice());
        let parsed = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(parsed.method.as_deref(), Some("initialize"));
        assert_eq!(parsed.id, Some(serde_json::Value::from(1)));
    }

    #[tokio::test]
    async fn read_returns_none_on_eof() {
        let mut reader = tokio::io::BufReader::new(&b""[..]);
        let result = read_message(&mut reader).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn notification_has_no_id() {
        let notif = RpcMessage::notification("textDocument/didOpen", serde_json::json!({}));
        assert!(notif.is_notification());
    }

    #[tokio::test]
    async fn rejects_frame_missing_content_length() {
        let mut reader = tokio::io::BufReader::new(&b"\r\n{}"[..]);
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
