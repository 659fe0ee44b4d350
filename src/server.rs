//! Minimal MCP host over stdio.
//!
//! Reads newline-delimited JSON-RPC 2.0 messages, answers the handful of
//! methods a client needs to discover and call the `get_news` tool, and
//! writes one JSON response per line. Each request runs on its own task;
//! a single writer serializes responses in completion order.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::news::{NewsService, DEFAULT_LIMIT, DEFAULT_TOPIC};

pub const SERVER_NAME: &str = "yle-news";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const TOOL_NAME: &str = "get_news";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

/// An incoming JSON-RPC message. Requests without an `id` are notifications;
/// an explicit `"id": null` is a request and is answered with a null id.
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

// Only runs when the key is present, so `null` becomes `Some(Value::Null)`.
fn present_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl McpResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GetNewsArgs {
    #[serde(default = "default_topic")]
    topic: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Dispatches JSON-RPC methods to the news service.
#[derive(Debug, Clone)]
pub struct McpHandler {
    service: NewsService,
}

impl McpHandler {
    pub fn new(service: NewsService) -> Self {
        Self { service }
    }

    /// Handle one raw line. Returns `None` when no reply is due.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable message");
                return Some(McpResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let id = value.get("id").cloned();
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(McpResponse::failure(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            )),
        }
    }

    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        tracing::debug!(method = %request.method, id = %id, "Request received");
        let response = match request.method.as_str() {
            "initialize" => McpResponse::success(id, self.initialize(request.params.as_ref())),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => McpResponse::success(id, json!({ "tools": [self.tool_definition()] })),
            "tools/call" => self.call_tool(id, request.params).await,
            other => McpResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    fn tool_definition(&self) -> Value {
        json!({
            "name": TOOL_NAME,
            "description": "Fetch news from Yle RSS feeds for a specific topic. \
                Returns the news items sorted by publication date (newest first).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": format!(
                            "The news topic to fetch. Available topics: {}",
                            self.service.registry().available()
                        ),
                        "default": DEFAULT_TOPIC,
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of news items to fetch",
                        "default": DEFAULT_LIMIT,
                    },
                },
            },
        })
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> McpResponse {
        let params = match params
            .map(serde_json::from_value::<ToolCallParams>)
            .transpose()
        {
            Ok(Some(p)) => p,
            Ok(None) => return McpResponse::failure(id, INVALID_PARAMS, "Missing params"),
            Err(e) => {
                return McpResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
        };

        if params.name != TOOL_NAME {
            return McpResponse::failure(
                id,
                INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            );
        }

        let arguments = match params.arguments {
            None | Some(Value::Null) => json!({}),
            Some(v) => v,
        };
        let args: GetNewsArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => {
                return McpResponse::failure(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid arguments: {}", e),
                )
            }
        };

        match self.service.get_news(&args.topic, args.limit).await {
            Ok(news) => {
                let structured = match serde_json::to_value(&news) {
                    Ok(v) => v,
                    Err(e) => return McpResponse::failure(id, INTERNAL_ERROR, e.to_string()),
                };
                McpResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": structured.to_string() }],
                        "structuredContent": structured,
                        "isError": false,
                    }),
                )
            }
            Err(e) => {
                tracing::warn!(topic = %args.topic, error = %e, "get_news failed");
                McpResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": e.to_string() }],
                        "isError": true,
                    }),
                )
            }
        }
    }
}

/// Serve requests from `reader` until EOF, writing replies to `writer`.
///
/// Returns once input is exhausted and every in-flight request has replied.
pub async fn serve<R, W>(handler: Arc<McpHandler>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<McpResponse>(32);

    let read_loop = async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim().to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Message is not valid UTF-8");
                    let response = McpResponse::failure(
                        Value::Null,
                        PARSE_ERROR,
                        format!("Parse error: invalid UTF-8: {}", e),
                    );
                    if tx.send(response).await.is_err() {
                        break;
                    }
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            let handler = Arc::clone(&handler);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = handler.handle_line(&line).await {
                    if let Err(e) = tx.send(response).await {
                        tracing::warn!(error = %e, "Response channel closed (writer gone)");
                    }
                }
            });
        }
        tracing::debug!("Input closed");
        anyhow::Ok(())
    };

    let write_loop = async {
        while let Some(response) = rx.recv().await {
            let mut buf = serde_json::to_vec(&response)?;
            buf.push(b'\n');
            writer.write_all(&buf).await?;
            writer.flush().await?;
        }
        anyhow::Ok(())
    };

    tokio::try_join!(read_loop, write_loop)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchSettings;
    use crate::topics::{Topic, TopicRegistry};

    fn handler() -> McpHandler {
        let registry = TopicRegistry::new(vec![
            Topic::new("news", "http://127.0.0.1:1/news.rss"),
            Topic::new("english", "http://127.0.0.1:1/english.rss"),
        ])
        .unwrap();
        McpHandler::new(NewsService::new(
            Arc::new(registry),
            FetchSettings::default(),
        ))
    }

    async fn reply(line: &str) -> McpResponse {
        handler().handle_line(line).await.expect("expected a reply")
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let response = reply(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
        )
        .await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "yle-news");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_defaults_protocol_version() {
        let response = reply(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).await;
        assert_eq!(response.result.unwrap()["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notification_gets_no_reply() {
        let response = handler()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let response = reply(r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#).await;
        assert_eq!(response.id, json!("p"));
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_tools_list_describes_topics() {
        let response = reply(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "get_news");

        let topic = &tools[0]["inputSchema"]["properties"]["topic"];
        assert_eq!(topic["default"], "news");
        assert!(topic["description"]
            .as_str()
            .unwrap()
            .ends_with("Available topics: news, english"));
        assert_eq!(tools[0]["inputSchema"]["properties"]["limit"]["default"], 5);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = reply(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = reply("{not json").await;
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_missing_method_is_invalid_request() {
        let response = reply(r#"{"jsonrpc":"2.0","id":4}"#).await;
        assert_eq!(response.id, json!(4));
        assert_eq!(response.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let response = reply(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_weather"}}"#,
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.contains("get_weather"));
    }

    #[tokio::test]
    async fn test_bad_limit_type_is_invalid_params() {
        let response = reply(
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"get_news","arguments":{"limit":"five"}}}"#,
        )
        .await;
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_invalid_topic_is_tool_error() {
        let response = reply(
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_news","arguments":{"topic":"sports"}}}"#,
        )
        .await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(text, "Invalid topic: sports. Available topics: news, english");
    }

    #[tokio::test]
    async fn test_serve_replies_per_request_and_skips_notifications() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );

        let mut output = Vec::new();
        serve(Arc::new(handler()), input.as_bytes(), &mut output)
            .await
            .unwrap();

        let replies: Vec<McpResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);

        let mut ids: Vec<i64> = replies.iter().map(|r| r.id.as_i64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8_line() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.push(b'\n');
        input.extend_from_slice(b"\xff\xfe\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.push(b'\n');

        let mut output = Vec::new();
        serve(Arc::new(handler()), input.as_slice(), &mut output)
            .await
            .unwrap();

        let replies: Vec<McpResponse> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);

        let rejected: Vec<&McpResponse> = replies.iter().filter(|r| r.id.is_null()).collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].error.as_ref().unwrap().code, PARSE_ERROR);

        let mut ids: Vec<i64> = replies.iter().filter_map(|r| r.id.as_i64()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_null_id_is_a_request_not_a_notification() {
        let response = handler()
            .handle_line(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .expect("null id still gets a reply");
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.result, Some(json!({})));
    }
}
