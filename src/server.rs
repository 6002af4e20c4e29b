//! MCP server over stdio
//!
//! One JSON-RPC message per line on stdin, one per line on stdout. Tool
//! calls run on their own tasks; every outgoing line goes through a single
//! writer task. Registry changes are forwarded as
//! `notifications/tools/list_changed`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::{ApiBackend, normalize_arguments};
use crate::error::rpc_codes;
use crate::protocol::{
    Info, InitializeParams, InitializeResult, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, ServerCapabilities, ToolsCallParams,
    ToolsCapability, ToolsListResult, negotiate_version,
};
use crate::{Error, Result};

/// Server name reported during `initialize`
pub const SERVER_NAME: &str = "webapi-mcp";

const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

const INSTRUCTIONS: &str = "Register web APIs with register_web_api or load them from files, \
directories or a config file. Every registered API method becomes a callable tool.";

/// MCP server bound to one backend
pub struct StdioServer {
    backend: Arc<ApiBackend>,
}

impl StdioServer {
    /// Create a server for `backend`
    #[must_use]
    pub fn new(backend: Arc<ApiBackend>) -> Self {
        Self { backend }
    }

    /// Serve on the process's stdin/stdout until stdin closes
    ///
    /// # Errors
    ///
    /// Returns an error if stdin cannot be read.
    pub async fn run(&self) -> Result<()> {
        info!(tools = self.backend.list_tools().len(), "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve on arbitrary streams until `reader` reaches end of input.
    ///
    /// In-flight tool calls finish before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if `reader` fails.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(writer, out_rx));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let forwarder = tokio::spawn(forward_changes(
            self.backend.subscribe(),
            out_tx.clone(),
            shutdown_rx,
        ));

        let mut calls = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();
        let read_result = loop {
            reap_finished(&mut calls);
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(Error::Io(e)),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_message(line) {
                Ok(JsonRpcMessage::Request(request)) if request.method == "tools/call" => {
                    let backend = Arc::clone(&self.backend);
                    let out = out_tx.clone();
                    calls.spawn(async move {
                        let response = handle_request(&backend, request).await;
                        send(&out, &response);
                    });
                }
                Ok(JsonRpcMessage::Request(request)) => {
                    let response = handle_request(&self.backend, request).await;
                    send(&out_tx, &response);
                }
                Ok(JsonRpcMessage::Notification(notification)) => {
                    debug!(method = %notification.method, "Notification received");
                }
                Ok(JsonRpcMessage::Response(_)) => {
                    debug!("Ignoring client response");
                }
                Err(response) => send(&out_tx, &response),
            }
        };

        while calls.join_next().await.is_some() {}
        let _ = shutdown_tx.send(());
        let _ = forwarder.await;
        drop(out_tx);
        let _ = writer_task.await;

        debug!("Stdio input closed");
        read_result
    }
}

/// Decode one line; undecodable input becomes the error response to send
fn parse_message(line: &str) -> std::result::Result<JsonRpcMessage, JsonRpcResponse> {
    decode_message(line).map_err(|(id, e)| {
        warn!(error = %e, "Rejected incoming message");
        JsonRpcResponse::error(id, e.to_rpc_code(), e.to_string())
    })
}

fn decode_message(line: &str) -> std::result::Result<JsonRpcMessage, (Option<RequestId>, Error)> {
    let value: Value = serde_json::from_str(line).map_err(|e| (None, Error::Json(e)))?;

    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
    serde_json::from_value(value)
        .map_err(|e| (id, Error::Protocol(format!("Invalid request: {e}"))))
}

/// Collect finished tool-call tasks so the set only holds calls in flight
fn reap_finished(calls: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = calls.try_join_next() {
        if let Err(e) = joined {
            error!(error = %e, "Tool call task failed");
        }
        reaped += 1;
    }
    reaped
}

/// Answer one request
pub async fn handle_request(backend: &ApiBackend, request: JsonRpcRequest) -> JsonRpcResponse {
    let JsonRpcRequest {
        id, method, params, ..
    } = request;
    debug!(id = %id, method = %method, "Handling request");

    match method.as_str() {
        "initialize" => {
            let params: InitializeParams = params
                .and_then(|p| serde_json::from_value(p).ok())
                .unwrap_or_default();
            let version = negotiate_version(params.protocol_version.as_deref());
            info!(
                client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
                protocol = version,
                "Client initialized"
            );
            to_response(
                id,
                &InitializeResult {
                    protocol_version: version.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability { list_changed: true }),
                    },
                    server_info: Info {
                        name: SERVER_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    instructions: Some(INSTRUCTIONS.to_string()),
                },
            )
        }
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => to_response(
            id,
            &ToolsListResult {
                tools: backend.list_tools(),
            },
        ),
        "tools/call" => {
            let params =
                match params.map(serde_json::from_value::<ToolsCallParams>).transpose() {
                    Ok(Some(params)) => params,
                    Ok(None) => {
                        return JsonRpcResponse::error(
                            Some(id),
                            rpc_codes::INVALID_PARAMS,
                            "Missing tools/call params",
                        );
                    }
                    Err(e) => {
                        return JsonRpcResponse::error(
                            Some(id),
                            rpc_codes::INVALID_PARAMS,
                            format!("Invalid tools/call params: {e}"),
                        );
                    }
                };
            let arguments = match normalize_arguments(params.arguments) {
                Ok(arguments) => arguments,
                Err(e) => {
                    return JsonRpcResponse::error(Some(id), e.to_rpc_code(), e.to_string());
                }
            };
            let result = backend
                .call_tool(&params.name, Value::Object(arguments))
                .await;
            to_response(id, &result)
        }
        other => JsonRpcResponse::error(
            Some(id),
            rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    }
}

fn to_response<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            rpc_codes::INTERNAL_ERROR,
            format!("Failed to encode result: {e}"),
        ),
    }
}

fn send<T: Serialize>(out: &mpsc::UnboundedSender<String>, message: &T) {
    match serde_json::to_string(message) {
        Ok(line) => {
            if out.send(line).is_err() {
                warn!("Output closed, dropping message");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode outgoing message"),
    }
}

async fn write_lines<W>(mut writer: W, mut lines: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            error!(error = %e, "Failed to write to output");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn forward_changes(
    mut changes: broadcast::Receiver<crate::api::RegistryChange>,
    out: mpsc::UnboundedSender<String>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            change = changes.recv() => match change {
                Ok(change) => {
                    debug!(?change, "Registry changed");
                    send(&out, &JsonRpcNotification::new(TOOLS_LIST_CHANGED));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Registry change notifications lagged");
                    send(&out, &JsonRpcNotification::new(TOOLS_LIST_CHANGED));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }
    }
}
