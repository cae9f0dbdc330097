//! Local IPC server exposing the session facade.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON requests and
//! answers each with one JSON line. A `subscribe` request turns the
//! connection into an event stream.
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "load-project", "path": "/work/app"}
//! {"command": "run-script", "project_path": "/work/app", "script_name": "build"}
//! {"command": "stop-script", "script_name": "build"}
//! {"command": "subscribe"}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": {"success": true}}
//! {"ok": false, "error": "Script 'build' is already running"}
//! ```
//!
//! Event (subscribed connections only):
//! ```json
//! {"event": "script-output", "script": "build", "run": 1, "type": "stdout", "data": "..."}
//! {"event": "script-exit", "script": "build", "run": 1, "code": 0}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::session::Session;
use crate::{AppError, Result};

/// Inbound IPC request.
#[derive(Debug, Default, Deserialize)]
pub struct IpcRequest {
    /// Command verb.
    pub command: String,
    /// Project directory (for `run-script`).
    pub project_path: Option<PathBuf>,
    /// Script name (for `run-script`, `stop-script`, `script-info`).
    pub script_name: Option<String>,
    /// Filesystem path (for `load-project`, `open-in-finder`, `install-deps`).
    pub path: Option<PathBuf>,
    /// URL (for `open-url`).
    pub url: Option<String>,
}

/// Outbound IPC response.
#[derive(Debug, Serialize, PartialEq)]
pub struct IpcResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn from_error(err: &AppError) -> Self {
        Self::error(err.to_string())
    }
}

/// What a connection should do after dispatching a request.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Write this response and keep reading requests.
    Reply(IpcResponse),
    /// Acknowledge, then stream events for the rest of the connection.
    Subscribe,
}

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    session: Arc<Session>,
    ipc_name: &str,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = ipc_name.to_owned();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let handle = tokio::spawn(async move {
        let span = info_span!("ipc_server", name = %name);
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                let session = Arc::clone(&session);
                                let conn_ct = ct.clone();
                                tokio::spawn(async move {
                                    let (reader, writer) = stream.split();
                                    serve_connection(reader, writer, session, conn_ct).await;
                                });
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    });

    Ok(handle)
}

/// Serve one client connection until EOF, a write error, or cancellation.
pub async fn serve_connection<R, W>(
    reader: R,
    mut writer: W,
    session: Arc<Session>,
    ct: CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let span = info_span!("ipc_conn");
    async move {
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let read = tokio::select! {
                () = ct.cancelled() => break,
                read = buf_reader.read_line(&mut line) => read,
            };

            match read {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let dispatch = match serde_json::from_str::<IpcRequest>(trimmed) {
                        Ok(request) => dispatch_command(&request, &session).await,
                        Err(err) => Dispatch::Reply(IpcResponse::error(format!("invalid json: {err}"))),
                    };

                    match dispatch {
                        Dispatch::Reply(response) => {
                            if write_json_line(&mut writer, &response).await.is_err() {
                                break;
                            }
                        }
                        Dispatch::Subscribe => {
                            // Register before acknowledging so no event after
                            // the ack can be missed.
                            let subscription = session.subscribe().await;
                            let ack = IpcResponse::success(serde_json::json!({ "subscribed": true }));
                            if write_json_line(&mut writer, &ack).await.is_err() {
                                break;
                            }
                            stream_events(&mut buf_reader, &mut writer, subscription, &ct).await;
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}

/// Forward broadcaster events to a subscribed client until it hangs up.
async fn stream_events<R, W>(
    reader: &mut BufReader<R>,
    writer: &mut W,
    mut subscription: crate::supervisor::Subscription,
    ct: &CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut discard = String::new();
    loop {
        tokio::select! {
            () = ct.cancelled() => break,
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if write_json_line(writer, &event).await.is_err() {
                    break;
                }
            }
            read = reader.read_line(&mut discard) => {
                // Subscribed clients only listen; anything but EOF is ignored.
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => discard.clear(),
                }
            }
        }
    }
    debug!("event stream closed");
}

async fn write_json_line<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(value)
        .unwrap_or_else(|_| r#"{"ok":false,"error":"serialization failed"}"#.to_owned());
    line.push('\n');
    let result = async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }
    .await;
    if let Err(ref err) = result {
        warn!(%err, "failed to write ipc line");
    }
    result
}

/// Route an IPC command to the session facade.
pub async fn dispatch_command(request: &IpcRequest, session: &Session) -> Dispatch {
    let span = info_span!("ipc_command", command = %request.command);
    async {
        let response = match request.command.as_str() {
            "subscribe" => return Dispatch::Subscribe,
            "get-default-path" => {
                IpcResponse::success(serde_json::json!({ "path": session.default_path() }))
            }
            "load-project" => handle_load_project(request, session),
            "select-folder" => {
                let path = session.select_folder().await;
                IpcResponse::success(serde_json::json!({ "path": path }))
            }
            "run-script" => handle_run_script(request, session).await,
            "stop-script" => handle_stop_script(request, session).await,
            "get-running-scripts" => {
                let scripts = session.running_scripts().await;
                IpcResponse::success(serde_json::json!({ "scripts": scripts }))
            }
            "script-info" => handle_script_info(request, session).await,
            "open-url" => handle_open_url(request, session),
            "open-in-finder" => handle_open_in_finder(request, session),
            "install-deps" => handle_install_deps(request, session).await,
            other => IpcResponse::error(format!("unknown command: {other}")),
        };
        Dispatch::Reply(response)
    }
    .instrument(span)
    .await
}

fn handle_open_url(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref url) = request.url else {
        return IpcResponse::error("missing required 'url' field");
    };
    session.open_url(url);
    IpcResponse::success(serde_json::json!({}))
}

fn handle_open_in_finder(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref path) = request.path else {
        return IpcResponse::error("missing required 'path' field");
    };
    session.open_in_file_browser(path);
    IpcResponse::success(serde_json::json!({}))
}

fn handle_load_project(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref path) = request.path else {
        return IpcResponse::error("missing required 'path' field");
    };

    match session.load_project(path) {
        Ok(summary) => match serde_json::to_value(&summary) {
            Ok(value) => IpcResponse::success(value),
            Err(err) => IpcResponse::error(format!("failed to encode project: {err}")),
        },
        Err(err) => IpcResponse::from_error(&err),
    }
}

async fn handle_run_script(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref project_path) = request.project_path else {
        return IpcResponse::error("missing required 'project_path' field");
    };
    let Some(ref script) = request.script_name else {
        return IpcResponse::error("missing required 'script_name' field");
    };

    match session.run_script(project_path, script).await {
        Ok(_) => IpcResponse::success(serde_json::json!({ "success": true })),
        Err(err) => IpcResponse::from_error(&err),
    }
}

async fn handle_stop_script(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref script) = request.script_name else {
        return IpcResponse::error("missing required 'script_name' field");
    };

    match session.stop_script(script).await {
        Ok(_) => IpcResponse::success(serde_json::json!({ "success": true })),
        Err(err) => IpcResponse::from_error(&err),
    }
}

async fn handle_script_info(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref script) = request.script_name else {
        return IpcResponse::error("missing required 'script_name' field");
    };

    match session.script_info(script).await {
        Some(info) => match serde_json::to_value(&info) {
            Ok(value) => IpcResponse::success(value),
            Err(err) => IpcResponse::error(format!("failed to encode script info: {err}")),
        },
        None => IpcResponse::from_error(&AppError::NotRunning(script.clone())),
    }
}

async fn handle_install_deps(request: &IpcRequest, session: &Session) -> IpcResponse {
    let Some(ref path) = request.path else {
        return IpcResponse::error("missing required 'path' field");
    };

    match session.install_dependencies(path).await {
        Ok(outcome) => IpcResponse::success(serde_json::json!({
            "success": outcome.success,
            "code": outcome.code,
        })),
        Err(err) => IpcResponse::from_error(&err),
    }
}
