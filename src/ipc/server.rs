//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications for
//! state change events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::events::StateEvent;
use crate::recognition::{BridgeEngine, RecognitionErrorKind, RecognizerEvent, TranscriptResult};
use crate::state::{AssistantSnapshot, Input};

use super::protocol::{AssistantStatus, Notification, Request, Response};

const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Handles into the running assistant shared by every client
#[derive(Clone)]
pub struct ServerContext {
    pub inputs: mpsc::UnboundedSender<Input>,
    pub snapshot: watch::Receiver<AssistantSnapshot>,
    pub events: broadcast::Sender<StateEvent>,
    pub bridge: BridgeEngine,
    pub agent_id: String,
    pub started_at: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    context: ServerContext,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(socket_path: &Path, context: ServerContext) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            context,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = self.context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, context: ServerContext) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        // Dropped with this future, on disconnect and on server shutdown alike
        let mut forwarder: Option<Forwarder> = None;
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            let response = match serde_json::from_slice::<Request>(&msg_buf) {
                Ok(request) => {
                    debug!(?request, "received request");
                    let (response, subscribe) = Self::process_request(request, &context);
                    if subscribe && forwarder.is_none() {
                        debug!("client subscribed to notifications");
                        forwarder = Some(Forwarder(Self::forward_events(
                            context.events.subscribe(),
                            Arc::clone(&writer),
                        )));
                    }
                    response
                }
                Err(e) => Response::Error {
                    code: "bad_request".to_string(),
                    message: e.to_string(),
                },
            };

            let mut writer = writer.lock().await;
            send_message(&mut *writer, &response).await?;
        }
    }

    /// Push state events to a subscribed client until it goes away
    fn forward_events<W>(
        mut events: broadcast::Receiver<StateEvent>,
        writer: Arc<Mutex<W>>,
    ) -> tokio::task::JoinHandle<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let notification = Notification::StateEvent { event };
                        let mut writer = writer.lock().await;
                        if let Err(e) = send_message(&mut *writer, &notification).await {
                            debug!(?e, "subscriber went away");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    fn process_request(request: Request, context: &ServerContext) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let snapshot = context.snapshot.borrow().clone();
                let status = AssistantStatus::from_snapshot(
                    &snapshot,
                    &context.agent_id,
                    context.started_at.elapsed().as_secs(),
                );
                (Response::Status(status), false)
            }

            Request::Toggle => (Self::dispatch(context, Input::Toggle), false),

            Request::EndSession => (Self::dispatch(context, Input::EndSession), false),

            Request::DismissError { retry } => {
                (Self::dispatch(context, Input::DismissError { retry }), false)
            }

            Request::SetWakeListening { enabled } => {
                (Self::dispatch(context, Input::SetWakeListening(enabled)), false)
            }

            Request::Transcript {
                text,
                is_final,
                alternatives,
            } => {
                let result = TranscriptResult::new(text, is_final).with_alternatives(alternatives);
                (Self::bridge(context, RecognizerEvent::Result(result)), false)
            }

            Request::RecognizerError { kind } => {
                let kind = RecognitionErrorKind::parse(&kind);
                (Self::bridge(context, RecognizerEvent::Error(kind)), false)
            }

            Request::RecognizerEnded => (Self::bridge(context, RecognizerEvent::End), false),

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    fn dispatch(context: &ServerContext, input: Input) -> Response {
        match context.inputs.send(input) {
            Ok(()) => Response::Accepted,
            Err(_) => Response::Error {
                code: "unavailable".to_string(),
                message: "assistant is shutting down".to_string(),
            },
        }
    }

    fn bridge(context: &ServerContext, event: RecognizerEvent) -> Response {
        if let Some(handle) = context.bridge.live_handle() {
            debug!(%handle, ?event, "bridging recognizer event");
        }
        if context.bridge.feed(event) {
            Response::Accepted
        } else {
            Response::Error {
                code: "not_listening".to_string(),
                message: "no wake word recognizer is running".to_string(),
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Notification task of one subscribed client, aborted on drop
struct Forwarder(tokio::task::JoinHandle<()>);

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
