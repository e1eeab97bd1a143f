//! The native messaging side of the host: stdin/stdout framing and dispatch of
//! messages arriving from the extension.

use serde_json::{Value, json};
use std::io::{self, Read, Write};
use tokio::sync::mpsc;

use crate::protocol::{Action, Incoming, Response, read_message, tag_message, write_message};
use crate::state::SharedState;

/// Executes an extension-originated action.
pub async fn dispatch(state: &SharedState, action: Action) -> Response {
    match action {
        Action::ApiRequest { config } => {
            let url = config.url.clone();
            match state.transport.execute(config).await {
                Ok(data) => match serde_json::to_value(data) {
                    Ok(data) => Response::with_data(data),
                    Err(e) => Response::failure(&e.into()),
                },
                Err(e) => {
                    tracing::debug!(url = %url, "apiRequest failed: {}", e);
                    Response::failure(&e)
                }
            }
        }
        Action::Ping => Response::pong(),
        Action::BotSaved => {
            tracing::info!("bot saved in editor");
            let _ = state.events.send(json!({"type": "botSaved"}));
            Response::ok()
        }
        other => Response::failure_message(format!(
            "{} is handled by the page, not the host",
            other.name()
        )),
    }
}

/// Handles one inbound frame and returns the frame to send back, if any.
pub async fn handle_frame(state: &SharedState, msg: Value) -> Option<Value> {
    state.connection.confirm();

    let request_id = msg.get("requestId").and_then(Value::as_u64);
    let incoming = match Incoming::parse(msg) {
        Ok(incoming) => incoming,
        Err(e) => {
            tracing::warn!("unrecognized message from extension: {}", e);
            let response = Response::failure_message(format!("unrecognized message: {e}"));
            return request_id.and_then(|id| tag_message(&response, "replyTo", id).ok());
        }
    };

    match incoming {
        Incoming::Reply { reply_to, response } => {
            state.page.resolve(reply_to, response);
            None
        }
        Incoming::Request { request_id, action } => {
            tracing::debug!(action = action.name(), ?request_id, "message from extension");
            let expects_reply = action.expects_reply();
            let response = dispatch(state, action).await;
            if !expects_reply {
                return None;
            }
            match request_id {
                Some(id) => tag_message(&response, "replyTo", id).ok(),
                None => serde_json::to_value(&response).ok(),
            }
        }
    }
}

/// Failure reply standing in for a reply Chrome would refuse. `None` when
/// `msg` answers nothing.
fn oversized_reply(msg: &Value) -> Option<Value> {
    let reply_to = msg.get("replyTo").and_then(Value::as_u64)?;
    let len = serde_json::to_vec(msg).map(|b| b.len()).unwrap_or_default();
    let response =
        Response::failure_message(format!("response too large for native messaging ({len} bytes)"));
    tag_message(&response, "replyTo", reply_to).ok()
}

/// Writes queued frames to `writer` until the queue closes or the write fails.
pub fn spawn_writer<W>(mut rx: mpsc::UnboundedReceiver<Value>, mut writer: W) -> tokio::task::JoinHandle<()>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        while let Some(msg) = rx.blocking_recv() {
            let result = match write_message(&mut writer, &msg) {
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                    tracing::error!("message not sent to extension: {}", e);
                    match oversized_reply(&msg) {
                        Some(reply) => write_message(&mut writer, &reply),
                        None => Ok(()),
                    }
                }
                other => other,
            };
            if let Err(e) = result {
                tracing::error!("error writing message to extension: {}", e);
                break;
            }
        }
    })
}

/// Reads frames from `reader` and handles each on its own task so a slow API
/// call never blocks replies to the page. Returns when the extension closes
/// the pipe.
pub async fn serve<R>(state: SharedState, reader: R, outbound: mpsc::UnboundedSender<Value>)
where
    R: Read + Send + 'static,
{
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<Value>();

    let reader_task = tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        loop {
            match read_message(&mut reader) {
                Ok(msg) => {
                    if in_tx.send(msg).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::info!("extension closed the connection");
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    // The length prefix was consumed, so the stream is out of sync.
                    tracing::error!("invalid message from extension: {}", e);
                    break;
                }
                Err(e) => {
                    tracing::error!("error reading from extension: {}", e);
                    break;
                }
            }
        }
    });

    while let Some(msg) = in_rx.recv().await {
        let state = state.clone();
        let outbound = outbound.clone();
        tokio::spawn(async move {
            if let Some(reply) = handle_frame(&state, msg).await {
                let _ = outbound.send(reply);
            }
        });
    }

    let _ = reader_task.await;
    state.connection.mark_disconnected();
}
