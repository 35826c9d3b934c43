//! Newline-delimited JSON carriage of bridge traffic.
//!
//! ```text
//! -> {"id": 1, "channel": "system:getPlatform", "args": []}
//! <- {"id": 1, "result": "linux"}
//! <- {"id": 2, "error": "No handler registered for 'system:nope'"}
//! <- {"channel": "update:downloaded", "payload": true}
//! ```

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::FutureExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::bridge::Invocation;
use crate::error::BridgeError;
use crate::reply::PushMessage;

#[derive(Debug, Deserialize)]
struct WireRequest {
    id: u64,
    channel: String,
    #[serde(default)]
    args: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireMessage {
    Reply {
        id: Option<u64>,
        result: Value,
    },
    Failure {
        id: Option<u64>,
        error: String,
    },
    Push {
        channel: &'static str,
        payload: Value,
    },
}

impl WireMessage {
    fn answer(id: u64, outcome: Result<Value, BridgeError>) -> Self {
        match outcome {
            Ok(result) => Self::Reply {
                id: Some(id),
                result,
            },
            Err(error) => Self::Failure {
                id: Some(id),
                error: error.to_string(),
            },
        }
    }

    fn push(message: &PushMessage) -> Self {
        Self::Push {
            channel: message.channel(),
            payload: message.payload(),
        }
    }
}

type PendingReply = BoxFuture<'static, WireMessage>;

fn await_reply(id: u64, rx: oneshot::Receiver<Result<Value, BridgeError>>) -> PendingReply {
    async move {
        let outcome = rx.await.unwrap_or(Err(BridgeError::ShutDown));
        WireMessage::answer(id, outcome)
    }
    .boxed()
}

/// Pump requests from `reader` into the bridge and write replies and push
/// messages to `writer` until the bridge reports `done`.
///
/// Reading stops at EOF or on a read error. Requests accepted before EOF are
/// still answered; after a quit only replies that are already complete are
/// written.
///
/// # Errors
/// Returns an error when writing to `writer` fails.
pub async fn serve<R, W>(
    mut reader: R,
    mut writer: W,
    requests: mpsc::Sender<Invocation>,
    mut pushes: mpsc::UnboundedReceiver<PushMessage>,
    done: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut requests = Some(requests);
    let mut line = Vec::new();
    let mut pending: FuturesUnordered<PendingReply> = FuturesUnordered::new();

    loop {
        tokio::select! {
            biased;
            () = done.cancelled() => break,
            Some(message) = pending.next(), if !pending.is_empty() => {
                write_message(&mut writer, &message).await?;
            }
            Some(push) = pushes.recv() => {
                write_message(&mut writer, &WireMessage::push(&push)).await?;
            }
            read = reader.read_until(b'\n', &mut line), if requests.is_some() => {
                let Some(sender) = requests.as_ref() else { continue };
                let at_eof = match read {
                    Ok(0) => true,
                    Ok(_) => false,
                    Err(error) => {
                        warn!("Failed to read request stream: {error}");
                        line.clear();
                        true
                    }
                };
                // A cancelled read leaves its partial line in the buffer.
                let complete = std::mem::take(&mut line);
                if let Some(message) = submit(sender, &complete, &mut pending).await {
                    write_message(&mut writer, &message).await?;
                }
                if at_eof {
                    debug!("Request stream closed");
                    requests = None;
                }
            }
        }
    }

    if requests.is_none() {
        while let Some(message) = pending.next().await {
            write_message(&mut writer, &message).await?;
        }
    } else {
        while let Some(Some(message)) = pending.next().now_or_never() {
            write_message(&mut writer, &message).await?;
        }
    }
    while let Ok(push) = pushes.try_recv() {
        write_message(&mut writer, &WireMessage::push(&push)).await?;
    }
    writer.flush().await
}

/// Forward one request line. Returns a message to write immediately when the
/// line cannot be forwarded.
async fn submit(
    requests: &mpsc::Sender<Invocation>,
    line: &[u8],
    pending: &mut FuturesUnordered<PendingReply>,
) -> Option<WireMessage> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let request: WireRequest = match serde_json::from_slice(line) {
        Ok(request) => request,
        Err(error) => {
            warn!("Malformed request line: {error}");
            return Some(WireMessage::Failure {
                id: None,
                error: format!("Malformed request: {error}"),
            });
        }
    };

    let (reply, rx) = oneshot::channel();
    let invocation = Invocation {
        channel: request.channel,
        args: request.args,
        reply,
    };
    if requests.send(invocation).await.is_err() {
        return Some(WireMessage::answer(request.id, Err(BridgeError::ShutDown)));
    }
    pending.push(await_reply(request.id, rx));
    None
}

async fn write_message<W>(writer: &mut W, message: &WireMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message).map_err(std::io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
