//! Output pump: forwards raw pipe chunks to the broadcaster.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, warn};

use crate::models::event::{OutputEvent, ScriptEvent, StreamKind};
use crate::supervisor::broadcaster::OutputBroadcaster;

/// Read `pipe` until EOF, publishing each chunk as it arrives.
///
/// Chunks are published sequentially, so per-stream order matches the
/// order the OS produced them. Returns the number of bytes forwarded.
pub async fn pump_output<R>(
    identifier: String,
    run: u64,
    stream: StreamKind,
    pipe: R,
    broadcaster: Arc<OutputBroadcaster>,
) -> usize
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(pipe, BytesCodec::new());
    let mut forwarded = 0usize;

    while let Some(item) = framed.next().await {
        match item {
            Ok(chunk) => {
                forwarded += chunk.len();
                broadcaster
                    .publish(ScriptEvent::ScriptOutput(OutputEvent {
                        identifier: identifier.clone(),
                        run,
                        stream,
                        payload: chunk.freeze(),
                    }))
                    .await;
            }
            Err(err) => {
                warn!(script = %identifier, run, stream = stream.as_str(), %err, "output read failed");
                break;
            }
        }
    }

    debug!(script = %identifier, run, stream = stream.as_str(), forwarded, "output stream closed");
    forwarded
}
