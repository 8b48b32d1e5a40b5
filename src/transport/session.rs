//! Module `session`
//!
//! A JSON-lines RPC session. Each request and reply is one JSON object on
//! its own line:
//!
//! ```text
//! -> {"id":7,"method":"Arith.Multiply","params":{"a":6,"b":7}}
//! <- {"id":7,"result":42,"error":null}
//! ```
//!
//! A writer task drains a bounded send queue onto the socket and a reader
//! task routes replies back to the waiting [`Call`]s by id. Closing does not
//! queue behind pending frames: it stops both tasks at once, even mid-write,
//! and the socket is released when they exit.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::transport::Session;
use crate::transport::call::{Call, CallSender};

/// Requests allowed to wait for the writer before `go` starts waiting too.
const SEND_QUEUE_CAPACITY: usize = 64;

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

struct Frame {
    id: u64,
    line: Vec<u8>,
}

#[derive(Default)]
struct Pending {
    calls: HashMap<u64, CallSender>,
    closing: bool,
    shutdown: bool,
}

impl Pending {
    /// Marks the session dead and completes every outstanding call.
    fn fail_all(&mut self, err: impl Fn() -> Error) {
        self.shutdown = true;
        for (_, done) in self.calls.drain() {
            let _ = done.send(Err(err()));
        }
    }
}

/// Why the reader stopped.
struct Severed {
    kind: io::ErrorKind,
    reason: String,
}

/// Session over any byte stream, usually a TCP or Unix socket.
pub struct RpcSession {
    outgoing: mpsc::Sender<Frame>,
    pending: Arc<Mutex<Pending>>,
    seq: AtomicU64,
    cancel: CancellationToken,
    writer: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl RpcSession {
    /// Takes ownership of `stream` and spawns the reader and writer tasks.
    /// Must be called from within a Tokio runtime.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outgoing, queue) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let pending = Arc::new(Mutex::new(Pending::default()));
        let cancel = CancellationToken::new();

        let writer = tokio::spawn(write_loop(
            writer,
            queue,
            Arc::clone(&pending),
            cancel.clone(),
        ));
        tokio::spawn(read_loop(reader, Arc::clone(&pending), cancel.clone()));

        Self {
            outgoing,
            pending,
            seq: AtomicU64::new(0),
            cancel,
            writer: Mutex::new(Some(writer)),
        }
    }
}

#[async_trait]
impl Session for RpcSession {
    async fn go(&self, method: &str, args: Value) -> Call {
        let (call, done) = Call::pending(method);
        let id = self.seq.fetch_add(1, Ordering::Relaxed);

        let line = match serde_json::to_vec(&Request {
            id,
            method,
            params: &args,
        }) {
            Ok(line) => line,
            Err(e) => {
                let _ = done.send(Err(Error::Codec(e)));
                return call;
            }
        };

        {
            let mut pending = self.pending.lock().await;
            if pending.closing || pending.shutdown {
                let _ = done.send(Err(Error::Shutdown));
                return call;
            }
            pending.calls.insert(id, done);
        }

        if self.outgoing.send(Frame { id, line }).await.is_err() {
            if let Some(done) = self.pending.lock().await.calls.remove(&id) {
                let _ = done.send(Err(Error::Shutdown));
            }
        }
        call
    }

    async fn close(&self) -> Result<()> {
        {
            let mut pending = self.pending.lock().await;
            if pending.closing || pending.shutdown {
                return Err(Error::Shutdown);
            }
            pending.closing = true;
        }

        self.cancel.cancel();
        let Some(writer) = self.writer.lock().await.take() else {
            return Err(Error::Shutdown);
        };
        match writer.await {
            Ok(result) => result.map_err(Error::Close),
            Err(_) => Err(Error::Shutdown),
        }
    }
}

impl Drop for RpcSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Writes queued frames until the session is closed or dropped. A failed
/// write severs the whole session. Returns the result of shutting down the
/// write half.
async fn write_loop<W>(
    writer: W,
    mut queue: mpsc::Receiver<Frame>,
    pending: Arc<Mutex<Pending>>,
    cancel: CancellationToken,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            written = write_frame(&mut writer, &frame.line) => written,
        };

        if let Err(e) = written {
            warn!("Failed to write request {}: {}", frame.id, e);
            pending
                .lock()
                .await
                .fail_all(|| Error::transport(e.kind(), &e.to_string()));
            cancel.cancel();
            break;
        }
    }

    // Bytes stuck in the buffer are abandoned; only the socket is shut down.
    writer.get_mut().shutdown().await
}

async fn write_frame<W>(writer: &mut W, line: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

async fn read_loop<R>(reader: R, pending: Arc<Mutex<Pending>>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    let severed = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Response>(&line) {
                        Ok(response) => deliver(&pending, response).await,
                        Err(e) => break Some(Severed {
                            kind: io::ErrorKind::InvalidData,
                            reason: format!("malformed reply: {e}"),
                        }),
                    }
                }
                Ok(None) => break Some(Severed {
                    kind: io::ErrorKind::UnexpectedEof,
                    reason: "connection closed by peer".to_string(),
                }),
                Err(e) => break Some(Severed {
                    kind: e.kind(),
                    reason: e.to_string(),
                }),
            }
        }
    };

    let mut pending = pending.lock().await;
    match severed {
        Some(severed) if !pending.closing => {
            debug!("Session severed: {}", severed.reason);
            pending.fail_all(|| Error::transport(severed.kind, &severed.reason));
        }
        _ => pending.fail_all(|| Error::Shutdown),
    }
}

async fn deliver(pending: &Mutex<Pending>, response: Response) {
    let Some(done) = pending.lock().await.calls.remove(&response.id) else {
        debug!("Dropping reply for unknown call {}", response.id);
        return;
    };
    let result = match response.error {
        Some(message) => Err(Error::Remote(message)),
        None => Ok(response.result),
    };
    let _ = done.send(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadBuf};

    /// A stream whose reads never complete and whose writes always fail.
    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Answers every request on the far end of a duplex pipe.
    /// `Echo` replies with its params, `Fail` with an error, `Hang` never.
    fn spawn_peer(io: DuplexStream) {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(io);
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                let reply = match request["method"].as_str().unwrap() {
                    "Echo" => json!({"id": request["id"], "result": request["params"], "error": null}),
                    "Fail" => json!({"id": request["id"], "result": null, "error": "boom"}),
                    _ => continue,
                };
                let mut out = serde_json::to_vec(&reply).unwrap();
                out.push(b'\n');
                write.write_all(&out).await.unwrap();
            }
        });
    }

    #[tokio::test]
    async fn routes_replies_to_their_calls() {
        let (near, far) = tokio::io::duplex(4096);
        spawn_peer(far);
        let session = RpcSession::new(near);

        let first = session.go("Echo", json!({"n": 1})).await;
        let second = session.go("Echo", json!({"n": 2})).await;
        assert_eq!(second.await.unwrap(), json!({"n": 2}));
        assert_eq!(first.await.unwrap(), json!({"n": 1}));
    }

    #[tokio::test]
    async fn remote_error_is_passed_through() {
        let (near, far) = tokio::io::duplex(4096);
        spawn_peer(far);
        let session = RpcSession::new(near);

        match session.go("Fail", Value::Null).await.await {
            Err(Error::Remote(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_fails_pending_and_later_calls_with_shutdown() {
        let (near, far) = tokio::io::duplex(4096);
        spawn_peer(far);
        let session = RpcSession::new(near);

        let hanging = session.go("Hang", Value::Null).await;
        session.close().await.unwrap();

        assert!(hanging.await.unwrap_err().is_shutdown());
        assert!(session.go("Echo", Value::Null).await.await.unwrap_err().is_shutdown());
        assert!(session.close().await.unwrap_err().is_shutdown());
    }

    #[tokio::test]
    async fn peer_hangup_fails_in_flight_with_transport_error() {
        let (near, far) = tokio::io::duplex(4096);
        let session = RpcSession::new(near);

        let in_flight = session.go("Echo", Value::Null).await;
        let mut far = BufReader::new(far);
        let mut request = String::new();
        far.read_line(&mut request).await.unwrap();
        drop(far);

        match in_flight.await {
            Err(Error::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(session.go("Echo", Value::Null).await.await.unwrap_err().is_shutdown());
        assert!(session.close().await.unwrap_err().is_shutdown());
    }

    #[tokio::test]
    async fn close_does_not_wait_for_a_stuck_write() {
        let (near, _far) = tokio::io::duplex(64);
        let session = RpcSession::new(near);

        // The far end never reads, so this frame can never be written out.
        let stuck = session.go("Echo", json!("x".repeat(4096))).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stuck.is_done());

        tokio::time::timeout(Duration::from_secs(2), session.close())
            .await
            .expect("close should not block behind the stuck write")
            .unwrap();
        assert!(stuck.await.unwrap_err().is_shutdown());
    }

    #[tokio::test]
    async fn write_failure_severs_the_session() {
        let session = RpcSession::new(BrokenPipe);

        let first = session.go("Echo", json!(1)).await;
        let second = session.go("Echo", json!(2)).await;
        for call in [first, second] {
            match call.await {
                Err(Error::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
                other => panic!("unexpected result: {other:?}"),
            }
        }

        assert!(session.go("Echo", Value::Null).await.await.unwrap_err().is_shutdown());
        assert!(session.close().await.unwrap_err().is_shutdown());
    }
}
