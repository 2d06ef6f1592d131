// wi-core/src/rpc.rs
//! Wire protocol between the editor and plugin processes.
//!
//! Frames are a little-endian `u32` length followed by a JSON encoded
//! [`Message`]. The host writes on the plugin's stdin and reads its stdout.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::EnqueuedCommands;
use crate::supervisor::Supervisor;

include!(concat!(env!("OUT_DIR"), "/fingerprint.rs"));

/// Length of the version token a plugin writes before any frame.
pub const TOKEN_LEN: usize = 64;

/// Environment variable set to [`PLUGIN_ENV_VALUE`] when the editor starts
/// a plugin.
pub const PLUGIN_ENV: &str = "WI";
pub const PLUGIN_ENV_VALUE: &str = "plugin";

pub const MAX_FRAME: usize = 64 << 20;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("frame of {0} bytes is over the limit")]
    FrameTooLarge(usize),
    #[error("connection closed")]
    Closed,
    #[error("remote error: {0}")]
    Remote(String),
    #[error("unexpected reply {0}")]
    UnexpectedReply(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDetails {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorDetails {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    GetInfo { language: String },
    Init { editor: EditorDetails },
    Quit { code: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Info(PluginDetails),
    Done,
}

/// Events crossing the process boundary. `Commands` flows from plugins to
/// the editor, the rest from the editor to plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteEvent {
    Commands(EnqueuedCommands),
    EditorLanguage(String),
    TerminalResized { width: u16, height: u16 },
    WindowCreated { window: String },
    WindowClosed { window: String },
    WindowResized { window: String },
    ViewActivated { window: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Request { id: u64, call: Call },
    Response { id: u64, result: Result<Reply, String> },
    Notification { event: RemoteEvent },
}

pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME {
        return Err(RpcError::FrameTooLarge(payload.len()));
    }
    writer.write_u32_le(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Next message, `None` on a clean end of stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, RpcError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME {
        return Err(RpcError::FrameTooLarge(len));
    }
    let mut payload = vec![0; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

type ReplySender = oneshot::Sender<Result<Reply, RpcError>>;

/// A call in flight; resolves once the plugin answers or the transport dies.
pub type PendingReply = oneshot::Receiver<Result<Reply, RpcError>>;

struct Shared {
    name: String,
    pending: Mutex<HashMap<u64, ReplySender>>,
    closed: AtomicBool,
    failure: Mutex<Option<oneshot::Sender<RpcError>>>,
}

impl Shared {
    // Fail every call in flight and report `err` to the owner, once.
    fn fail(&self, err: RpcError) {
        self.closed.store(true, Ordering::SeqCst);
        for (_, reply) in self.pending.lock().drain() {
            let _ = reply.send(Err(RpcError::Closed));
        }
        if let Some(report) = self.failure.lock().take() {
            debug!(plugin = %self.name, error = %err, "transport failed");
            let _ = report.send(err);
        }
    }
}

/// What the client hands back besides itself: notifications sent by the
/// plugin, and a one-shot transport failure report.
pub struct RpcChannels {
    pub events: mpsc::UnboundedReceiver<RemoteEvent>,
    pub failure: oneshot::Receiver<RpcError>,
}

/// Host side of the connection to one plugin. Calls are multiplexed by id
/// over a single writer task; a reader task routes responses back.
pub struct RpcClient {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RpcClient {
    pub fn start<R, W>(
        name: &str,
        mut reader: R,
        mut writer: W,
        supervisor: &Supervisor,
    ) -> (Self, RpcChannels)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (failure_tx, failure) = oneshot::channel();
        let shared = Arc::new(Shared {
            name: name.to_string(),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            failure: Mutex::new(Some(failure_tx)),
        });
        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
        let (events_tx, events) = mpsc::unbounded_channel();

        let writer_shared = shared.clone();
        let write_task = supervisor.spawn(format!("{name}-rpc-writer"), async move {
            while let Some(msg) = queue.recv().await {
                if let Err(err) = write_message(&mut writer, &msg).await {
                    writer_shared.fail(err);
                    return;
                }
            }
            let _ = writer.shutdown().await;
        });

        let reader_shared = shared.clone();
        let read_task = supervisor.spawn(format!("{name}-rpc-reader"), async move {
            loop {
                match read_message(&mut reader).await {
                    Ok(Some(Message::Response { id, result })) => {
                        let reply = reader_shared.pending.lock().remove(&id);
                        match reply {
                            Some(reply) => {
                                let _ = reply.send(result.map_err(RpcError::Remote));
                            }
                            None => warn!(plugin = %reader_shared.name, id, "response to an unknown call"),
                        }
                    }
                    Ok(Some(Message::Notification { event })) => {
                        let _ = events_tx.send(event);
                    }
                    Ok(Some(Message::Request { id, .. })) => {
                        warn!(plugin = %reader_shared.name, id, "plugins can't call the editor, ignored");
                    }
                    Ok(None) => {
                        reader_shared.fail(RpcError::Closed);
                        return;
                    }
                    Err(err) => {
                        reader_shared.fail(err);
                        return;
                    }
                }
            }
        });

        let client = Self {
            shared,
            next_id: AtomicU64::new(1),
            outgoing: Mutex::new(Some(outgoing)),
            tasks: Mutex::new(vec![write_task, read_task]),
        };
        (client, RpcChannels { events, failure })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn send(&self, msg: Message) -> Result<(), RpcError> {
        match self.outgoing.lock().as_ref() {
            Some(out) => out.send(msg).map_err(|_| RpcError::Closed),
            None => Err(RpcError::Closed),
        }
    }

    /// Send `call` and return right away; the reply arrives on the receiver.
    pub fn go(&self, call: Call) -> Result<PendingReply, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id, tx);
        // A failure racing with the insert above has already drained the map.
        if self.is_closed() || self.send(Message::Request { id, call }).is_err() {
            self.shared.pending.lock().remove(&id);
            return Err(RpcError::Closed);
        }
        Ok(rx)
    }

    pub async fn call(&self, call: Call) -> Result<Reply, RpcError> {
        let pending = self.go(call)?;
        pending.await.unwrap_or(Err(RpcError::Closed))
    }

    pub fn notify(&self, event: RemoteEvent) -> Result<(), RpcError> {
        self.send(Message::Notification { event })
    }

    pub async fn get_info(&self, language: &str) -> Result<PluginDetails, RpcError> {
        match self
            .call(Call::GetInfo {
                language: language.to_string(),
            })
            .await?
        {
            Reply::Info(details) => Ok(details),
            other => Err(RpcError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    pub fn init(&self, editor: EditorDetails) -> Result<PendingReply, RpcError> {
        self.go(Call::Init { editor })
    }

    pub async fn quit(&self, code: i32) -> Result<(), RpcError> {
        self.call(Call::Quit { code }).await.map(|_| ())
    }

    /// Stop both tasks and fail whatever is still pending. Owner initiated,
    /// so nothing is reported on the failure channel.
    pub fn close(&self) {
        self.shared.failure.lock().take();
        self.outgoing.lock().take();
        self.shared.fail(RpcError::Closed);
        for task in self.tasks.lock().drain(..) {
            // The writer exits by itself once the queue is drained.
            if !task.is_finished() {
                task.abort();
            }
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Plugin side of the protocol.
pub trait PluginHandler: Send {
    fn get_info(&mut self, language: &str) -> PluginDetails;

    /// `host` stays valid for the whole session and may be kept.
    fn init(&mut self, editor: &EditorDetails, host: &Host) -> Result<(), String>;

    fn on_event(&mut self, _event: &RemoteEvent, _host: &Host) {}

    fn quit(&mut self, _code: i32) {}
}

/// Lets a plugin push notifications to the editor.
#[derive(Debug, Clone)]
pub struct Host {
    outgoing: mpsc::UnboundedSender<Message>,
}

impl Host {
    pub fn notify(&self, event: RemoteEvent) -> Result<(), RpcError> {
        self.outgoing
            .send(Message::Notification { event })
            .map_err(|_| RpcError::Closed)
    }

    pub fn post_commands(&self, commands: EnqueuedCommands) -> Result<(), RpcError> {
        self.notify(RemoteEvent::Commands(commands))
    }
}

/// Serve `handler` until the editor sends `Quit` or closes the stream.
pub async fn serve<H, R, W>(handler: &mut H, mut reader: R, mut writer: W) -> Result<(), RpcError>
where
    H: PluginHandler,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (outgoing, mut queue) = mpsc::unbounded_channel();
    let host = Host { outgoing };

    let requests = dispatch(handler, &mut reader, host.clone());
    tokio::pin!(requests);
    let outcome = loop {
        tokio::select! {
            outcome = &mut requests => break outcome,
            Some(msg) = queue.recv() => write_message(&mut writer, &msg).await?,
        }
    };

    // Flush replies and notifications queued by the last request.
    queue.close();
    while let Ok(msg) = queue.try_recv() {
        write_message(&mut writer, &msg).await?;
    }
    writer.flush().await?;
    outcome
}

async fn dispatch<H, R>(handler: &mut H, reader: &mut R, host: Host) -> Result<(), RpcError>
where
    H: PluginHandler,
    R: AsyncRead + Unpin,
{
    while let Some(msg) = read_message(reader).await? {
        match msg {
            Message::Request { id, call } => {
                let (result, last) = match call {
                    Call::GetInfo { language } => (Ok(Reply::Info(handler.get_info(&language))), false),
                    Call::Init { editor } => (handler.init(&editor, &host).map(|_| Reply::Done), false),
                    Call::Quit { code } => {
                        handler.quit(code);
                        (Ok(Reply::Done), true)
                    }
                };
                host.outgoing
                    .send(Message::Response { id, result })
                    .map_err(|_| RpcError::Closed)?;
                if last {
                    return Ok(());
                }
            }
            Message::Notification { event } => handler.on_event(&event, &host),
            Message::Response { id, .. } => debug!(id, "stray response ignored"),
        }
    }
    Ok(())
}
