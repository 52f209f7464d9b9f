//! Connection (C2) — one task pair per peer: a read loop that decodes
//! frames and hands them to the [`Router`], and a writer task that drains a
//! bounded outbound queue so concurrent `send` calls never interleave bytes
//! on the wire (§4.2's single-writer guarantee).
//!
//! Generic over the transport (`AsyncRead + AsyncWrite`) so the same code
//! runs over a real `TcpStream` in production and over an in-memory
//! `tokio::io::duplex` pipe in `tests/scenarios.rs` — no real sockets
//! needed to exercise the router end to end.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{watch, Notify, RwLock as AsyncRwLock};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, warn};

use crate::codec::Frame;
use crate::error::RelayError;
use crate::registry::Registry;
use crate::router::Router;

/// Every connection gets a process-unique id so the router and registry can
/// tell "this connection" apart from "some other connection at the same
/// address" across reconnects.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    fn next() -> Self {
        ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The one-way classification state machine from §4.2:
/// `Unregistered -> Client` or `Unregistered -> Neighbour`, never both, never
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnClass {
    Unregistered = 0,
    Client = 1,
    Neighbour = 2,
}

impl ConnClass {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnClass::Client,
            2 => ConnClass::Neighbour,
            _ => ConnClass::Unregistered,
        }
    }
}

struct ClassCell(AtomicU8);

impl ClassCell {
    fn new() -> Self {
        Self(AtomicU8::new(ConnClass::Unregistered as u8))
    }

    fn get(&self) -> ConnClass {
        ConnClass::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts the one-way transition out of `Unregistered`. Returns `true`
    /// iff this call performed the transition (i.e. the connection really
    /// was unclassified a moment ago).
    fn classify(&self, target: ConnClass) -> bool {
        self.0
            .compare_exchange(
                ConnClass::Unregistered as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// What actually sits in the outbound queue. Keepalive pings/pongs aren't
/// part of the OLAF schema (§4.1 has no such type), so they're kept out of
/// `Frame` entirely and carried as a sibling variant here instead — a
/// connection-layer concern, not a protocol one.
enum OutboundItem {
    Frame(Frame),
    RawLine(&'static str),
}

impl OutboundItem {
    fn to_wire_line(&self) -> String {
        match self {
            OutboundItem::Frame(frame) => frame.encode(),
            OutboundItem::RawLine(s) => s.to_string(),
        }
    }

    /// Roster/admin frames are coalesceable under back-pressure (§5); chat
    /// frames and keepalive lines are not.
    fn is_coalesceable(&self) -> bool {
        matches!(
            self,
            OutboundItem::Frame(Frame::ClientList { .. }) | OutboundItem::Frame(Frame::ClientUpdate { .. })
        )
    }
}

struct OutboundQueue {
    items: AsyncRwLock<VecDeque<OutboundItem>>,
    notify: Notify,
    capacity: usize,
    closed: std::sync::atomic::AtomicBool,
    /// Set the moment `close()` is first called, so the writer task can
    /// bound how long it keeps draining queued items before forcing the
    /// transport down (§5 "Cancellation").
    closed_at: std::sync::OnceLock<Instant>,
}

/// What an enqueue attempt decided to do under back-pressure.
enum EnqueueOutcome {
    Queued,
    /// The connection should be closed: a neighbour's queue overflowed, or
    /// a client's queue was full of un-droppable chat frames (§5).
    MustClose,
    Closed,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: AsyncRwLock::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: std::sync::atomic::AtomicBool::new(false),
            closed_at: std::sync::OnceLock::new(),
        }
    }

    async fn enqueue(&self, item: OutboundItem, is_neighbour: bool) -> EnqueueOutcome {
        if self.closed.load(Ordering::Acquire) {
            return EnqueueOutcome::Closed;
        }
        let mut items = self.items.write().await;
        if items.len() < self.capacity {
            items.push_back(item);
            drop(items);
            self.notify.notify_one();
            return EnqueueOutcome::Queued;
        }

        if is_neighbour {
            // Overflow for a neighbour link closes it; the dialer reconnects (§5).
            return EnqueueOutcome::MustClose;
        }

        // Client overflow policy: drop the oldest coalesceable item to make
        // room. If none exists (the queue is all chat frames), close.
        if let Some(pos) = items.iter().position(OutboundItem::is_coalesceable) {
            items.remove(pos);
            items.push_back(item);
            drop(items);
            self.notify.notify_one();
            EnqueueOutcome::Queued
        } else {
            EnqueueOutcome::MustClose
        }
    }

    async fn dequeue(&self) -> Option<OutboundItem> {
        loop {
            {
                let mut items = self.items.write().await;
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.closed_at.set(Instant::now());
        self.notify.notify_waiters();
    }
}

/// A cheap-to-clone, non-owning handle to a connection. The Registry stores
/// these (never the connection task itself) and uses them to decide "who
/// may I send to now" (§3).
#[derive(Clone)]
pub struct ConnHandle {
    pub id: ConnId,
    pub label: Arc<str>,
    class: Arc<ClassCell>,
    outbound: Arc<OutboundQueue>,
    /// Tripped by `close()` so the reader task's loop can be cancelled even
    /// while blocked on a transport read that may never yield EOF (§4.2
    /// Termination, §5 Cancellation) — a protocol violation or a shutdown
    /// both need to stop the read loop without waiting on the peer.
    cancel: Arc<watch::Sender<bool>>,
}

impl PartialEq for ConnHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ConnHandle {}

impl std::fmt::Debug for ConnHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("class", &self.class.get())
            .finish()
    }
}

impl ConnHandle {
    pub fn class(&self) -> ConnClass {
        self.class.get()
    }

    /// Attempts the connection's one-way classification transition.
    /// Returns `false` if the connection was already classified (§4.2,
    /// §4.3 I3).
    pub fn try_classify(&self, target: ConnClass) -> bool {
        self.class.classify(target)
    }

    /// Enqueues a frame for delivery, applying §5's back-pressure policy.
    /// Returns `Err` if the caller should now close this connection.
    pub async fn send(&self, frame: Frame) -> Result<(), RelayError> {
        let is_neighbour = matches!(self.class(), ConnClass::Neighbour);
        match self.outbound.enqueue(OutboundItem::Frame(frame), is_neighbour).await {
            EnqueueOutcome::Queued => Ok(()),
            EnqueueOutcome::MustClose | EnqueueOutcome::Closed => {
                Err(RelayError::PeerGone(self.label.to_string()))
            }
        }
    }

    async fn send_keepalive(&self, line: &'static str) -> Result<(), RelayError> {
        let is_neighbour = matches!(self.class(), ConnClass::Neighbour);
        match self.outbound.enqueue(OutboundItem::RawLine(line), is_neighbour).await {
            EnqueueOutcome::Queued => Ok(()),
            EnqueueOutcome::MustClose | EnqueueOutcome::Closed => {
                Err(RelayError::PeerGone(self.label.to_string()))
            }
        }
    }

    pub fn close(&self) {
        self.outbound.close();
        let _ = self.cancel.send(true);
    }
}

const OUTBOUND_QUEUE_CAPACITY: usize = 256;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long the writer task keeps draining an already-closed outbound
/// queue before forcing the transport down regardless of what's left in
/// it (§5 "Cancellation": "drains its outbound queue with a bounded
/// deadline; after the deadline the transport is forcibly torn down").
pub const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Spawns the reader and writer tasks for one accepted or dialed transport
/// stream. Returns immediately; the connection runs until the peer closes,
/// the keepalive probe times out, or `handle.close()` is called.
pub fn spawn<T>(stream: T, label: impl Into<Arc<str>>, registry: Arc<Registry>, router: Arc<Router>) -> ConnHandle
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let label: Arc<str> = label.into();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let handle = ConnHandle {
        id: ConnId::next(),
        label: label.clone(),
        class: Arc::new(ClassCell::new()),
        outbound: Arc::new(OutboundQueue::new(OUTBOUND_QUEUE_CAPACITY)),
        cancel: Arc::new(cancel_tx),
    };

    tokio::spawn(writer_task(write_half, handle.outbound.clone(), label.clone()));
    tokio::spawn(reader_task(read_half, handle.clone(), registry, router, cancel_rx));

    handle
}

async fn writer_task<W: AsyncWrite + Unpin>(mut write_half: W, outbound: Arc<OutboundQueue>, label: Arc<str>) {
    loop {
        let next = match outbound.closed_at.get() {
            Some(closed_at) => match timeout_at(*closed_at + DRAIN_DEADLINE, outbound.dequeue()).await {
                Ok(item) => item,
                Err(_) => {
                    warn!(peer = %label, "drain deadline exceeded, forcing connection teardown");
                    None
                }
            },
            None => outbound.dequeue().await,
        };
        let Some(item) = next else { break };
        let mut line = item.to_wire_line();
        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            warn!(peer = %label, error = %e, "write failed, tearing down connection");
            outbound.close();
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

async fn reader_task<R: AsyncRead + Unpin>(
    read_half: R,
    handle: ConnHandle,
    registry: Arc<Registry>,
    router: Arc<Router>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut lines = BufReader::new(read_half).lines();
    let mut next_ping_at = Instant::now() + KEEPALIVE_INTERVAL;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let wake_at = pong_deadline.unwrap_or(next_ping_at);
        tokio::select! {
            _ = cancel_rx.changed() => {
                debug!(peer = %handle.label, "connection cancelled, stopping read loop");
                break;
            }
            line = lines.next_line() => {
                let Ok(maybe_line) = line else {
                    debug!(peer = %handle.label, "read error, closing");
                    break;
                };
                let Some(raw) = maybe_line else {
                    debug!(peer = %handle.label, "peer closed the stream");
                    break;
                };
                if raw.trim().is_empty() {
                    continue;
                }
                if handle_keepalive_frame(&raw, &handle, &mut pong_deadline, &mut next_ping_at).await {
                    continue;
                }

                let first_frame = matches!(handle.class(), ConnClass::Unregistered);
                match Frame::decode(&raw) {
                    Ok(frame) => {
                        router.route(handle.clone(), frame).await;
                    }
                    Err(e) => {
                        warn!(peer = %handle.label, error = %e, "malformed frame");
                        let _ = handle.send(Frame::error(e.wire_message())).await;
                        if first_frame {
                            break;
                        }
                    }
                }
            }
            _ = sleep_until(wake_at) => {
                if pong_deadline.is_some() {
                    warn!(peer = %handle.label, "keepalive timed out, closing connection");
                    break;
                }
                if handle.send_keepalive("{\"type\":\"__ping__\"}").await.is_err() {
                    break;
                }
                pong_deadline = Some(Instant::now() + KEEPALIVE_TIMEOUT);
            }
        }
    }

    handle.close();
    registry.remove_conn_and_gossip(&handle, &router).await;
    router.forget_conn(handle.id).await;
}

/// Intercepts the transport-level liveness side-channel before frames reach
/// the codec. Returns `true` if the line was a ping/pong and has already
/// been handled.
async fn handle_keepalive_frame(
    raw: &str,
    handle: &ConnHandle,
    pong_deadline: &mut Option<Instant>,
    next_ping_at: &mut Instant,
) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return false;
    };
    match value.get("type").and_then(Value::as_str) {
        Some("__ping__") => {
            let _ = handle.send_keepalive("{\"type\":\"__pong__\"}").await;
            true
        }
        Some("__pong__") => {
            *pong_deadline = None;
            *next_ping_at = Instant::now() + KEEPALIVE_INTERVAL;
            true
        }
        _ => false,
    }
}
