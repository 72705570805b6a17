use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::message::{Message, WireTag};
use crate::network::{FrameReader, FrameWriter, MessageQueue};

/// One I/O loop's view of the connection-wide shutdown broadcast.
///
/// The signal latches: the write loop selects on it at two points per
/// iteration, and both must keep resolving after `disconnect` has fired.
#[derive(Debug)]
struct ShutdownListener {
    signal: Option<broadcast::Receiver<()>>,
}

impl ShutdownListener {
    fn new(signal: broadcast::Receiver<()>) -> ShutdownListener {
        ShutdownListener {
            signal: Some(signal),
        }
    }

    async fn recv(&mut self) {
        if let Some(receiver) = &mut self.signal {
            let _ = receiver.recv().await;
            self.signal = None;
        }
    }
}

/// Shared handle to a connection, retained across task boundaries.
pub type ConnectionRef<T> = Arc<Connection<T>>;

/// One framed TCP connection.
///
/// A connection owns its socket and runs two independent loops once started:
/// a read loop that pushes completed messages into the inbound queue, and a
/// write loop that drains the owning queue's outbound FIFO. Each direction
/// has exactly one outstanding operation at a time.
///
/// The owning queue carries the connection's outbound traffic. Inbound
/// messages land in `inbound`, which a server shares across all of its
/// connections and a client points back at its own queue.
#[derive(Debug)]
pub struct Connection<T: WireTag> {
    id: u64,
    queue: Arc<MessageQueue<T>>,
    inbound: Arc<MessageQueue<T>>,
    open: AtomicBool,
    started: AtomicBool,
    notify_shutdown: broadcast::Sender<()>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    io_tasks: Mutex<Vec<JoinHandle<()>>>,
    max_frame_words: u64,
}

impl<T: WireTag> Connection<T> {
    /// Wraps `socket` in a connection with the given immutable identity.
    ///
    /// The connection is open but idle until [`Connection::start`] spawns its
    /// I/O loops, so messages can be queued ahead of the first transmission.
    pub fn new(
        id: u64,
        socket: TcpStream,
        queue: Arc<MessageQueue<T>>,
        inbound: Arc<MessageQueue<T>>,
        max_frame_words: u64,
    ) -> ConnectionRef<T> {
        let (reader, writer) = socket.into_split();
        let (notify_shutdown, _) = broadcast::channel(1);
        Arc::new(Connection {
            id,
            queue,
            inbound,
            open: AtomicBool::new(true),
            started: AtomicBool::new(false),
            notify_shutdown,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            io_tasks: Mutex::new(Vec::with_capacity(2)),
            max_frame_words,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn queue(&self) -> &Arc<MessageQueue<T>> {
        &self.queue
    }

    /// Queues `message` for transmission; dropped if the connection is
    /// closed.
    pub fn write_message(&self, message: Message<T>) {
        if !self.is_open() {
            debug!("connection {}: dropping write on closed connection", self.id);
            return;
        }
        self.queue.push_out(message);
    }

    /// Spawns the read and write loops. Subsequent calls are no-ops, as are
    /// calls on a connection that was disconnected before ever starting.
    pub fn start(self: &Arc<Self>) {
        if !self.is_open() || self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let reader = self.reader.lock().take();
        let writer = self.writer.lock().take();
        let (Some(reader), Some(writer)) = (reader, writer) else {
            return;
        };
        let read_task = tokio::spawn(read_loop(
            Arc::clone(self),
            reader,
            ShutdownListener::new(self.notify_shutdown.subscribe()),
        ));
        let write_task = tokio::spawn(write_loop(
            Arc::clone(self),
            writer,
            ShutdownListener::new(self.notify_shutdown.subscribe()),
        ));
        self.io_tasks.lock().extend([read_task, write_task]);
    }

    /// Shuts the connection down; idempotent.
    ///
    /// The first call marks the connection closed and signals both loops,
    /// which drop their socket halves on exit. Any operation in flight ends
    /// with the signal or a socket error and is not reissued. Repeated calls
    /// only log.
    pub fn disconnect(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("connection {}: disconnecting", self.id);
            // no receivers only means the loops already exited
            let _ = self.notify_shutdown.send(());
        } else {
            debug!("connection {}: disconnect on already closed connection", self.id);
        }
    }

    /// Waits for both I/O loops to finish.
    ///
    /// After this returns, nothing mutates the connection's queues anymore.
    pub async fn closed(&self) {
        let tasks: Vec<JoinHandle<()>> = self.io_tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl<T: WireTag> Drop for Connection<T> {
    fn drop(&mut self) {
        debug!("connection {} dropped", self.id);
    }
}

async fn read_loop<T: WireTag>(
    connection: ConnectionRef<T>,
    mut reader: OwnedReadHalf,
    mut shutdown: ShutdownListener,
) {
    let mut frames: FrameReader<T> = FrameReader::new(connection.max_frame_words);
    loop {
        // FrameReader keeps its cursors across a cancelled read, so losing
        // the race to the shutdown arm cannot desynchronize the stream.
        let result = tokio::select! {
            res = frames.read_message(&mut reader) => res,
            _ = shutdown.recv() => break,
        };
        match result {
            Ok(Some(message)) => connection.inbound.push_in(message),
            Ok(None) => {
                debug!("connection {}: peer closed the stream", connection.id);
                connection.disconnect();
                break;
            }
            Err(e) => {
                error!("connection {}: read failed: {}", connection.id, e);
                connection.disconnect();
                break;
            }
        }
    }
}

async fn write_loop<T: WireTag>(
    connection: ConnectionRef<T>,
    mut writer: OwnedWriteHalf,
    mut shutdown: ShutdownListener,
) {
    let mut frames = FrameWriter::new();
    loop {
        tokio::select! {
            _ = connection.queue.wait_out() => {}
            _ = shutdown.recv() => break,
        }
        // peek, not pop: the message stays queued until fully transmitted
        let message = match connection.queue.peek_out() {
            Ok(message) => message,
            Err(_) => continue,
        };
        let result = tokio::select! {
            res = frames.write_message(&mut writer, &message) => res,
            _ = shutdown.recv() => break,
        };
        match result {
            Ok(()) => connection.queue.pop_out(),
            Err(e) => {
                error!("connection {}: write failed: {}", connection.id, e);
                connection.disconnect();
                break;
            }
        }
    }
}
