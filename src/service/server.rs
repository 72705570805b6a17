use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::message::{Message, WireTag};
use crate::network::{Connection, ConnectionRef, MessageQueue};
use crate::service::{AppError, AppResult, ServerConfig, ServerHandler};

/// First identity handed out; ids grow monotonically and are never reused
/// within a process lifetime.
pub const BASE_CONNECTION_ID: u64 = 1000;

/// The live-connection registry: connection id to connection handle.
///
/// Confined to the server task, which is the sole mutator, so no lock is
/// needed. Every entry refers to a socket that is open or being torn down.
#[derive(Debug, Default)]
pub struct Registry<T: WireTag> {
    connections: HashMap<u64, ConnectionRef<T>>,
}

impl<T: WireTag> Registry<T> {
    pub fn new() -> Registry<T> {
        Registry {
            connections: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection: ConnectionRef<T>) {
        self.connections.insert(connection.id(), connection);
    }

    pub fn remove(&mut self, id: u64) -> Option<ConnectionRef<T>> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<&ConnectionRef<T>> {
        self.connections.get(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRef<T>> {
        self.connections.values()
    }

    /// Queues `message` on every open connection. Connections found closed
    /// during the pass are disconnected, removed, and returned so the caller
    /// can run its disconnect hook.
    ///
    /// Each connection's write is independently scheduled; a broadcast is
    /// not atomic across peers.
    pub fn broadcast(&mut self, message: &Message<T>) -> Vec<ConnectionRef<T>> {
        let mut dead_ids = Vec::new();
        for (id, connection) in &self.connections {
            if connection.is_open() {
                connection.write_message(message.clone());
            } else {
                dead_ids.push(*id);
            }
        }

        let mut pruned = Vec::with_capacity(dead_ids.len());
        for id in dead_ids {
            if let Some(connection) = self.connections.remove(&id) {
                connection.disconnect();
                debug!("pruned dead connection {}", id);
                pruned.push(connection);
            }
        }
        pruned
    }
}

enum Event<T: WireTag> {
    Accepted(TcpStream),
    Inbound(Message<T>),
}

/// Accepts inbound connections, assigns identities, and dispatches inbound
/// messages to the injected [`ServerHandler`].
#[derive(Debug)]
pub struct Server<T: WireTag, H: ServerHandler<T>> {
    listener: TcpListener,
    handler: H,
    queue: Arc<MessageQueue<T>>,
    registry: Registry<T>,
    next_id: u64,
    max_frame_words: u64,
}

impl<T: WireTag, H: ServerHandler<T>> Server<T, H> {
    /// Binds the listening socket and readies the server to run.
    pub async fn bind(config: &ServerConfig, handler: H) -> AppResult<Server<T, H>> {
        let listen_address = format!("{}:{}", config.network.ip, config.network.port);
        let listener = TcpListener::bind(&listen_address).await.map_err(|e| {
            AppError::DetailedIoError(format!(
                "failed to bind server to address: {} - {}",
                listen_address, e
            ))
        })?;
        info!("tcp server binding to {} for listening", listen_address);
        Ok(Server {
            listener,
            handler,
            queue: Arc::new(MessageQueue::new()),
            registry: Registry::new(),
            next_id: BASE_CONNECTION_ID,
            max_frame_words: config.network.max_frame_words,
        })
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared inbound queue all server-side connections push into.
    pub fn queue(&self) -> &Arc<MessageQueue<T>> {
        &self.queue
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Runs the accept and dispatch loops until the task is dropped.
    ///
    /// A single `select!` drives both concerns: new sockets go through the
    /// connect hook, and the dispatch arm blocks on the shared inbound queue
    /// (a condition-signalled wait, not a poll) and hands each message to
    /// the handler.
    pub async fn run(&mut self) -> AppResult<()> {
        let queue = Arc::clone(&self.queue);
        loop {
            let event = tokio::select! {
                socket = Self::accept(&self.listener) => Event::Accepted(socket),
                message = queue.recv_in() => Event::Inbound(message),
            };
            match event {
                Event::Accepted(socket) => self.handle_accept(socket),
                Event::Inbound(message) => self.handler.on_message(message),
            }
        }
    }

    fn handle_accept(&mut self, socket: TcpStream) {
        let id = self.next_id;
        self.next_id += 1;
        let connection = Connection::new(
            id,
            socket,
            Arc::new(MessageQueue::new()),
            Arc::clone(&self.queue),
            self.max_frame_words,
        );
        debug!("accepted new connection {}", id);
        self.handler.on_connect(connection, &mut self.registry);
    }

    /// Accepts the next connection, retrying failures with capped
    /// exponential backoff; accept errors never terminate the server.
    async fn accept(listener: &TcpListener) -> TcpStream {
        let mut backoff = 1;

        loop {
            match listener.accept().await {
                Ok((socket, _)) => return socket,
                Err(err) => {
                    error!("accept failed: {}", err);
                    time::sleep(Duration::from_secs(backoff)).await;
                    if backoff < 64 {
                        backoff *= 2;
                    }
                }
            }
        }
    }
}

impl<T: WireTag, H: ServerHandler<T>> Drop for Server<T, H> {
    fn drop(&mut self) {
        debug!("tcp server dropped");
    }
}
