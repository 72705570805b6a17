// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info};

use super::config::DEFAULT_MAX_FRAME_WORDS;
use crate::message::{Message, WireTag};
use crate::network::{Connection, ConnectionRef, MessageQueue};
use crate::service::{AppError, AppResult};

/// Local id a client stamps on its own connection. The server-assigned
/// identity arrives in the announcement message instead.
const CLIENT_CONNECTION_ID: u64 = 0;

/// One outbound connection whose I/O runs independently of the caller.
///
/// `connect` reports success or failure synchronously; afterwards the
/// connection's read and write loops run as background tasks and the caller
/// drains the private message queue at its own pace. Neither sending nor
/// receiving ever blocks the I/O tasks on the caller.
#[derive(Debug)]
pub struct Client<T: WireTag> {
    queue: Arc<MessageQueue<T>>,
    connection: ConnectionRef<T>,
}

impl<T: WireTag> Client<T> {
    /// Resolves `host:port`, connects, and starts the connection's I/O.
    ///
    /// Resolution and connect failures surface here; any partially
    /// constructed state is dropped before returning the error.
    pub async fn connect(host: &str, port: u16) -> AppResult<Client<T>> {
        Self::connect_with(host, port, DEFAULT_MAX_FRAME_WORDS).await
    }

    pub async fn connect_with(
        host: &str,
        port: u16,
        max_frame_words: u64,
    ) -> AppResult<Client<T>> {
        let endpoints: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|e| AppError::Resolution(format!("{}:{}: {}", host, port, e)))?
            .collect();
        if endpoints.is_empty() {
            return Err(AppError::Resolution(format!(
                "{}:{} resolved to no addresses",
                host, port
            )));
        }

        let mut last_error = None;
        let mut stream = None;
        for endpoint in endpoints {
            match TcpStream::connect(endpoint).await {
                Ok(connected) => {
                    debug!("connected to {}", endpoint);
                    stream = Some(connected);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let Some(stream) = stream else {
            return Err(AppError::Connect(format!(
                "{}:{}: {}",
                host,
                port,
                // resolution returned at least one endpoint, so a miss here
                // always carries a connect error
                last_error.map(|e| e.to_string()).unwrap_or_default()
            )));
        };

        let queue = Arc::new(MessageQueue::new());
        let connection = Connection::new(
            CLIENT_CONNECTION_ID,
            stream,
            Arc::clone(&queue),
            Arc::clone(&queue),
            max_frame_words,
        );
        connection.start();
        info!("client connected to {}:{}", host, port);

        Ok(Client { queue, connection })
    }

    /// Queues a message for transmission.
    pub fn send(&self, message: Message<T>) {
        self.connection.write_message(message);
    }

    /// Waits for the next inbound message.
    pub async fn recv(&self) -> Message<T> {
        self.queue.recv_in().await
    }

    /// The private message queue, for peek/pop style draining.
    pub fn queue(&self) -> &Arc<MessageQueue<T>> {
        &self.queue
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// Tears the connection down and waits for both I/O tasks to finish, so
    /// nothing mutates the queue after this returns.
    pub async fn disconnect(&self) {
        self.connection.disconnect();
        self.connection.closed().await;
    }
}
