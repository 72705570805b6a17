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

use tracing::info;

use crate::message::{Message, WireTag};
use crate::network::ConnectionRef;
use crate::service::server::Registry;

/// Sender id the server stamps into messages it originates.
pub const SERVER_ID: u64 = 0;

/// Capability interface a server application injects to react to connection
/// lifecycle events and inbound messages.
///
/// All hooks run on the server task, which solely owns the registry, so they
/// may mutate it freely.
pub trait ServerHandler<T: WireTag>: Send {
    /// Invoked for every accepted connection. The minimal obligation is to
    /// start the connection reading and register it.
    fn on_connect(&mut self, connection: ConnectionRef<T>, registry: &mut Registry<T>) {
        connection.start();
        registry.insert(connection);
    }

    /// Invoked when a registered connection is identified as dead. A stub by
    /// default, left to the owning application to specialize.
    fn on_disconnect(&mut self, _connection: &ConnectionRef<T>, _registry: &mut Registry<T>) {}

    /// Invoked for every message popped from the shared inbound queue.
    fn on_message(&mut self, _message: Message<T>) {}
}

/// The stock connect behavior: announce every new peer's identity.
///
/// On connect it sends the new connection a message whose body is its
/// assigned id, starts it reading, broadcasts the same announcement to every
/// registered connection (pruning any found dead during the pass), and
/// finally registers the newcomer.
#[derive(Debug)]
pub struct AnnounceHandler<T: WireTag> {
    tag: T,
}

impl<T: WireTag> AnnounceHandler<T> {
    /// `tag` is stamped on every announcement message.
    pub fn new(tag: T) -> AnnounceHandler<T> {
        AnnounceHandler { tag }
    }
}

impl<T: WireTag> ServerHandler<T> for AnnounceHandler<T> {
    fn on_connect(&mut self, connection: ConnectionRef<T>, registry: &mut Registry<T>) {
        let announcement = Message::with_body(self.tag, vec![connection.id()])
            .route(SERVER_ID, connection.id());

        connection.write_message(announcement.clone());
        connection.start();

        let pruned = registry.broadcast(&announcement);
        for dead in &pruned {
            self.on_disconnect(dead, registry);
        }

        registry.insert(connection);
        info!("connections = {}", registry.len());
    }
}
