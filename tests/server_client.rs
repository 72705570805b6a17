use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netframe::{
    Client, Message, Registry, Server, ServerConfig, ServerHandler, WireTag, ConnectionRef,
    BASE_CONNECTION_ID, SERVER_ID,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    Server,
    Client,
}

impl WireTag for Protocol {
    fn to_u32(self) -> u32 {
        match self {
            Protocol::Server => 0,
            Protocol::Client => 1,
        }
    }

    fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Protocol::Server),
            1 => Some(Protocol::Client),
            _ => None,
        }
    }
}

/// The stock announce behavior plus counters the tests can observe.
#[derive(Default)]
struct ObservedHandler {
    registry_len: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    messages: Arc<Mutex<Vec<Message<Protocol>>>>,
}

impl ServerHandler<Protocol> for ObservedHandler {
    fn on_connect(&mut self, connection: ConnectionRef<Protocol>, registry: &mut Registry<Protocol>) {
        let announcement = Message::with_body(Protocol::Server, vec![connection.id()])
            .route(SERVER_ID, connection.id());

        connection.write_message(announcement.clone());
        connection.start();

        let pruned = registry.broadcast(&announcement);
        for dead in &pruned {
            self.on_disconnect(dead, registry);
        }

        registry.insert(connection);
        self.registry_len.store(registry.len(), Ordering::SeqCst);
    }

    fn on_disconnect(
        &mut self,
        _connection: &ConnectionRef<Protocol>,
        _registry: &mut Registry<Protocol>,
    ) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message(&mut self, message: Message<Protocol>) {
        self.messages.lock().unwrap().push(message);
    }
}

struct TestServer {
    addr: std::net::SocketAddr,
    registry_len: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    messages: Arc<Mutex<Vec<Message<Protocol>>>>,
}

async fn start_server() -> TestServer {
    let handler = ObservedHandler::default();
    let registry_len = Arc::clone(&handler.registry_len);
    let disconnects = Arc::clone(&handler.disconnects);
    let messages = Arc::clone(&handler.messages);

    let mut config = ServerConfig::default();
    config.network.ip = "127.0.0.1".to_string();
    config.network.port = 0;

    let mut server: Server<Protocol, ObservedHandler> =
        Server::bind(&config, handler).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    TestServer {
        addr,
        registry_len,
        disconnects,
        messages,
    }
}

async fn recv_with_timeout(client: &Client<Protocol>) -> Message<Protocol> {
    tokio::time::timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("timed out waiting for a message")
}

#[tokio::test]
async fn first_client_receives_its_assigned_id() {
    let server = start_server().await;

    let client: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();

    let announcement = recv_with_timeout(&client).await;
    assert_eq!(announcement.tag(), Protocol::Server);
    assert_eq!(announcement.body(), &[BASE_CONNECTION_ID]);
    assert_eq!(announcement.dest_id(), BASE_CONNECTION_ID);
    assert_eq!(announcement.from_id(), SERVER_ID);
    assert_eq!(server.registry_len.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_connect_is_broadcast_to_the_first() {
    let server = start_server().await;

    let first: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    let own_id = recv_with_timeout(&first).await;
    assert_eq!(own_id.body(), &[BASE_CONNECTION_ID]);

    let second: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    let second_announce = recv_with_timeout(&second).await;
    assert_eq!(second_announce.body(), &[BASE_CONNECTION_ID + 1]);

    // the first, still-open client must see the newcomer's announcement
    let broadcast = recv_with_timeout(&first).await;
    assert_eq!(broadcast.body(), &[BASE_CONNECTION_ID + 1]);
    assert_eq!(server.registry_len.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dead_connections_are_pruned_during_broadcast() {
    let server = start_server().await;

    let first: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    recv_with_timeout(&first).await;

    let second: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    recv_with_timeout(&second).await;
    assert_eq!(server.registry_len.load(Ordering::SeqCst), 2);

    // forcibly close the first client and give the server's read loop time
    // to observe the EOF
    first.disconnect().await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let third: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    recv_with_timeout(&third).await;

    // three accepted, one dead and pruned: exactly two registry entries
    assert_eq!(server.registry_len.load(Ordering::SeqCst), 2);
    assert_eq!(server.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn inbound_messages_reach_the_dispatch_hook() {
    let server = start_server().await;

    let client: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    let announcement = recv_with_timeout(&client).await;
    let my_id = announcement.body()[0];

    client.send(Message::with_body(Protocol::Client, vec![7, 8]).route(my_id, SERVER_ID));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        {
            let messages = server.messages.lock().unwrap();
            if let Some(message) = messages.first() {
                assert_eq!(message.tag(), Protocol::Client);
                assert_eq!(message.body(), &[7, 8]);
                assert_eq!(message.from_id(), my_id);
                break;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "server never dispatched the message"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn client_disconnect_is_idempotent_and_final() {
    let server = start_server().await;

    let client: Client<Protocol> = Client::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    recv_with_timeout(&client).await;

    client.disconnect().await;
    client.disconnect().await;
    assert!(!client.is_open());
}

#[tokio::test]
async fn connect_to_closed_port_fails_synchronously() {
    // bind-then-drop yields a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result: Result<Client<Protocol>, _> = Client::connect("127.0.0.1", port).await;
    assert!(result.is_err());
}
