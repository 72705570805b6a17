use clap::Parser;
use tracing::info;

use netframe::{setup_local_tracing, AppResult, Client, WireTag, DEFAULT_PORT};

/// The demo protocol: one tag per role. Must match the server binary.
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

#[derive(Parser)]
#[command(version)]
struct CommandLine {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    setup_local_tracing()?;

    let commandline = CommandLine::parse();
    let client: Client<Protocol> = Client::connect(&commandline.host, commandline.port).await?;

    loop {
        tokio::select! {
            message = client.recv() => {
                info!("received {} body={:?}", message, message.body());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("get shutdown signal");
                break;
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
