use clap::Parser;
use tracing::{error, info};

use netframe::{setup_local_tracing, AnnounceHandler, AppResult, Server, ServerConfig, WireTag};

/// The demo protocol: one tag per role.
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
    /// path to config file
    #[arg(short, long)]
    conf: Option<String>,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    setup_local_tracing()?;

    let commandline = CommandLine::parse();
    let config = match &commandline.conf {
        Some(path) => ServerConfig::set_up_config(path)?,
        None => ServerConfig::default(),
    };

    let mut server = Server::bind(&config, AnnounceHandler::new(Protocol::Server)).await?;
    info!("[SERVER] Started!");

    tokio::select! {
        res = server.run() => {
            if let Err(err) = res {
                error!("server terminated: {}", err);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("get shutdown signal");
        }
    }

    Ok(())
}
