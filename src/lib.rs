mod message;
mod network;
mod service;

pub use message::{Header, Message, WireTag, HEADER_LEN, WORD_LEN};
pub use network::{Connection, ConnectionRef, FrameReader, FrameWriter, MessageQueue};
pub use service::{
    setup_local_tracing, setup_tracing, AnnounceHandler, AppError, AppResult, Client,
    NetworkConfig, Registry, Server, ServerConfig, ServerHandler,
    BASE_CONNECTION_ID, DEFAULT_MAX_FRAME_WORDS, DEFAULT_PORT, SERVER_ID,
};
