//! Serves one persistent REPL session over a Unix socket.
//!
//! Each connection carries one newline-terminated JSON request (`code`, `set` or `get`)
//! and receives one JSON response before the server closes it. Connections are served
//! strictly one at a time against the same namespace, so state persists across them.

pub mod client;
pub mod config;
pub mod handler;
pub mod protocol;
pub mod server;

pub use crate::{
    client::{Client, ClientError, wait_ready, write_init_payload},
    config::{ConfigError, ServerConfig, socket_path_from_env},
    handler::{MAX_FRAME_BYTES, dispatch, handle_connection},
    protocol::{ProtocolError, Request, Response},
    server::{Server, ServerError, run, shutdown_signal},
};
