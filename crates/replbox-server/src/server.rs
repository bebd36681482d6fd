//! The accept loop: one listener, one session, connections served strictly in order.

use std::{
    fmt, fs,
    future::Future,
    io,
    path::{Path, PathBuf},
};

use replbox::{InitPayloadError, Namespace, ReplSession, load_init_payload};
use tokio::{
    net::UnixListener,
    signal::unix::{SignalKind, signal},
};
use tracing::{error, info, warn};

use crate::{config::ServerConfig, handler::handle_connection};

/// Failure to start serving.
#[derive(Debug)]
pub enum ServerError {
    Io(io::Error),
    Init(InitPayloadError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Init(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Init(err) => Some(err),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<InitPayloadError> for ServerError {
    fn from(err: InitPayloadError) -> Self {
        Self::Init(err)
    }
}

/// A bound server owning the process's one session.
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    session: ReplSession,
}

impl Server {
    /// Clears a stale socket file, builds the session (consuming any pre-seed payload)
    /// and binds the listener. Must be called inside a tokio runtime.
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        remove_socket_file(&config.socket_path)?;
        let namespace = match &config.init_path {
            Some(path) => load_init_payload(path)?.unwrap_or_default(),
            None => Namespace::new(),
        };
        let listener = UnixListener::bind(&config.socket_path)?;
        info!("repl-box listening on {}", config.socket_path.display());
        Ok(Self {
            listener,
            socket_path: config.socket_path.clone(),
            session: ReplSession::with_namespace(namespace, replbox::DEFAULT_SCRIPT_NAME),
        })
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accepts and serves connections one at a time until `shutdown` resolves.
    ///
    /// Shutdown is only observed between connections, so a running snippet is never cut
    /// short. On return the listener is closed and the socket file removed. A failing
    /// connection is logged and skipped; a failing `accept` ends the loop with its error.
    pub async fn serve(mut self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break Ok(()),
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        if let Err(err) = handle_connection(stream, &mut self.session).await {
                            warn!(error = %err, "connection failed");
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "accept failed");
                        break Err(err);
                    }
                },
            }
        };
        info!("Shutting down ({})", self.socket_path.display());
        drop(self.listener);
        remove_socket_file(&self.socket_path)?;
        result
    }
}

fn remove_socket_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Resolves on the first SIGINT or SIGTERM. Must be called inside a tokio runtime.
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

/// Binds according to `config` and serves until SIGINT or SIGTERM.
pub async fn run(config: &ServerConfig) -> Result<(), ServerError> {
    let server = Server::bind(config)?;
    let shutdown = shutdown_signal()?;
    server.serve(shutdown).await?;
    Ok(())
}
