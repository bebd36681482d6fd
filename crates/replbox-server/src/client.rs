//! A blocking client for the server, for use from ordinary (non-async) code.

use std::{
    fmt, fs,
    io::{self, BufRead, BufReader, Write},
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use base64::{Engine, prelude::BASE64_STANDARD};
use replbox::{CodecError, Value, decode, encode_mapping, prepare_variables};

use crate::protocol::{Request, Response};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    /// The server's reply was not a response frame.
    Protocol(serde_json::Error),
    Codec(CodecError),
    Base64(base64::DecodeError),
    /// The server reported an error; carries its `error` text.
    Remote(String),
    /// `get` of a name the server's namespace does not bind.
    NotFound(String),
    /// The server did not become ready in time.
    Timeout { path: PathBuf, timeout: Duration },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Protocol(err) => write!(f, "invalid response: {err}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Base64(err) => write!(f, "invalid base64 value: {err}"),
            Self::Remote(error) => f.write_str(error),
            Self::NotFound(name) => write!(f, "NameError: name '{name}' is not defined"),
            Self::Timeout { path, timeout } => write!(
                f,
                "repl-box server at {} did not start within {:.1}s",
                path.display(),
                timeout.as_secs_f64()
            ),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Base64(err) => Some(err),
            Self::Remote(_) | Self::NotFound(_) | Self::Timeout { .. } => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err)
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<base64::DecodeError> for ClientError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err)
    }
}

/// Talks to one server socket; every call is its own connection.
#[derive(Debug, Clone)]
pub struct Client {
    socket_path: PathBuf,
}

impl Client {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends one request and reads the response frame.
    pub fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path)?;
        stream.write_all(&request.to_frame())?;
        let mut frame = Vec::new();
        BufReader::new(&stream).read_until(b'\n', &mut frame)?;
        Ok(Response::from_frame(&frame)?)
    }

    /// Runs `code` and returns the response as is, errors included.
    pub fn send(&self, code: &str) -> Result<Response, ClientError> {
        self.request(&Request::Code(code.to_owned()))
    }

    /// Runs `code`, turning a reported error into [`ClientError::Remote`].
    pub fn execute(&self, code: &str) -> Result<Response, ClientError> {
        let mut response = self.send(code)?;
        match response.error.take() {
            Some(error) => Err(ClientError::Remote(error)),
            None => Ok(response),
        }
    }

    /// Binds variables in the server's namespace, sanitizing functions first.
    pub fn set(&self, variables: impl IntoIterator<Item = (String, Value)>) -> Result<(), ClientError> {
        let payload = encode_mapping(prepare_variables(variables))?;
        let response = self.request(&Request::Set(BASE64_STANDARD.encode(payload)))?;
        match response.error {
            Some(error) => Err(ClientError::Remote(error)),
            None => Ok(()),
        }
    }

    /// Fetches and decodes a variable from the server's namespace.
    pub fn get(&self, name: &str) -> Result<Value, ClientError> {
        let response = self.request(&Request::Get(name.to_owned()))?;
        if let Some(error) = response.error {
            return Err(if Response::not_found(name).error.as_ref() == Some(&error) {
                ClientError::NotFound(name.to_owned())
            } else {
                ClientError::Remote(error)
            });
        }
        let encoded = response
            .value
            .flatten()
            .ok_or_else(|| ClientError::Remote("response carried no value".to_owned()))?;
        Ok(decode(&BASE64_STANDARD.decode(encoded)?)?)
    }
}

/// Polls until a server is accepting connections on `path`.
pub fn wait_ready(path: &Path, timeout: Duration) -> Result<(), ClientError> {
    let deadline = Instant::now() + timeout;
    loop {
        if path.exists() && UnixStream::connect(path).is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ClientError::Timeout {
                path: path.to_owned(),
                timeout,
            });
        }
        thread::sleep(READY_POLL_INTERVAL);
    }
}

/// Writes a pre-seed payload for a server about to start, sanitizing functions first.
pub fn write_init_payload(
    path: &Path,
    variables: impl IntoIterator<Item = (String, Value)>,
) -> Result<(), ClientError> {
    fs::write(path, encode_mapping(prepare_variables(variables))?)?;
    Ok(())
}
