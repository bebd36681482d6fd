//! Connection handling: one request frame in, one response frame out, then close.

use std::io;

use base64::{Engine, prelude::BASE64_STANDARD};
use replbox::{CodecError, ReplSession, Value, codec, sanitize_callable};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};
use tracing::{debug, warn};

use crate::protocol::{Request, Response, encode_frame};

/// Largest request frame accepted, newline included.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Applies one request to the session.
///
/// Never fails: every problem becomes the response's `error`. A failed `set` leaves the
/// namespace exactly as it was.
pub fn dispatch(session: &mut ReplSession, request: Request) -> Response {
    match request {
        Request::Code(code) => {
            let output = session.execute(&code);
            debug!(
                execution = session.execution_count(),
                failed = output.error.is_some(),
                "code request"
            );
            output.into()
        }
        Request::Set(payload) => match decode_set(&payload) {
            Ok(mapping) => {
                debug!(names = mapping.len(), "set request");
                session.merge(mapping);
                Response::ok()
            }
            Err(message) => {
                debug!(%message, "set request rejected");
                Response::failure(message)
            }
        },
        Request::Get(name) => {
            debug!(%name, "get request");
            get(session, &name)
        }
    }
}

/// Decodes the whole batch before anything is merged.
fn decode_set(payload: &str) -> Result<Vec<(String, Value)>, String> {
    let bytes = BASE64_STANDARD
        .decode(payload)
        .map_err(|err| format!("ValueError: invalid base64 payload: {err}"))?;
    codec::decode_mapping(&bytes).map_err(|err| codec_failure(&err))
}

fn get(session: &ReplSession, name: &str) -> Response {
    let Some(value) = session.get_variable(name) else {
        return Response::not_found(name);
    };
    match codec::encode(&sanitize_callable(&value)) {
        Ok(bytes) => Response::value(BASE64_STANDARD.encode(bytes)),
        Err(err) => Response::value_failure(codec_failure(&err)),
    }
}

/// Renders a codec failure the way the matching Python exception would read.
fn codec_failure(err: &CodecError) -> String {
    let exc_type = match err {
        CodecError::Unserializable { .. } => "TypeError",
        CodecError::TooDeep => "RecursionError",
        CodecError::Malformed(_) | CodecError::VersionMismatch { .. } | CodecError::NotAMapping => "ValueError",
    };
    format!("{exc_type}: {err}")
}

/// Serves one connection: reads a frame, dispatches it and writes the response.
///
/// An empty frame, or a peer that closes before sending a newline, gets no response.
pub async fn handle_connection(mut stream: UnixStream, session: &mut ReplSession) -> io::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader).take(MAX_FRAME_BYTES as u64);
    let mut frame = Vec::new();
    reader.read_until(b'\n', &mut frame).await?;

    let response = if frame.last() == Some(&b'\n') {
        frame.pop();
        if frame.is_empty() {
            return Ok(());
        }
        match Request::from_frame(&frame) {
            Ok(request) => dispatch(session, request),
            Err(err) => {
                debug!(error = %err, "rejected frame");
                err.into()
            }
        }
    } else if frame.len() >= MAX_FRAME_BYTES {
        warn!(limit = MAX_FRAME_BYTES, "request frame too large");
        Response::failure(format!("Bad request: frame exceeds {MAX_FRAME_BYTES} bytes"))
    } else {
        return Ok(());
    };

    let bytes = encode_frame(&response).map_err(io::Error::other)?;
    writer.write_all(&bytes).await?;
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use replbox::encode_mapping;

    use super::*;

    fn set_request(mapping: Vec<(String, Value)>) -> Request {
        Request::Set(BASE64_STANDARD.encode(encode_mapping(mapping).unwrap()))
    }

    #[test]
    fn set_then_code() {
        let mut session = ReplSession::default();
        let set = dispatch(
            &mut session,
            set_request(vec![("a".to_owned(), Value::Int(10)), ("b".to_owned(), Value::Int(20))]),
        );
        assert_eq!(set, Response::ok());
        let code = dispatch(&mut session, Request::Code("a + b".to_owned()));
        assert_eq!(code.stdout, "In [1]: a + b\nOut[1]: 30\n");
        assert_eq!(code.value, None);
    }

    #[test]
    fn failed_set_changes_nothing() {
        let mut session = ReplSession::default();
        session.set_variable("a", Value::Int(1));
        let bad_base64 = dispatch(&mut session, Request::Set("%%%".to_owned()));
        assert!(bad_base64.error.unwrap().starts_with("ValueError: invalid base64 payload"));

        let not_mapping = BASE64_STANDARD.encode(codec::encode(&Value::Int(3)).unwrap());
        let response = dispatch(&mut session, Request::Set(not_mapping));
        assert_eq!(
            response.error.as_deref(),
            Some("ValueError: payload is not a mapping of names to values")
        );
        assert_eq!(session.namespace().borrow().len(), 1);
        assert_eq!(session.execution_count(), 0);
    }

    #[test]
    fn get_missing_and_present() {
        let mut session = ReplSession::default();
        assert_eq!(dispatch(&mut session, Request::Get("nope".to_owned())), Response::not_found("nope"));

        session.set_variable("x", Value::str("hello"));
        let response = dispatch(&mut session, Request::Get("x".to_owned()));
        assert_eq!(response.error, None);
        let bytes = BASE64_STANDARD.decode(response.value.flatten().unwrap()).unwrap();
        assert_eq!(codec::decode(&bytes).unwrap(), Value::str("hello"));
    }

    #[test]
    fn get_of_process_bound_value() {
        let mut session = ReplSession::default();
        session.execute("f = open('Cargo.toml')");
        let response = dispatch(&mut session, Request::Get("f".to_owned()));
        assert_eq!(
            response.error.as_deref(),
            Some("TypeError: cannot serialize '_io.TextIOWrapper' object")
        );
        assert_eq!(response.value, Some(None));
    }
}
