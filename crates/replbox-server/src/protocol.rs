//! The wire format: one JSON object per newline-terminated frame, in each direction.
//!
//! Requests carry exactly one of `code`, `set` or `get`. Responses always carry
//! `stdout`, `stderr` and `error`; responses to `get` also carry `value`.

use std::fmt;

use replbox::ExecOutput;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Map;

/// One client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Source to run in transcript mode.
    Code(String),
    /// Base64 of an encoded name/value mapping to merge into the namespace.
    Set(String),
    /// Name of a variable to send back encoded.
    Get(String),
}

/// A frame that is not a valid request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError(String);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bad request: {}", self.0)
    }
}

impl std::error::Error for ProtocolError {}

const REQUEST_KEYS: [&str; 3] = ["code", "set", "get"];

impl Request {
    /// Parses one frame, with or without its trailing newline.
    pub fn from_frame(frame: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(frame).map_err(|err| ProtocolError(err.to_string()))?;
        let object: Map<String, serde_json::Value> = match serde_json::from_str(text.trim_end_matches(['\r', '\n'])) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(_) => return Err(ProtocolError("expected a JSON object".to_owned())),
            Err(err) => return Err(ProtocolError(err.to_string())),
        };
        let mut present = REQUEST_KEYS.into_iter().filter(|key| object.contains_key(*key));
        let key = match (present.next(), present.next()) {
            (Some(key), None) => key,
            (None, _) => return Err(ProtocolError("missing 'code', 'set', or 'get'".to_owned())),
            (Some(_), Some(_)) => {
                return Err(ProtocolError(
                    "expected exactly one of 'code', 'set', or 'get'".to_owned(),
                ));
            }
        };
        let field = object
            .get(key)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProtocolError(format!("'{key}' must be a string")))?
            .to_owned();
        Ok(match key {
            "code" => Self::Code(field),
            "set" => Self::Set(field),
            _ => Self::Get(field),
        })
    }

    /// The JSON frame for this request, newline included.
    #[must_use]
    pub fn to_frame(&self) -> Vec<u8> {
        let (key, field) = match self {
            Self::Code(field) => ("code", field),
            Self::Set(field) => ("set", field),
            Self::Get(field) => ("get", field),
        };
        let mut object = Map::new();
        object.insert(key.to_owned(), serde_json::Value::String(field.clone()));
        let mut frame = serde_json::Value::Object(object).to_string().into_bytes();
        frame.push(b'\n');
        frame
    }
}

/// One server response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    /// Outer `None`: not a `get` response, so the field is omitted.
    /// Inner `None`: a `get` that produced no value, sent as `null`.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub value: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<String>>, D::Error> {
    Option::<String>::deserialize(deserializer).map(Some)
}

impl Response {
    /// Success with nothing to report.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// A successful `get`, carrying the base64 payload.
    #[must_use]
    pub fn value(encoded: String) -> Self {
        Self {
            value: Some(Some(encoded)),
            ..Self::default()
        }
    }

    /// A `get` that failed after the name was found.
    #[must_use]
    pub fn value_failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            value: Some(None),
            ..Self::default()
        }
    }

    /// A `get` of a name the namespace does not bind.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::value_failure(format!("NameError: name '{name}' is not defined"))
    }

    /// Parses a response frame, with or without its trailing newline.
    pub fn from_frame(frame: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(frame.strip_suffix(b"\n").unwrap_or(frame))
    }
}

impl From<ExecOutput> for Response {
    fn from(output: ExecOutput) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            error: output.error,
            value: None,
        }
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Serializes a response as one newline-terminated frame.
pub fn encode_frame(response: &Response) -> serde_json::Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(response)?;
    frame.push(b'\n');
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_each_kind() {
        assert_eq!(
            Request::from_frame(b"{\"code\": \"1 + 1\"}\n"),
            Ok(Request::Code("1 + 1".to_owned()))
        );
        assert_eq!(Request::from_frame(b"{\"set\": \"AAE=\"}"), Ok(Request::Set("AAE=".to_owned())));
        assert_eq!(Request::from_frame(b"{\"get\": \"x\"}"), Ok(Request::Get("x".to_owned())));
    }

    #[test]
    fn rejects_bad_shapes() {
        let missing = Request::from_frame(b"{\"cmd\": \"x\"}").unwrap_err();
        assert_eq!(missing.to_string(), "Bad request: missing 'code', 'set', or 'get'");
        let both = Request::from_frame(b"{\"code\": \"x\", \"get\": \"y\"}").unwrap_err();
        assert_eq!(both.to_string(), "Bad request: expected exactly one of 'code', 'set', or 'get'");
        let typed = Request::from_frame(b"{\"code\": 3}").unwrap_err();
        assert_eq!(typed.to_string(), "Bad request: 'code' must be a string");
        assert!(Request::from_frame(b"[1]").is_err());
        assert!(Request::from_frame(b"{not json").unwrap_err().to_string().starts_with("Bad request: "));
        assert!(Request::from_frame(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn value_field_only_on_get() {
        let plain = String::from_utf8(encode_frame(&Response::ok()).unwrap()).unwrap();
        assert_eq!(plain, "{\"stdout\":\"\",\"stderr\":\"\",\"error\":null}\n");
        let missing = String::from_utf8(encode_frame(&Response::not_found("x")).unwrap()).unwrap();
        assert_eq!(
            missing,
            "{\"stdout\":\"\",\"stderr\":\"\",\"error\":\"NameError: name 'x' is not defined\",\"value\":null}\n"
        );
    }

    #[test]
    fn response_frames_parse_back() {
        for response in [Response::ok(), Response::value("AAE=".to_owned()), Response::not_found("y")] {
            let frame = encode_frame(&response).unwrap();
            assert_eq!(Response::from_frame(&frame).unwrap(), response);
        }
    }

    #[test]
    fn request_frames_parse_back() {
        let request = Request::Code("print('a\\nb')\n".to_owned());
        assert_eq!(Request::from_frame(&request.to_frame()), Ok(request));
    }
}
