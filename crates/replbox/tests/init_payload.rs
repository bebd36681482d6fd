//! Tests for pre-seeding a session namespace from a payload file.

use std::fs;

use pretty_assertions::assert_eq;
use replbox::{InitPayloadError, Namespace, ReplSession, Value, encode, encode_mapping, load_init_payload};

#[test]
fn payload_seeds_and_is_consumed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.bin");
    let bytes = encode_mapping(vec![("x".to_owned(), Value::Int(1)), ("y".to_owned(), Value::str("two"))]).unwrap();
    fs::write(&path, bytes).unwrap();

    let namespace = load_init_payload(&path).unwrap().unwrap();
    assert!(!path.exists(), "payload file should be removed after loading");
    assert_eq!(namespace.names().collect::<Vec<_>>(), vec!["x", "y"]);

    let mut session = ReplSession::with_namespace(namespace, "<repl>");
    let out = session.execute("x");
    assert_eq!(out.stdout, "In [1]: x\nOut[1]: 1\n");
}

#[test]
fn missing_payload_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_init_payload(&dir.path().join("absent.bin")).unwrap().is_none());
}

/// A payload that fails to decode is still removed, so the next start does not retry it.
#[test]
fn bad_payload_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.bin");
    fs::write(&path, b"not a payload").unwrap();
    let err = load_init_payload(&path).unwrap_err();
    assert!(matches!(err, InitPayloadError::Codec(_)), "{err}");
    assert!(!path.exists());
}

/// A payload must be a mapping; a bare value is rejected.
#[test]
fn payload_must_be_a_mapping() {
    let err = Namespace::from_payload(&encode(&Value::Int(5)).unwrap()).unwrap_err();
    assert_eq!(err.to_string(), "payload is not a mapping of names to values");
}
