//! End-to-end tests: a real server on a temporary socket, driven through the client and
//! through raw frames.

use std::{
    fs,
    io::{BufRead, BufReader, Read, Write},
    os::unix::net::UnixStream,
    path::PathBuf,
    thread::{self, JoinHandle},
    time::Duration,
};

use pretty_assertions::assert_eq;
use replbox::{InteractiveHost, SESSION_STACK_SIZE, Value};
use replbox_server::{Client, ClientError, Response, Server, ServerConfig, wait_ready, write_init_payload};
use tempfile::TempDir;
use tokio::sync::oneshot;

const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// A server running on its own thread, stopped when dropped.
struct TestServer {
    dir: Option<TempDir>,
    socket_path: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<Result<(), String>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(|_| {})
    }

    fn start_with(prepare: impl FnOnce(&mut ServerConfig)) -> Self {
        Self::start_in(tempfile::tempdir().unwrap(), prepare)
    }

    /// Serves on `repl.sock` inside `dir`. `prepare` runs before the server binds, with
    /// the config the server will use.
    fn start_in(dir: TempDir, prepare: impl FnOnce(&mut ServerConfig)) -> Self {
        let socket_path = dir.path().join("repl.sock");
        let mut config = ServerConfig::new(&socket_path);
        prepare(&mut config);

        let (stop, stopped) = oneshot::channel::<()>();
        let thread = thread::Builder::new()
            .stack_size(SESSION_STACK_SIZE)
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| err.to_string())?;
                runtime.block_on(async move {
                    let server = Server::bind(&config).map_err(|err| err.to_string())?;
                    server
                        .serve(async {
                            let _ = stopped.await;
                        })
                        .await
                        .map_err(|err| err.to_string())
                })
            })
            .unwrap();

        wait_ready(&socket_path, READY_TIMEOUT).unwrap();
        Self {
            dir: Some(dir),
            socket_path,
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    fn client(&self) -> Client {
        Client::new(&self.socket_path)
    }

    /// Sends raw bytes on a fresh connection and returns everything the server wrote back.
    fn raw(&self, bytes: &[u8]) -> Vec<u8> {
        let mut stream = UnixStream::connect(&self.socket_path).unwrap();
        stream.write_all(bytes).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).unwrap();
        reply
    }

    /// Shuts down and hands back the directory, so a later server can reuse it.
    fn stop(mut self) -> TempDir {
        self.shutdown();
        self.dir.take().unwrap()
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.shutdown();
        }
    }
}

fn stdout_of(client: &Client, code: &str) -> String {
    let response = client.execute(code).unwrap();
    response.stdout
}

// =============================================================================
// 1. Code requests
// =============================================================================

/// State persists across connections, and the counter keeps counting.
#[test]
fn state_persists_across_connections() {
    let server = TestServer::start();
    let client = server.client();
    assert_eq!(stdout_of(&client, "x = 41"), "In [1]: x = 41\n");
    assert_eq!(stdout_of(&client, "x += 1"), "In [2]: x += 1\n");
    assert_eq!(stdout_of(&client, "print(x)\nx"), "In [3]: print(x)\n   ...: x\n42\n");
    assert_eq!(stdout_of(&client, "x"), "In [4]: x\nOut[4]: 42\n");
}

/// An error is reported in `error`, consumes a number and leaves the namespace intact.
#[test]
fn errors_are_reported_not_fatal() {
    let server = TestServer::start();
    let client = server.client();
    client.execute("x = 1").unwrap();

    let failed = client.send("1/0").unwrap();
    assert_eq!(failed.stdout, "In [2]: 1/0\n");
    let error = failed.error.unwrap();
    assert!(error.ends_with("ZeroDivisionError: division by zero"), "{error}");
    assert_eq!(failed.value, None);

    assert_eq!(stdout_of(&client, "x"), "In [3]: x\nOut[3]: 1\n");
}

/// Dropping a very deep structure leaves the server running.
#[test]
fn deep_structures_do_not_kill_the_server() {
    let server = TestServer::start();
    let client = server.client();
    client.execute("a = []\nfor _ in range(100000):\n    a = [a]").unwrap();
    client.execute("a = None").unwrap();
    assert_eq!(stdout_of(&client, "a"), "In [3]: a\n");
}

/// `execute` turns a reported error into `ClientError::Remote`.
#[test]
fn execute_surfaces_remote_errors() {
    let server = TestServer::start();
    let err = server.client().execute("undefined_name").unwrap_err();
    let ClientError::Remote(message) = &err else { panic!("expected a remote error, got {err}") };
    assert!(message.ends_with("NameError: name 'undefined_name' is not defined"), "{message}");
}

// =============================================================================
// 2. Set and get
// =============================================================================

/// Variables sent with `set` are usable by later code.
#[test]
fn set_then_use() {
    let server = TestServer::start();
    let client = server.client();
    client
        .set(vec![("a".to_owned(), Value::Int(10)), ("b".to_owned(), Value::Int(20))])
        .unwrap();
    assert_eq!(stdout_of(&client, "a + b"), "In [1]: a + b\nOut[1]: 30\n");
}

/// `get` returns a decoded copy of the server's value.
#[test]
fn get_returns_values() {
    let server = TestServer::start();
    let client = server.client();
    client.execute("data = {'rows': [1, 2, 3], 'name': 'box'}").unwrap();
    let data = client.get("data").unwrap();
    assert_eq!(data.py_repr(), "{'rows': [1, 2, 3], 'name': 'box'}");
}

/// A function fetched with `get` still runs locally, with its captured globals.
#[test]
fn get_returns_working_functions() {
    let server = TestServer::start();
    let client = server.client();
    client.execute("scale = 3\ndef triple(x):\n    return x * scale").unwrap();
    let triple = client.get("triple").unwrap();

    let mut local = replbox::ReplSession::default();
    local.set_variable("triple", triple);
    assert_eq!(local.execute("triple(4)").stdout, "In [1]: triple(4)\nOut[1]: 12\n");
}

/// An unbound name is `NotFound`; on the wire, the error is a `NameError` and `value` is null.
#[test]
fn get_of_unbound_name() {
    let server = TestServer::start();
    let err = server.client().get("nothing").unwrap_err();
    assert!(matches!(&err, ClientError::NotFound(name) if name == "nothing"), "{err}");

    let reply = server.raw(b"{\"get\": \"nothing\"}\n");
    assert_eq!(
        String::from_utf8(reply).unwrap(),
        "{\"stdout\":\"\",\"stderr\":\"\",\"error\":\"NameError: name 'nothing' is not defined\",\"value\":null}\n"
    );
}

/// Values bound to the server process cannot be fetched.
#[test]
fn get_of_open_file_fails() {
    let server = TestServer::start();
    let client = server.client();
    client.execute("f = open('Cargo.toml')").unwrap();
    let err = client.get("f").unwrap_err();
    let ClientError::Remote(message) = &err else { panic!("expected a remote error, got {err}") };
    assert_eq!(message.as_str(), "TypeError: cannot serialize '_io.TextIOWrapper' object");
}

/// A function defined in a notebook host runs on the server after `set`.
#[test]
fn notebook_function_via_set() {
    let mut host = InteractiveHost::new();
    assert_eq!(host.run_cell("offset = 10\ndef f(x):\n    return x * 2 + offset").error, None);
    let f = host.get("f").unwrap();

    let server = TestServer::start();
    let client = server.client();
    client.set(vec![("f".to_owned(), f)]).unwrap();
    assert_eq!(stdout_of(&client, "f(5)"), "In [1]: f(5)\nOut[1]: 20\n");
    assert!(client.execute("get_ipython").is_err());
}

// =============================================================================
// 3. Malformed requests
// =============================================================================

/// Frames that are not valid requests get a `Bad request` error, and the server carries on.
#[test]
fn bad_requests() {
    let server = TestServer::start();
    for frame in [&b"{not json\n"[..], b"{\"cmd\": \"x\"}\n", b"[1, 2]\n", b"{\"code\": 1}\n"] {
        let response = Response::from_frame(&server.raw(frame)).unwrap();
        let error = response.error.unwrap();
        assert!(error.starts_with("Bad request: "), "{error}");
    }
    assert_eq!(stdout_of(&server.client(), "1"), "In [1]: 1\nOut[1]: 1\n");
}

/// An undecodable `set` payload is an error and binds nothing.
#[test]
fn bad_set_payload() {
    let server = TestServer::start();
    let response = Response::from_frame(&server.raw(b"{\"set\": \"AAAA\"}\n")).unwrap();
    assert!(response.error.unwrap().starts_with("ValueError: "));
    assert_eq!(stdout_of(&server.client(), "1"), "In [1]: 1\nOut[1]: 1\n");
}

/// Empty frames and connections closed without a newline get no reply.
#[test]
fn empty_connections_are_ignored() {
    let server = TestServer::start();
    assert!(server.raw(b"\n").is_empty());
    assert!(server.raw(b"").is_empty());
    assert!(server.raw(b"{\"code\": \"1\"}").is_empty());
    assert_eq!(stdout_of(&server.client(), "2"), "In [1]: 2\nOut[1]: 2\n");
}

/// One request per connection: anything after the first frame is ignored.
#[test]
fn one_request_per_connection() {
    let server = TestServer::start();
    let mut stream = UnixStream::connect(&server.socket_path).unwrap();
    stream.write_all(b"{\"code\": \"a = 1\"}\n{\"code\": \"a = 2\"}\n").unwrap();
    let mut line = Vec::new();
    BufReader::new(&stream).read_until(b'\n', &mut line).unwrap();
    assert_eq!(Response::from_frame(&line).unwrap().stdout, "In [1]: a = 1\n");
    drop(stream);
    assert_eq!(stdout_of(&server.client(), "a"), "In [2]: a\nOut[2]: 1\n");
}

// =============================================================================
// 4. Lifecycle
// =============================================================================

/// A leftover socket file from an earlier run is replaced.
#[test]
fn stale_socket_is_replaced() {
    let server = TestServer::start_with(|config| {
        fs::write(&config.socket_path, b"stale").unwrap();
    });
    assert_eq!(stdout_of(&server.client(), "1 + 1"), "In [1]: 1 + 1\nOut[1]: 2\n");
}

/// The socket file is removed on shutdown.
#[test]
fn socket_removed_on_shutdown() {
    let server = TestServer::start();
    let path = server.socket_path.clone();
    assert!(path.exists());
    let _dir = server.stop();
    assert!(!path.exists());
}

/// A restarted server on the same socket starts from its own payload, not the old state.
#[test]
fn restart_does_not_keep_state() {
    let first = TestServer::start();
    first.client().execute("x = 1").unwrap();
    let dir = first.stop();

    let second = TestServer::start_in(dir, |config| {
        let path = config.socket_path.with_file_name("init.bin");
        write_init_payload(&path, vec![("y".to_owned(), Value::Int(2))]).unwrap();
        config.init_path = Some(path);
    });
    let client = second.client();
    let err = client.get("x").unwrap_err();
    assert!(matches!(&err, ClientError::NotFound(name) if name == "x"), "{err}");
    assert_eq!(client.get("y").unwrap(), Value::Int(2));
    assert_eq!(stdout_of(&client, "y"), "In [1]: y\nOut[1]: 2\n");
    let missing = client.send("x").unwrap().error.unwrap();
    assert!(missing.ends_with("NameError: name 'x' is not defined"), "{missing}");
}

/// A pre-seed payload populates the namespace and is deleted once read.
#[test]
fn init_payload_seeds_namespace() {
    let mut init_path = PathBuf::new();
    let server = TestServer::start_with(|config| {
        let path = config.socket_path.with_file_name("init.bin");
        write_init_payload(&path, vec![("x".to_owned(), Value::Int(1))]).unwrap();
        init_path.clone_from(&path);
        config.init_path = Some(path);
    });
    assert!(!init_path.exists());
    assert!(init_path.starts_with(server.dir.as_ref().unwrap().path()));
    assert_eq!(stdout_of(&server.client(), "x"), "In [1]: x\nOut[1]: 1\n");
}

/// A pre-seed payload that does not decode stops the server from starting.
#[test]
fn bad_init_payload_fails_bind() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.bin");
    fs::write(&init, b"garbage").unwrap();
    let config = ServerConfig {
        socket_path: dir.path().join("repl.sock"),
        init_path: Some(init.clone()),
    };
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let result = runtime.block_on(async { Server::bind(&config).map(|_| ()) });
    assert!(result.is_err());
    assert!(!init.exists());
}
