use std::{process::ExitCode, thread};

use replbox::SESSION_STACK_SIZE;
use replbox_server::{ServerConfig, run};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    // values are !Send, so the runtime and the session live on one thread
    let server = thread::Builder::new()
        .name("replbox-server".to_owned())
        .stack_size(SESSION_STACK_SIZE)
        .spawn(move || serve(&config));
    match server.map(thread::JoinHandle::join) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => {
            error!("server thread panicked");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(error = %err, "failed to start server thread");
            ExitCode::FAILURE
        }
    }
}

fn serve(config: &ServerConfig) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, socket = %config.socket_path.display(), "server failed");
            ExitCode::FAILURE
        }
    }
}
