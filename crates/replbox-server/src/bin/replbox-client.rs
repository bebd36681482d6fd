//! Sends one snippet to a running server and prints what it produced.
//!
//! `replbox-client <code>` runs `code`; `replbox-client -` reads it from stdin.

use std::{
    io::{self, Read, Write},
    process::ExitCode,
};

use replbox_server::{Client, socket_path_from_env};

const USAGE: &str = "usage: replbox-client <code | ->";

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(arg), None) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let code = if arg == "-" {
        let mut code = String::new();
        if let Err(err) = io::stdin().read_to_string(&mut code) {
            eprintln!("failed to read stdin: {err}");
            return ExitCode::FAILURE;
        }
        code
    } else {
        arg
    };

    let client = Client::new(socket_path_from_env());
    let response = match client.send(&code) {
        Ok(response) => response,
        Err(err) => {
            eprintln!("{}: {err}", client.socket_path().display());
            return ExitCode::FAILURE;
        }
    };

    print!("{}", response.stdout);
    eprint!("{}", response.stderr);
    let _ = io::stdout().flush();
    match response.error {
        Some(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
