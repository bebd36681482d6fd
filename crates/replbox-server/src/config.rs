//! Server configuration: command-line flags, then environment, then defaults.

use std::{ffi::OsString, fmt, path::PathBuf};

/// Socket used when neither a flag nor the environment names one.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/repl-box.sock";
/// Environment variable naming the socket, read by both server and client.
pub const SOCKET_ENV: &str = "REPL_BOX_SOCKET";
/// Environment variable naming a pre-seed payload file.
pub const INIT_ENV: &str = "REPL_BOX_INIT";

pub const USAGE: &str = "usage: replbox-server [--socket <path>] [--init <path>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Payload decoded into the initial namespace, then deleted.
    pub init_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingValue(String),
    UnknownArgument(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(flag) => write!(f, "{flag} requires a value\n{USAGE}"),
            Self::UnknownArgument(arg) => write!(f, "unexpected argument '{arg}'\n{USAGE}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            init_path: None,
        }
    }

    /// Resolves the configuration of the running process.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(std::env::args().skip(1), |key| std::env::var_os(key))
    }

    /// Resolves from explicit arguments (program name excluded) and an environment lookup.
    ///
    /// An environment variable set to the empty string counts as unset.
    pub fn resolve(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let mut socket_path = None;
        let mut init_path = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let slot = match arg.as_str() {
                "--socket" => &mut socket_path,
                "--init" => &mut init_path,
                _ => return Err(ConfigError::UnknownArgument(arg)),
            };
            let value = args.next().ok_or(ConfigError::MissingValue(arg))?;
            *slot = Some(PathBuf::from(value));
        }
        let from_env = |key| env(key).filter(|value| !value.is_empty()).map(PathBuf::from);
        Ok(Self {
            socket_path: socket_path
                .or_else(|| from_env(SOCKET_ENV))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
            init_path: init_path.or_else(|| from_env(INIT_ENV)),
        })
    }
}

/// The socket a client should connect to: `REPL_BOX_SOCKET`, else the default.
#[must_use]
pub fn socket_path_from_env() -> PathBuf {
    std::env::var_os(SOCKET_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::resolve(Vec::new(), |_| None).unwrap();
        assert_eq!(config, ServerConfig::new(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn flags_beat_environment() {
        let env = |key: &str| match key {
            SOCKET_ENV => Some(OsString::from("/env.sock")),
            INIT_ENV => Some(OsString::from("/env.init")),
            _ => None,
        };
        let from_env = ServerConfig::resolve(Vec::new(), env).unwrap();
        assert_eq!(from_env.socket_path, PathBuf::from("/env.sock"));
        assert_eq!(from_env.init_path, Some(PathBuf::from("/env.init")));

        let from_flags = ServerConfig::resolve(args(&["--socket", "/flag.sock"]), env).unwrap();
        assert_eq!(from_flags.socket_path, PathBuf::from("/flag.sock"));
        assert_eq!(from_flags.init_path, Some(PathBuf::from("/env.init")));
    }

    #[test]
    fn empty_environment_values_are_unset() {
        let config = ServerConfig::resolve(Vec::new(), |_| Some(OsString::new())).unwrap();
        assert_eq!(config, ServerConfig::new(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn bad_arguments() {
        assert_eq!(
            ServerConfig::resolve(args(&["--init"]), |_| None),
            Err(ConfigError::MissingValue("--init".to_owned()))
        );
        assert_eq!(
            ServerConfig::resolve(args(&["serve"]), |_| None),
            Err(ConfigError::UnknownArgument("serve".to_owned()))
        );
    }
}
