#![doc = include_str!("../../../README.md")]

mod args;
mod builtins;
pub mod codec;
mod exception;
mod expressions;
mod format;
mod function;
pub mod host;
mod io;
mod modules;
mod namespace;
mod ops;
mod parse;
mod repl;
mod resource;
mod run;
pub mod sanitize;
mod types;
mod value;

pub use crate::{
    codec::{CodecError, Transportable, decode, decode_mapping, encode, encode_mapping},
    exception::{ExcType, Exception, RunResult, StackFrame},
    expressions::{ExprLoc, FunctionDef, StmtLoc},
    function::{Function, MAX_CALL_DEPTH, SESSION_STACK_SIZE},
    host::InteractiveHost,
    io::{CapturedOutput, NoPrint, PrintWriter, StdPrint},
    namespace::{InitPayloadError, Namespace, NamespaceRef, load_init_payload},
    parse::ParseError,
    repl::{DEFAULT_SCRIPT_NAME, ExecOutput, ReplSession, Snippet},
    resource::{HostObject, Resource},
    sanitize::{prepare_variables, sanitize_callable},
    value::{Dict, MAX_DATA_DEPTH, Value},
};
