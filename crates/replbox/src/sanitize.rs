//! Strips interactive-host state from a function's captured globals before it is shipped.
//!
//! A function defined in a notebook kernel closes over the kernel's whole namespace,
//! which holds the kernel's own control objects and history registers. Those cannot
//! leave the process. Filtering runs in two phases: a name and type denylist, then a
//! probe that keeps only entries the codec accepts.

use std::rc::Rc;

use crate::{codec, namespace::Namespace, value::Value};

/// The host's control entry point. Its presence in a function's globals marks the
/// function as defined inside an interactive host.
pub const HOST_ENTRY_POINT: &str = "get_ipython";

/// Names an interactive host binds in the user namespace.
pub const INJECTED_NAMES: [&str; 15] = [
    HOST_ENTRY_POINT,
    "display",
    "exit",
    "quit",
    "In",
    "Out",
    "_",
    "__",
    "___",
    "_i",
    "_ii",
    "_iii",
    "_ih",
    "_oh",
    "_dh",
];

/// Module families whose objects belong to the host itself.
pub const HOST_MODULE_PREFIXES: [&str; 3] = ["zmq.", "ipykernel.", "IPython."];

/// Whether a captured entry is host state, judged by its name and the module of its type.
#[must_use]
pub fn is_host_injected(name: &str, value: &Value) -> bool {
    INJECTED_NAMES.contains(&name)
        || is_input_register(name)
        || HOST_MODULE_PREFIXES
            .iter()
            .any(|prefix| value.module_name().starts_with(prefix))
}

/// `_i1`, `_i2`, ...: the per-cell input history.
fn is_input_register(name: &str) -> bool {
    name.strip_prefix("_i")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Phase one: drops every entry [`is_host_injected`] flags.
pub fn denylist_filter(entries: impl IntoIterator<Item = (String, Value)>) -> Vec<(String, Value)> {
    entries
        .into_iter()
        .filter(|(name, value)| !is_host_injected(name, value))
        .collect()
}

/// Phase two: keeps only entries that encode on their own.
pub fn probe_filter(entries: impl IntoIterator<Item = (String, Value)>) -> Vec<(String, Value)> {
    entries
        .into_iter()
        .filter(|(_, value)| codec::encode(value).is_ok())
        .collect()
}

/// Returns a copy of `value` whose captured globals hold no host state.
///
/// Anything that is not a function, or a function whose globals lack
/// [`HOST_ENTRY_POINT`], comes back as the same object. Otherwise a new function with the
/// same code, defaults and closure is bound to the filtered globals; the original is left
/// untouched. A dropped name the body needs raises `NameError` only when that path runs.
#[must_use]
pub fn sanitize_callable(value: &Value) -> Value {
    let Value::Function(function) = value else {
        return value.clone();
    };
    let entries: Vec<(String, Value)> = {
        let globals = function.globals().borrow();
        if !globals.contains(HOST_ENTRY_POINT) {
            return value.clone();
        }
        globals.iter().map(|(name, v)| (name.to_owned(), v.clone())).collect()
    };
    let clean: Namespace = probe_filter(denylist_filter(entries)).into_iter().collect();
    Value::Function(Rc::new(function.with_globals(clean.into_ref())))
}

/// Sanitizes every value of a mapping about to be sent with `set`.
pub fn prepare_variables(mapping: impl IntoIterator<Item = (String, Value)>) -> Vec<(String, Value)> {
    mapping
        .into_iter()
        .map(|(name, value)| {
            let value = sanitize_callable(&value);
            (name, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_registers() {
        assert!(is_input_register("_i7"));
        assert!(is_input_register("_i120"));
        assert!(!is_input_register("_i"));
        assert!(!is_input_register("_ix"));
        assert!(!is_input_register("_7"));
    }

    #[test]
    fn plain_names_pass() {
        assert!(!is_host_injected("data", &Value::Int(1)));
        assert!(is_host_injected("Out", &Value::Int(1)));
        assert!(is_host_injected("_i3", &Value::str("x = 1")));
    }
}
