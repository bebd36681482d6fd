use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    exception::{Exception, RunResult},
    expressions::FunctionDef,
    namespace::NamespaceRef,
    value::Value,
};

/// Maximum depth of nested Python calls before `RecursionError`.
#[cfg(not(debug_assertions))]
pub const MAX_CALL_DEPTH: usize = 200;
/// Tree-walking frames are far larger without optimization, so debug builds stop earlier.
#[cfg(debug_assertions)]
pub const MAX_CALL_DEPTH: usize = 50;

/// Native stack for a thread that runs a session: room for `MAX_CALL_DEPTH` calls, each
/// evaluating an expression nested up to the parser's depth limit.
pub const SESSION_STACK_SIZE: usize = 256 * 1024 * 1024;

/// The snippet a function was defined in, kept for traceback preview lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub filename: String,
    pub text: String,
}

impl Source {
    #[must_use]
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            filename: filename.into(),
            text: text.into(),
        })
    }
}

/// A local scope of a running (or finished) function call.
///
/// Nested functions keep the scope alive through their closure, so a scope may outlive its call.
#[derive(Default)]
pub struct Scope {
    pub(crate) vars: IndexMap<String, Value>,
    pub(crate) parent: Option<ScopeRef>,
}

pub type ScopeRef = Rc<RefCell<Scope>>;

impl Scope {
    #[must_use]
    pub fn new(vars: IndexMap<String, Value>, parent: Option<ScopeRef>) -> ScopeRef {
        Rc::new(RefCell::new(Self { vars, parent }))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }
}

/// Default values evaluated when the `def` ran, aligned with the parameter lists.
#[derive(Clone, Default)]
pub struct Defaults {
    pub positional: Vec<Option<Value>>,
    pub keyword_only: Vec<Option<Value>>,
}

/// A user-defined function: code plus the environment it closes over.
pub struct Function {
    pub(crate) def: Rc<FunctionDef>,
    /// Held in a cell so a decoder can fill defaults after the function is registered,
    /// which lets a default refer back to the function itself.
    pub(crate) defaults: RefCell<Defaults>,
    /// The captured environment: names looked up after the local scope chain.
    pub(crate) globals: NamespaceRef,
    /// Enclosing call scopes, for functions defined inside functions.
    pub(crate) closure: Option<ScopeRef>,
    pub(crate) source: Rc<Source>,
}

impl Function {
    #[must_use]
    pub fn new(
        def: Rc<FunctionDef>,
        defaults: Defaults,
        globals: NamespaceRef,
        closure: Option<ScopeRef>,
        source: Rc<Source>,
    ) -> Self {
        Self {
            def,
            defaults: RefCell::new(defaults),
            globals,
            closure,
            source,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    #[must_use]
    pub fn def(&self) -> &Rc<FunctionDef> {
        &self.def
    }

    #[must_use]
    pub fn globals(&self) -> &NamespaceRef {
        &self.globals
    }

    #[must_use]
    pub fn closure(&self) -> Option<&ScopeRef> {
        self.closure.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    #[must_use]
    pub fn defaults(&self) -> Defaults {
        self.defaults.borrow().clone()
    }

    /// Names of the captured environment the body can actually reach.
    #[must_use]
    pub fn captured_names(&self) -> Vec<String> {
        let globals = self.globals.borrow();
        self.def
            .referenced
            .iter()
            .filter(|name| globals.contains(name))
            .cloned()
            .collect()
    }

    /// A new function with the same code, defaults and closure bound to different globals.
    #[must_use]
    pub fn with_globals(&self, globals: NamespaceRef) -> Self {
        Self {
            def: Rc::clone(&self.def),
            defaults: RefCell::new(self.defaults()),
            globals,
            closure: self.closure.clone(),
            source: Rc::clone(&self.source),
        }
    }

    /// Binds call arguments to parameter names, applying defaults.
    ///
    /// Errors mirror CPython's messages for missing, surplus and duplicate arguments.
    pub(crate) fn bind_arguments(
        &self,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> RunResult<IndexMap<String, Value>> {
        let params = &self.def.params;
        let name = self.name();
        let defaults = self.defaults.borrow();
        let mut bound: IndexMap<String, Value> = IndexMap::new();

        let given = args.len();
        let mut args = args.into_iter();
        for param in &params.positional {
            match args.next() {
                Some(value) => {
                    bound.insert(param.name.clone(), value);
                }
                None => break,
            }
        }
        let extra: Vec<Value> = args.collect();
        match &params.var_args {
            Some(var_args) => {
                bound.insert(var_args.clone(), Value::tuple(extra));
            }
            None if !extra.is_empty() => {
                let expected = params.positional.len();
                let plural = if expected == 1 { "" } else { "s" };
                return Err(Exception::type_error(format!(
                    "{name}() takes {expected} positional argument{plural} but {given} were given"
                )));
            }
            None => {}
        }

        let mut var_kwargs = Vec::new();
        for (key, value) in kwargs {
            let is_param = params.positional.iter().chain(&params.keyword_only).any(|p| p.name == key);
            if is_param {
                if bound.contains_key(&key) {
                    return Err(Exception::type_error(format!(
                        "{name}() got multiple values for argument '{key}'"
                    )));
                }
                bound.insert(key, value);
            } else if params.var_kwargs.is_some() {
                var_kwargs.push((key, value));
            } else {
                return Err(Exception::type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )));
            }
        }

        let mut missing = Vec::new();
        for (param, default) in params.positional.iter().zip(&defaults.positional) {
            if !bound.contains_key(&param.name) {
                match default {
                    Some(value) => {
                        bound.insert(param.name.clone(), value.clone());
                    }
                    None => missing.push(param.name.as_str()),
                }
            }
        }
        if !missing.is_empty() {
            return Err(missing_arguments(name, "positional", &missing));
        }
        for (param, default) in params.keyword_only.iter().zip(&defaults.keyword_only) {
            if !bound.contains_key(&param.name) {
                match default {
                    Some(value) => {
                        bound.insert(param.name.clone(), value.clone());
                    }
                    None => missing.push(param.name.as_str()),
                }
            }
        }
        if !missing.is_empty() {
            return Err(missing_arguments(name, "keyword-only", &missing));
        }
        if let Some(var_kwargs_name) = &params.var_kwargs {
            bound.insert(var_kwargs_name.clone(), Value::dict_from_pairs(var_kwargs));
        }
        Ok(bound)
    }
}

/// `f() missing 2 required positional arguments: 'a' and 'b'`
fn missing_arguments(name: &str, kind: &str, missing: &[&str]) -> Exception {
    let quoted: Vec<String> = missing.iter().map(|m| format!("'{m}'")).collect();
    let list = match quoted.as_slice() {
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
        [] => String::new(),
    };
    let plural = if missing.len() == 1 { "" } else { "s" };
    Exception::type_error(format!(
        "{name}() missing {} required {kind} argument{plural}: {list}",
        missing.len()
    ))
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.def.name)
            .field("captured", &self.captured_names())
            .finish_non_exhaustive()
    }
}
