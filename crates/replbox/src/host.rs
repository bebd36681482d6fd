//! A model of the interactive host (a notebook kernel) functions are captured from.
//!
//! The host namespace carries the kernel's control objects and history registers next to
//! user code. Functions defined here close over all of it, which is what the capture
//! sanitizer exists to undo.

use std::rc::Rc;

use crate::{
    repl::{ExecOutput, ReplSession},
    resource::{HostObject, Resource},
    value::{Dict, Value},
};

/// Filename the host reports for cell code.
pub const CELL_SCRIPT_NAME: &str = "<ipython-input>";

/// A session seeded the way a kernel seeds its user namespace, recording cell history.
pub struct InteractiveHost {
    session: ReplSession,
    /// `In` / `_ih`: cell sources, with an empty entry 0.
    inputs: Value,
    /// `Out` / `_oh`: cell number to echoed value.
    outputs: Value,
}

impl InteractiveHost {
    #[must_use]
    pub fn new() -> Self {
        let mut session = ReplSession::new(CELL_SCRIPT_NAME);
        for object in [HostObject::Shell, HostObject::Exit, HostObject::Quit, HostObject::Display] {
            session.set_variable(object.binding(), Value::Resource(Rc::new(Resource::host(object))));
        }
        let inputs = Value::list(vec![Value::str("")]);
        let outputs = Value::dict(Dict::new());
        let directories = std::env::current_dir()
            .map(|dir| vec![Value::str(dir.to_string_lossy())])
            .unwrap_or_default();
        session.set_variable("In", inputs.clone());
        session.set_variable("_ih", inputs.clone());
        session.set_variable("Out", outputs.clone());
        session.set_variable("_oh", outputs.clone());
        session.set_variable("_dh", Value::list(directories));
        for register in ["_", "__", "___", "_i", "_ii", "_iii"] {
            session.set_variable(register, Value::str(""));
        }
        Self {
            session,
            inputs,
            outputs,
        }
    }

    /// Runs one cell and records it: `In[n]`, `_iN` and the `_i` registers before it
    /// runs, `Out[n]` and the `_` registers when it echoes a value.
    pub fn run_cell(&mut self, code: &str) -> ExecOutput {
        let n = self.session.execution_count() + 1;
        if let Value::List(inputs) = &self.inputs {
            inputs.borrow_mut().push(Value::str(code));
        }
        self.rotate(["_iii", "_ii", "_i"], Value::str(code));
        self.session.set_variable(format!("_i{n}"), Value::str(code));

        let (output, value) = self.session.execute_with_value(code);
        if let Some(value) = value {
            if let Value::Dict(outputs) = &self.outputs {
                // Int keys always hash.
                let _ = outputs.borrow_mut().insert(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)), value.clone());
            }
            self.rotate(["___", "__", "_"], value);
        }
        output
    }

    /// Shifts a three-deep register chain, oldest first, and stores `latest` at the end.
    fn rotate(&mut self, [oldest, middle, newest]: [&str; 3], latest: Value) {
        let middle_value = self.session.get_variable(middle).unwrap_or(Value::None);
        let newest_value = self.session.get_variable(newest).unwrap_or(Value::None);
        self.session.set_variable(oldest, middle_value);
        self.session.set_variable(middle, newest_value);
        self.session.set_variable(newest, latest);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.session.get_variable(name)
    }

    #[must_use]
    pub fn session(&self) -> &ReplSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ReplSession {
        &mut self.session
    }
}

impl Default for InteractiveHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn history_registers() {
        let mut host = InteractiveHost::new();
        host.run_cell("1 + 1");
        host.run_cell("x = 5");
        host.run_cell("x * 3");
        assert_eq!(host.get("_").unwrap(), Value::Int(15));
        assert_eq!(host.get("__").unwrap(), Value::Int(2));
        assert_eq!(host.get("_i").unwrap(), Value::str("x * 3"));
        assert_eq!(host.get("_ii").unwrap(), Value::str("x = 5"));
        assert_eq!(host.get("_i1").unwrap(), Value::str("1 + 1"));
        assert_eq!(host.get("In").unwrap().py_repr(), "['', '1 + 1', 'x = 5', 'x * 3']");
        assert_eq!(host.get("Out").unwrap().py_repr(), "{1: 2, 3: 15}");
    }
}
