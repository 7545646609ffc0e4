//! Importable modules: `sys`, `math`, and `host` when a host is attached.

use std::collections::HashMap;
use std::f64::consts;
use std::rc::Rc;

use tracing::debug;

use crate::eval::Env;
use crate::exception::{EvalResult, Exception, ExceptionKind};
use crate::output::Stream;
use crate::value::{Builtin, Module, Value};

/// Import `name`, building it on first use. Later imports share the module.
pub fn load(env: &Env, name: &str) -> EvalResult<Value> {
    if let Some(module) = env.modules.borrow().get(name) {
        return Ok(module.clone());
    }

    let attrs = match name {
        "sys" => sys(),
        "math" => math(),
        "host" if env.host.is_some() => host(),
        _ => {
            return Err(Exception::new(
                ExceptionKind::ModuleNotFoundError,
                format!("No module named '{}'", name),
            ))
        }
    };
    debug!(module = name, "loaded module");
    let module = Value::Module(Rc::new(Module::new(name, attrs)));
    env.modules
        .borrow_mut()
        .insert(name.to_string(), module.clone());
    Ok(module)
}

/// `from module import name`
pub fn import_name(module: &Value, module_name: &str, name: &str) -> EvalResult<Value> {
    let Value::Module(m) = module else {
        return Err(Exception::type_error(format!(
            "'{}' is not a module",
            module.type_name()
        )));
    };
    m.get(name).ok_or_else(|| {
        Exception::new(
            ExceptionKind::ImportError,
            format!("cannot import name '{}' from '{}'", name, module_name),
        )
    })
}

fn sys() -> HashMap<String, Value> {
    HashMap::from([
        ("stdout".to_string(), Value::Stream(Stream::Stdout)),
        ("stderr".to_string(), Value::Stream(Stream::Stderr)),
    ])
}

fn math() -> HashMap<String, Value> {
    HashMap::from([
        ("pi".to_string(), Value::Float(consts::PI)),
        ("e".to_string(), Value::Float(consts::E)),
        ("inf".to_string(), Value::Float(f64::INFINITY)),
        ("sqrt".to_string(), Value::Builtin(Builtin::MathSqrt)),
        ("floor".to_string(), Value::Builtin(Builtin::MathFloor)),
        ("ceil".to_string(), Value::Builtin(Builtin::MathCeil)),
    ])
}

fn host() -> HashMap<String, Value> {
    HashMap::from([
        ("text".to_string(), Value::Builtin(Builtin::HostText)),
        ("image".to_string(), Value::Builtin(Builtin::HostImage)),
    ])
}
