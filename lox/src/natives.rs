//! Builtin functions available in the global scope.

use std::io::Write;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::debug;
use rand::Rng;

use crate::environment::Environment;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::{Callable, NativeFunction, Value};

const NATIVES: &[NativeFunction] = &[
    NativeFunction {
        name: "clock",
        arity: 0,
        func: clock,
    },
    NativeFunction {
        name: "print",
        arity: 1,
        func: print,
    },
    NativeFunction {
        name: "random",
        arity: 0,
        func: random,
    },
    NativeFunction {
        name: "sleep",
        arity: 1,
        func: sleep,
    },
    NativeFunction {
        name: "load",
        arity: 1,
        func: load,
    },
];

pub fn register(globals: &mut Environment) {
    for native in NATIVES {
        let function = NativeFunction {
            name: native.name,
            arity: native.arity,
            func: native.func,
        };
        globals.define(
            native.name,
            Value::Callable(Callable::Native(Rc::new(function))),
        );
    }
}

/// Seconds since the Unix epoch.
fn clock(
    _: &mut Interpreter,
    _: &mut dyn Write,
    _: &[Value],
    paren: &Token,
) -> Result<Value, LoxError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::runtime(format!("System clock error: {}", e), paren))?;
    Ok(Value::Number(elapsed.as_secs_f64()))
}

fn print(
    _: &mut Interpreter,
    output: &mut dyn Write,
    args: &[Value],
    _: &Token,
) -> Result<Value, LoxError> {
    writeln!(output, "{}", args[0])?;
    Ok(Value::Nil)
}

/// Uniform number in `[0, 1)`.
fn random(
    _: &mut Interpreter,
    _: &mut dyn Write,
    _: &[Value],
    _: &Token,
) -> Result<Value, LoxError> {
    Ok(Value::Number(rand::thread_rng().r#gen::<f64>()))
}

/// Blocks for the given number of milliseconds.
fn sleep(
    _: &mut Interpreter,
    output: &mut dyn Write,
    args: &[Value],
    paren: &Token,
) -> Result<Value, LoxError> {
    let duration = match &args[0] {
        Value::Number(ms) if *ms >= 0.0 => Duration::try_from_secs_f64(ms / 1000.0).ok(),
        _ => None,
    };
    let Some(duration) = duration else {
        return Err(LoxError::runtime(
            "sleep() expects a non-negative number of milliseconds.",
            paren,
        ));
    };

    output.flush()?;
    thread::sleep(duration);
    Ok(Value::Nil)
}

/// Runs another source file in the global scope.
fn load(
    interpreter: &mut Interpreter,
    output: &mut dyn Write,
    args: &[Value],
    paren: &Token,
) -> Result<Value, LoxError> {
    let Value::String(path) = &args[0] else {
        return Err(LoxError::runtime(
            "load() expects a file path string.",
            paren,
        ));
    };

    debug!("Loading {}", path);
    let source = std::fs::read_to_string(path).map_err(|e| {
        LoxError::runtime(format!("Could not load '{}': {}", path, e), paren)
    })?;

    let statements = interpreter.compile(&source).map_err(|errors| {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        LoxError::runtime(
            format!("Could not load '{}':\n{}", path, details.join("\n")),
            paren,
        )
    })?;

    let globals = interpreter.globals();
    interpreter.execute_block(&statements, globals, output)?;
    Ok(Value::Nil)
}
