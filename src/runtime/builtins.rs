use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::{Num, ObjId, Value};
use rand::Rng;
use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{io, process, thread};

/// Installs the stock natives into the current (global) frame.
pub fn install(interp: &mut Interpreter) {
    interp.install_native("print", print);
    interp.install_native("println", println);
    interp.install_native("gettimems", gettimems);
    interp.install_native("sleep", sleep);
    interp.install_native("exit", exit);
    interp.install_native("assert", assert);
    interp.install_native("randint", randint);
    interp.install_native("sin", sin);
    interp.install_native("cos", cos);
    interp.install_native("abs", abs);
}

fn render_args(interp: &Interpreter) -> RuntimeResult<String> {
    let mut out = String::new();
    for pos in 0..interp.native_arg_count() {
        let arg = interp.native_arg(pos as i64)?;
        out.push_str(&interp.heap().display(arg));
    }
    Ok(out)
}

fn write_stdout(text: &str) -> RuntimeResult<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|err| RuntimeError::Native {
            message: format!("write to stdout failed: {err}"),
        })
}

fn print(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let text = render_args(interp)?;
    write_stdout(&text)?;
    Ok(None)
}

fn println(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let mut text = render_args(interp)?;
    text.push('\n');
    write_stdout(&text)?;
    Ok(None)
}

fn gettimems(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| RuntimeError::Native {
            message: "system clock is before the epoch".to_string(),
        })?;
    Ok(Some(
        interp.alloc_result(Value::Int(elapsed.as_millis() as i64)),
    ))
}

fn sleep(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let duration = match interp.heap().number(interp.native_arg(0)?)? {
        Num::Int(ms) if ms >= 0 => Duration::from_millis(ms as u64),
        Num::Real(ms) if ms >= 0.0 => Duration::from_secs_f64(ms / 1000.0),
        _ => {
            return Err(RuntimeError::Native {
                message: "sleep duration must be non-negative".to_string(),
            });
        }
    };
    thread::sleep(duration);
    Ok(None)
}

fn exit(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let code = interp.heap().expect_int(interp.native_arg(0)?)?;
    process::exit(code as i32);
}

fn assert(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let flag = interp.heap().expect_bool(interp.native_arg(0)?)?;
    let message = interp.heap().expect_str(interp.native_arg(1)?)?.to_string();
    if flag {
        Ok(None)
    } else {
        Err(RuntimeError::Native {
            message: format!("assertion failed: {message}"),
        })
    }
}

fn randint(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let upper = interp.heap().expect_int(interp.native_arg(0)?)?;
    if upper < 0 {
        return Err(RuntimeError::Native {
            message: "randint bound must be non-negative".to_string(),
        });
    }
    let value = rand::thread_rng().gen_range(0..=upper);
    Ok(Some(interp.alloc_result(Value::Int(value))))
}

fn sin(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let x = interp.heap().number(interp.native_arg(0)?)?.as_real();
    Ok(Some(interp.alloc_result(Value::Real(x.sin()))))
}

fn cos(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let x = interp.heap().number(interp.native_arg(0)?)?.as_real();
    Ok(Some(interp.alloc_result(Value::Real(x.cos()))))
}

fn abs(interp: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
    let value = match interp.heap().number(interp.native_arg(0)?)? {
        Num::Int(v) => Value::Int(v.wrapping_abs()),
        Num::Real(v) => Value::Real(v.abs()),
    };
    Ok(Some(interp.alloc_result(value)))
}
