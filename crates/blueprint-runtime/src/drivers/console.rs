//! Console drivers — `stdout`, `stderr`.
//!
//! Args are the variadic part list directly (`Value::List`), not a
//! `Value::Struct`, matching `blueprint_kernel::intrinsics::stdout`.

use super::op_error;
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;

fn joined_parts(args: &Value, kind: &'static str) -> Result<String, NodeError> {
    let Value::List(parts) = args else {
        return Err(op_error(format!("{kind}: expected a list of parts, got {args:?}")));
    };
    let mut out = String::new();
    for part in parts {
        match part {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&format!("{other:?}")),
        }
    }
    Ok(out)
}

pub fn stdout(args: Value) -> Result<Value, NodeError> {
    let text = joined_parts(&args, "stdout")?;
    println!("{text}");
    Ok(Value::Null)
}

pub fn stderr(args: Value) -> Result<Value, NodeError> {
    let text = joined_parts(&args, "stderr")?;
    eprintln!("{text}");
    Ok(Value::Null)
}
