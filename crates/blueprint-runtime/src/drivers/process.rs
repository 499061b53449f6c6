//! Process drivers — `exec`, `env_get`.

use super::{expect_string, field, op_error};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use std::collections::BTreeMap;
use tokio::process::Command;

pub async fn exec(args: Value) -> Result<Value, NodeError> {
    let argv = match field(&args, "argv") {
        Some(Value::List(items)) => items,
        other => return Err(op_error(format!("exec: `argv` must be a list, got {other:?}"))),
    };
    let mut parts = Vec::with_capacity(argv.len());
    for item in argv {
        parts.push(item.as_str().ok_or_else(|| op_error("exec: every argv element must be a string"))?.to_string());
    }
    let (program, rest) = parts.split_first().ok_or_else(|| op_error("exec: argv must have at least one element"))?;

    let mut command = Command::new(program);
    command.args(rest);

    if let Some(Value::String(cwd)) = field(&args, "cwd") {
        command.current_dir(cwd);
    }

    if let Some(Value::Map(env)) = field(&args, "env") {
        for (k, v) in env {
            if let Value::String(value) = v {
                command.env(k.to_string(), value);
            }
        }
    }

    let output = command
        .output()
        .await
        .map_err(|e| op_error(format!("exec({program}): {e}")))?;

    let mut result = BTreeMap::new();
    result.insert("code".to_string(), Value::Int(output.status.code().unwrap_or(-1) as i64));
    result.insert("stdout".to_string(), Value::String(String::from_utf8_lossy(&output.stdout).into_owned()));
    result.insert("stderr".to_string(), Value::String(String::from_utf8_lossy(&output.stderr).into_owned()));
    Ok(Value::Struct(result))
}

pub fn env_get(args: Value) -> Result<Value, NodeError> {
    let name = expect_string("env_get", "name", field(&args, "name").unwrap_or(&Value::Null))?;
    let default = field(&args, "default").cloned().unwrap_or(Value::Null);
    match std::env::var(&name) {
        Ok(value) => Ok(Value::String(value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn struct_args(fields: Vec<(&str, Value)>) -> Value {
        let mut map = Map::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        Value::Struct(map)
    }

    #[tokio::test]
    async fn exec_captures_stdout_and_exit_code() {
        let result = exec(struct_args(vec![(
            "argv",
            Value::List(vec![Value::String("echo".into()), Value::String("hi".into())]),
        )]))
        .await
        .unwrap();
        let Value::Struct(fields) = result else { panic!("expected struct") };
        assert_eq!(fields.get("code"), Some(&Value::Int(0)));
        assert_eq!(fields.get("stdout"), Some(&Value::String("hi\n".into())));
    }

    #[test]
    fn env_get_falls_back_to_default_when_unset() {
        let result = env_get(struct_args(vec![
            ("name", Value::String("BLUEPRINT_DEFINITELY_UNSET_VAR".into())),
            ("default", Value::String("fallback".into())),
        ]))
        .unwrap();
        assert_eq!(result, Value::String("fallback".into()));
    }
}
