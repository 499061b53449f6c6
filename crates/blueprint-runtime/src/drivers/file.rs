//! File I/O drivers — `read_file`, `write_file`, `append_file`,
//! `delete_file`, `file_exists`, `is_file`, `is_dir`, `mkdir`, `rmdir`,
//! `list_dir`, `copy_file`, `move_file`, `file_size`.

use super::{expect_string, field, op_error};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

fn path_of(args: &Value, kind: &'static str) -> Result<String, NodeError> {
    expect_string(kind, "path", field(args, "path").unwrap_or(&Value::Null))
}

pub async fn read_file(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "read_file")?;
    let bytes = fs::read(&path)
        .await
        .map_err(|e| op_error(format!("read_file({path}): {e}")))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(Value::String(text)),
        Err(e) => Ok(Value::Bytes(e.into_bytes())),
    }
}

pub async fn write_file(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "write_file")?;
    let content = field(&args, "content").cloned().unwrap_or(Value::Null);
    let bytes = content_bytes(&content, "write_file")?;
    let mut f = fs::File::create(&path)
        .await
        .map_err(|e| op_error(format!("write_file({path}): {e}")))?;
    f.write_all(&bytes)
        .await
        .map_err(|e| op_error(format!("write_file({path}): {e}")))?;
    Ok(Value::Null)
}

pub async fn append_file(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "append_file")?;
    let content = field(&args, "content").cloned().unwrap_or(Value::Null);
    let bytes = content_bytes(&content, "append_file")?;
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(|e| op_error(format!("append_file({path}): {e}")))?;
    f.write_all(&bytes)
        .await
        .map_err(|e| op_error(format!("append_file({path}): {e}")))?;
    Ok(Value::Null)
}

fn content_bytes(v: &Value, kind: &'static str) -> Result<Vec<u8>, NodeError> {
    match v {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(op_error(format!("`{kind}`: `content` must be string or bytes, got {other:?}"))),
    }
}

pub async fn delete_file(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "delete_file")?;
    fs::remove_file(&path)
        .await
        .map_err(|e| op_error(format!("delete_file({path}): {e}")))?;
    Ok(Value::Null)
}

pub async fn file_exists(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "file_exists")?;
    Ok(Value::Bool(fs::metadata(&path).await.is_ok()))
}

pub async fn is_file(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "is_file")?;
    let is_file = fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
    Ok(Value::Bool(is_file))
}

pub async fn is_dir(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "is_dir")?;
    let is_dir = fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false);
    Ok(Value::Bool(is_dir))
}

fn recursive_flag(args: &Value) -> bool {
    field(args, "recursive").and_then(Value::as_bool).unwrap_or(false)
}

pub async fn mkdir(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "mkdir")?;
    let result = if recursive_flag(&args) {
        fs::create_dir_all(&path).await
    } else {
        fs::create_dir(&path).await
    };
    result.map_err(|e| op_error(format!("mkdir({path}): {e}")))?;
    Ok(Value::Null)
}

pub async fn rmdir(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "rmdir")?;
    let result = if recursive_flag(&args) {
        fs::remove_dir_all(&path).await
    } else {
        fs::remove_dir(&path).await
    };
    result.map_err(|e| op_error(format!("rmdir({path}): {e}")))?;
    Ok(Value::Null)
}

pub async fn list_dir(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "list_dir")?;
    let mut entries = fs::read_dir(&path)
        .await
        .map_err(|e| op_error(format!("list_dir({path}): {e}")))?;
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| op_error(format!("list_dir({path}): {e}")))?
    {
        names.push(Value::String(entry.file_name().to_string_lossy().into_owned()));
    }
    Ok(Value::List(names))
}

pub async fn copy_file(args: Value) -> Result<Value, NodeError> {
    let src = expect_string("copy_file", "src", field(&args, "src").unwrap_or(&Value::Null))?;
    let dst = expect_string("copy_file", "dst", field(&args, "dst").unwrap_or(&Value::Null))?;
    fs::copy(&src, &dst)
        .await
        .map_err(|e| op_error(format!("copy_file({src}, {dst}): {e}")))?;
    Ok(Value::Null)
}

pub async fn move_file(args: Value) -> Result<Value, NodeError> {
    let src = expect_string("move_file", "src", field(&args, "src").unwrap_or(&Value::Null))?;
    let dst = expect_string("move_file", "dst", field(&args, "dst").unwrap_or(&Value::Null))?;
    fs::rename(&src, &dst)
        .await
        .map_err(|e| op_error(format!("move_file({src}, {dst}): {e}")))?;
    Ok(Value::Null)
}

pub async fn file_size(args: Value) -> Result<Value, NodeError> {
    let path = path_of(&args, "file_size")?;
    let meta = fs::metadata(&path)
        .await
        .map_err(|e| op_error(format!("file_size({path}): {e}")))?;
    Ok(Value::Int(meta.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn struct_args(fields: Vec<(&str, Value)>) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        Value::Struct(map)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt").to_string_lossy().into_owned();

        write_file(struct_args(vec![
            ("path", Value::String(path.clone())),
            ("content", Value::String("hello".into())),
        ]))
        .await
        .unwrap();

        let read = read_file(struct_args(vec![("path", Value::String(path))])).await.unwrap();
        assert_eq!(read, Value::String("hello".into()));
    }

    #[tokio::test]
    async fn append_extends_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.txt").to_string_lossy().into_owned();
        write_file(struct_args(vec![
            ("path", Value::String(path.clone())),
            ("content", Value::String("A".into())),
        ]))
        .await
        .unwrap();
        append_file(struct_args(vec![
            ("path", Value::String(path.clone())),
            ("content", Value::String("B".into())),
        ]))
        .await
        .unwrap();
        let read = read_file(struct_args(vec![("path", Value::String(path))])).await.unwrap();
        assert_eq!(read, Value::String("AB".into()));
    }

    #[tokio::test]
    async fn file_exists_is_false_for_missing_path() {
        let result = file_exists(struct_args(vec![(
            "path",
            Value::String("/nonexistent/blueprint-test-path".into()),
        )]))
        .await
        .unwrap();
        assert_eq!(result, Value::Bool(false));
    }

    #[tokio::test]
    async fn mkdir_recursive_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("x/y/z").to_string_lossy().into_owned();
        mkdir(struct_args(vec![
            ("path", Value::String(nested.clone())),
            ("recursive", Value::Bool(true)),
        ]))
        .await
        .unwrap();
        let is_dir_result = is_dir(struct_args(vec![("path", Value::String(nested))])).await.unwrap();
        assert_eq!(is_dir_result, Value::Bool(true));
    }

    #[tokio::test]
    async fn read_missing_file_is_an_operation_error() {
        let err = read_file(struct_args(vec![(
            "path",
            Value::String("/nonexistent/blueprint-test-path".into()),
        )]))
        .await
        .unwrap_err();
        assert!(matches!(err, NodeError::Operation(_)));
    }
}
