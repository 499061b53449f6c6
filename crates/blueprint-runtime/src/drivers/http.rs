//! HTTP driver — `http_request`.
//!
//! Non-2xx status is *not* an `OperationError`: it resolves to a
//! successful `{status, headers, body}` struct. Only transport/parse
//! failures are `OperationError`.

use super::{expect_string, field, op_error};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub async fn http_request(client: &reqwest::Client, args: Value, default_timeout_ms: u64) -> Result<Value, NodeError> {
    let method = expect_string("http_request", "method", field(&args, "method").unwrap_or(&Value::Null))?;
    let url = expect_string("http_request", "url", field(&args, "url").unwrap_or(&Value::Null))?;
    let method: reqwest::Method = method
        .parse()
        .map_err(|_| op_error(format!("http_request: invalid method `{method}`")))?;

    let mut builder = client
        .request(method, &url)
        .timeout(Duration::from_millis(default_timeout_ms));

    if let Some(Value::Map(headers)) = field(&args, "headers") {
        for (k, v) in headers {
            if let Value::String(value) = v {
                builder = builder.header(k.to_string(), value.clone());
            }
        }
    }

    match field(&args, "body") {
        Some(Value::String(body)) => builder = builder.body(body.clone()),
        Some(Value::Bytes(body)) => builder = builder.body(body.clone()),
        _ => {}
    }

    let response = builder
        .send()
        .await
        .map_err(|e| op_error(format!("http_request({url}): {e}")))?;

    let status = response.status().as_u16() as i64;
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(
                blueprint_kernel::value::MapKey::String(name.to_string()),
                Value::String(value.to_string()),
            );
        }
    }
    let body = response
        .text()
        .await
        .map_err(|e| op_error(format!("http_request({url}): reading body: {e}")))?;

    let mut result = BTreeMap::new();
    result.insert("status".to_string(), Value::Int(status));
    result.insert("headers".to_string(), Value::Map(headers));
    result.insert("body".to_string(), Value::String(body));
    Ok(Value::Struct(result))
}
