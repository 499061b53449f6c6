//! Timer drivers — `sleep`, `now`.

use super::{expect_number, field, op_error};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub async fn sleep(args: Value) -> Result<Value, NodeError> {
    let seconds = expect_number("sleep", "seconds", field(&args, "seconds").unwrap_or(&Value::Null))?;
    if seconds < 0.0 || !seconds.is_finite() {
        return Err(op_error(format!("sleep: `seconds` must be non-negative and finite, got {seconds}")));
    }
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    Ok(Value::Null)
}

pub fn now() -> Result<Value, NodeError> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| op_error(format!("now: system clock before epoch: {e}")))?;
    Ok(Value::Float(epoch.as_secs_f64()))
}
