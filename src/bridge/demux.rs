//! Landing point for results reported by the page agent.

use crate::bridge::pending::{CallId, PendingCalls, Rejection, Settlement};
use crate::error::{CrebassError, Result};
use serde_json::Value;

pub const STATUS_OK: i64 = 0;
pub const STATUS_ERROR: i64 = 1;

/// Decode a `[status, payload]` pair.
pub fn decode(encoded: &str) -> Result<Settlement> {
    let value: Value = serde_json::from_str(encoded)?;
    let mut pair = match value {
        Value::Array(items) if items.len() == 2 => items,
        other => {
            return Err(CrebassError::Decode(format!(
                "expected [status, payload], got {}",
                other
            )))
        }
    };
    let payload = pair.pop().unwrap_or(Value::Null);
    let status = pair
        .pop()
        .and_then(|s| s.as_i64())
        .ok_or_else(|| CrebassError::Decode("status is not an integer".to_string()))?;

    if status == STATUS_OK {
        Ok(Ok(payload))
    } else {
        Ok(Err(Rejection::Evaluation(payload)))
    }
}

/// Settle the pending call `id` with the page's encoded result.
///
/// The entry is removed whether or not the payload decodes; a malformed payload
/// settles the call with [`Rejection::Malformed`] and is reported as `Decode`.
pub fn resolve(table: &PendingCalls, id: CallId, encoded: &str) -> Result<()> {
    if !table.contains(id) {
        return Err(CrebassError::Lookup(id));
    }

    match decode(encoded) {
        Ok(settlement) => {
            if !table.settle(id, settlement) {
                return Err(CrebassError::Lookup(id));
            }
            Ok(())
        }
        Err(e) => {
            table.settle(id, Err(Rejection::Malformed(encoded.to_string())));
            Err(e)
        }
    }
}
