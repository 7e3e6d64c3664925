//! The host callback object installed on every document as `document.__crebass__`.

use crate::automation::native::{Dispatch, MemberInfo};
use crate::automation::variant::Variant;
use crate::bridge::demux;
use crate::bridge::pending::{CallId, PendingCalls};
use crate::error::{CrebassError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct HostBridge {
    calls: Arc<PendingCalls>,
}

impl HostBridge {
    pub fn new(calls: Arc<PendingCalls>) -> Self {
        Self { calls }
    }

    pub fn calls(&self) -> &Arc<PendingCalls> {
        &self.calls
    }

    pub fn log(&self, channel: &str, values: &[Variant]) {
        let content = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "crebass::page", "[CREBASS] {}: {}", channel, content);
    }

    /// Forward console arguments serialized by the page. Returns whether
    /// anything was forwarded; malformed input is logged and swallowed.
    pub fn log_json(&self, channel: &str, json: &str) -> bool {
        match decode_console_args(json) {
            Ok(args) if args.is_empty() => false,
            Ok(args) => {
                let content = args
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                tracing::info!(target: "crebass::page", "[CREBASS] {}: {}", channel, content);
                true
            }
            Err(e) => {
                tracing::error!(target: "crebass::page", "logJson on {} failed: {}", channel, e);
                false
            }
        }
    }

    pub fn onerror(&self, message: &str, url: &str, line: i64, column: i64, error_json: &str) {
        tracing::error!(
            target: "crebass::page",
            "onerror {} at {}:{}:{} {}",
            message,
            url,
            line,
            column,
            error_json
        );
    }

    /// Host time in milliseconds since the Unix epoch.
    pub fn ping(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }

    /// Settle a pending call. Failures are logged, never returned to the page.
    pub fn resolve(&self, id: CallId, encoded: &str) {
        match demux::resolve(&self.calls, id, encoded) {
            Ok(()) => tracing::trace!("Resolved call {}", id),
            Err(CrebassError::Lookup(id)) => {
                tracing::warn!("resolve for unknown call {} dropped", id)
            }
            Err(e) => tracing::error!("resolve for call {} failed: {}", id, e),
        }
    }
}

/// Parse console arguments: a JSON array, or the array-like object older
/// engines produce when serializing `arguments`.
pub fn decode_console_args(json: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut indexed = map
                .into_iter()
                .map(|(k, v)| {
                    k.parse::<usize>()
                        .map(|i| (i, v))
                        .map_err(|_| CrebassError::Decode(format!("non-index key {:?}", k)))
                })
                .collect::<Result<Vec<_>>>()?;
            indexed.sort_by_key(|(i, _)| *i);
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        other => Err(CrebassError::Decode(format!(
            "expected an array, got {}",
            other
        ))),
    }
}

fn arg<'a>(args: &'a [Variant], index: usize) -> &'a Variant {
    args.get(index).unwrap_or(&Variant::Empty)
}

fn arg_string(args: &[Variant], index: usize) -> String {
    match arg(args, index) {
        Variant::Empty | Variant::Null => String::new(),
        other => other.to_string(),
    }
}

impl Dispatch for HostBridge {
    fn members(&self) -> Vec<MemberInfo> {
        ["log", "logJson", "onerror", "ping", "resolve"]
            .into_iter()
            .map(MemberInfo::method)
            .collect()
    }

    fn get(&self, name: &str) -> Result<Variant> {
        Err(CrebassError::dispatch(name, "host bridge has no properties"))
    }

    fn put(&self, name: &str, _value: Variant) -> Result<()> {
        Err(CrebassError::dispatch(name, "host bridge is read-only"))
    }

    fn call(&self, name: &str, args: &[Variant]) -> Result<Variant> {
        match name {
            "log" => {
                self.log(&arg_string(args, 0), args.get(1..).unwrap_or_default());
                Ok(Variant::Empty)
            }
            "logJson" => {
                self.log_json(&arg_string(args, 0), &arg_string(args, 1));
                Ok(Variant::Empty)
            }
            "onerror" => {
                self.onerror(
                    &arg_string(args, 0),
                    &arg_string(args, 1),
                    arg(args, 2).as_i64().unwrap_or_default(),
                    arg(args, 3).as_i64().unwrap_or_default(),
                    &arg_string(args, 4),
                );
                Ok(Variant::Empty)
            }
            "ping" => Ok(Variant::Int(self.ping())),
            "resolve" => {
                match arg(args, 0).as_i64() {
                    Some(id) if id >= 0 => self.resolve(id as CallId, &arg_string(args, 1)),
                    _ => tracing::error!("resolve called without a call id: {:?}", arg(args, 0)),
                }
                Ok(Variant::Empty)
            }
            other => Err(CrebassError::dispatch(other, "unknown host method")),
        }
    }
}
