//! Dispatch of `call(...)` to application-defined actions

use parking_lot::Mutex;

use crate::core::Value;
use crate::error::ExpressionResult;

pub trait ActionCaller: Send + Sync {
    /// Invoke the action registered under `key` with the given payloads
    fn call(&self, key: &str, payloads: &[Value]) -> ExpressionResult<Value>;
}

/// Records every call and answers with the empty string
#[derive(Debug, Default)]
pub struct RecordingActionCaller {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingActionCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }
}

impl ActionCaller for RecordingActionCaller {
    fn call(&self, key: &str, payloads: &[Value]) -> ExpressionResult<Value> {
        self.calls.lock().push((key.to_string(), payloads.to_vec()));
        Ok(Value::empty())
    }
}
