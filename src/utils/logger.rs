use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "academy-backend";

#[derive(Debug)]
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_error(&self, error: &str, context: HashMap<String, Value>) {
        let log_entry = self.entry("error", json!({ "error_message": error }), context);
        error!("{}", log_entry);
    }

    pub fn log_business_event(
        &self,
        event_name: &str,
        user_id: Option<i32>,
        metadata: HashMap<String, Value>,
    ) {
        let log_entry = self.entry(
            "business_event",
            json!({ "event_name": event_name, "user_id": user_id }),
            metadata,
        );
        info!("{}", log_entry);
    }

    /// Denied or suspicious requests: wrong role, reused bank references.
    pub fn log_security_event(
        &self,
        event_name: &str,
        user_id: Option<i32>,
        metadata: HashMap<String, Value>,
    ) {
        let log_entry = self.entry(
            "security_event",
            json!({ "event_name": event_name, "user_id": user_id }),
            metadata,
        );
        warn!("{}", log_entry);
    }

    fn entry(&self, event_type: &str, base: Value, extra: HashMap<String, Value>) -> Value {
        let mut log_entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": event_type,
            "service": SERVICE_NAME
        });

        if let Value::Object(fields) = base {
            for (key, value) in fields {
                log_entry[key] = value;
            }
        }
        for (key, value) in extra {
            log_entry[key] = value;
        }

        log_entry
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new()
    }
}

pub static LOGGER: StructuredLogger = StructuredLogger;

/// Builds the metadata map the logger methods take.
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> HashMap<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
