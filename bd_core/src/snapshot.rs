// ABOUTME: Metrics snapshot pushed by the broker on every tick.
// ABOUTME: Lenient JSON decoding: absent fields default to zero, floats truncate.
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::{Error, Result};

/// One point-in-time metrics payload delivered by the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// Currently connected clients (gauge)
    #[serde(deserialize_with = "lenient_u64")]
    pub clients: u64,
    /// Cumulative publishes since broker start
    #[serde(deserialize_with = "lenient_u64")]
    pub publishes_total: u64,
    /// Cumulative bytes received by the broker
    #[serde(deserialize_with = "lenient_u64")]
    pub bytes_in_total: u64,
    /// Cumulative bytes sent by the broker
    #[serde(deserialize_with = "lenient_u64")]
    pub bytes_out_total: u64,
    /// Broker process uptime in whole seconds
    #[serde(deserialize_with = "lenient_u64")]
    pub uptime_sec: u64,
}

impl MetricsSnapshot {
    /// Decode a snapshot from the UTF-8 JSON text of one stream event
    ///
    /// # Errors
    ///
    /// Returns `Error::Payload` if the text is not a JSON object or a field
    /// holds a negative or non-numeric value.
    ///
    /// # Examples
    ///
    /// ```
    /// use bd_core::MetricsSnapshot;
    /// let snap = MetricsSnapshot::parse(r#"{"clients": 3, "uptime_sec": 12.75}"#).unwrap();
    /// assert_eq!(snap.clients, 3);
    /// assert_eq!(snap.uptime_sec, 12);
    /// assert_eq!(snap.publishes_total, 0);
    /// ```
    pub fn parse(payload: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        // Derived struct decoding would also accept a positional array
        if !value.is_object() {
            return Err(Error::Payload(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Accepts non-negative integers, non-negative floats (truncated) and null.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct CounterVisitor;

    impl<'de> de::Visitor<'de> for CounterVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative number")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative value {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<u64, E> {
            if v.is_finite() && v >= 0.0 {
                // `as` saturates at u64::MAX
                Ok(v.trunc() as u64)
            } else {
                Err(E::custom(format!("invalid value {}", v)))
            }
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<u64, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<u64, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(CounterVisitor)
}
