//! Serde helpers for durations written as fractional seconds.
//!
//! Scenario and config files write `timeout = 1.5` rather than a nested
//! `{ secs, nanos }` table.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

fn from_secs<E: serde::de::Error>(secs: f64) -> Result<Duration, E> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| E::custom(format!("invalid duration {secs}: {e}")))
}

/// `Duration` as fractional seconds.
pub mod secs {
    use super::{Deserialize, Deserializer, Duration, Serializer, from_secs};

    /// Serialize a duration as fractional seconds.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// Deserialize fractional seconds into a duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        from_secs(f64::deserialize(deserializer)?)
    }
}

/// `Option<Duration>` as fractional seconds.
pub mod option_secs {
    use super::{Deserialize, Deserializer, Duration, Serializer, from_secs};

    /// Serialize an optional duration as fractional seconds.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional fractional seconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(from_secs)
            .transpose()
    }
}

/// Parse fractional seconds from user input (CLI flags, env vars).
///
/// # Errors
///
/// Returns a message if the value is not a finite, non-negative number.
pub fn parse_secs(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid number of seconds '{value}': {e}"))?;
    from_secs::<serde::de::value::Error>(secs).map_err(|e| e.to_string())
}
