//! Serializes `Duration`s as fractional milliseconds.

use std::time::Duration;

use serde::Serializer;

#[allow(clippy::cast_precision_loss)]
pub fn to_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(to_millis(*duration))
}

pub fn serialize_opt<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serialize(d, serializer),
        None => serializer.serialize_none(),
    }
}
