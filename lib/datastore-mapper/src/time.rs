use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Record timestamp with microsecond precision.
///
/// Serialized as RFC 3339 with six fractional digits and a `Z` suffix so that
/// lexical and chronological ordering agree in every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| Timestamp(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(datetime_micros())
    }

    pub fn inner(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Current time truncated to microsecond precision (6 decimal places)
fn datetime_micros() -> DateTime<Utc> {
    let now = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(time) => time,
        Err(_) => std::time::Duration::from_secs(0),
    };

    let timestamp_micros = (now.as_secs() as i64 * 1_000_000) + (now.subsec_micros() as i64);
    if let Some(time) = DateTime::from_timestamp_micros(timestamp_micros) {
        time
    } else {
        DateTime::<Utc>::from_timestamp_nanos(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_micro_precision() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let ts = Timestamp(dt);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-03-01T10:20:30.123456Z\"");
    }

    #[test]
    fn now_has_no_sub_micro_component() {
        let ts = Timestamp::now();
        assert_eq!(ts.inner().timestamp_subsec_nanos() % 1_000, 0);
    }
}
