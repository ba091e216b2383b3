use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// Raw pedal value reported by the sensor when neither pedal is pressed.
pub const PEDAL_IDLE: i64 = -1;
pub const PEDAL_BRAKE: i64 = 0;
pub const PEDAL_ACCELERATOR: i64 = 1;

/// Upper bound of the sensor's angle domain, in degrees.
pub const MAX_SENSOR_ANGLE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PedalState {
    Accelerating,
    Braking,
    Idle,
}

impl PedalState {
    /// Exact match on the raw feed value. Anything outside {-1, 0, 1} has no state.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            PEDAL_ACCELERATOR => Some(Self::Accelerating),
            PEDAL_BRAKE => Some(Self::Braking),
            PEDAL_IDLE => Some(Self::Idle),
            _ => None,
        }
    }

    pub fn status_text(self) -> &'static str {
        match self {
            Self::Accelerating => "Current state: pressing the accelerator",
            Self::Braking => "Current state: pressing the brake",
            Self::Idle => "Current state: no pedal pressed",
        }
    }
}

/// One `sensor_data` payload as published by the pedal sensor service.
///
/// Fields are kept raw: the feed is not validated, so out-of-range pedal or
/// angle values flow through to the projection untouched. Publishers that
/// encode the pedal as `1.0` or omit the angle or timestamp are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    #[serde(deserialize_with = "integral_pedal")]
    pub pedal: i64,
    /// Missing or null angles read as the resting position.
    #[serde(default, deserialize_with = "number_or_zero")]
    pub angle: f64,
    /// Unix seconds. Missing or null timestamps read as NaN and render as an
    /// invalid date.
    #[serde(default = "missing_timestamp", deserialize_with = "number_or_nan")]
    pub timestamp: f64,
    #[serde(default)]
    pub sudden_acceleration: bool,
}

fn missing_timestamp() -> f64 {
    f64::NAN
}

fn integral_pedal<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(raw) = number.as_i64() {
        return Ok(raw);
    }
    match number.as_f64() {
        Some(raw) if raw.fract() == 0.0 && raw >= i64::MIN as f64 && raw < i64::MAX as f64 => {
            Ok(raw as i64)
        }
        _ => Err(D::Error::custom(format!(
            "pedal {number} is not an integral number"
        ))),
    }
}

fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(|value| value.unwrap_or(0.0))
}

fn number_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(|value| value.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pedal_state_matches_raw_values_exactly() {
        assert_eq!(PedalState::from_raw(1), Some(PedalState::Accelerating));
        assert_eq!(PedalState::from_raw(0), Some(PedalState::Braking));
        assert_eq!(PedalState::from_raw(-1), Some(PedalState::Idle));
        assert_eq!(PedalState::from_raw(2), None);
    }

    #[test]
    fn sensor_event_defaults_missing_sudden_acceleration_flag() {
        let event: SensorEvent =
            serde_json::from_str(r#"{"pedal":1,"angle":4.5,"timestamp":1700000000.25}"#)
                .expect("event");
        assert_eq!(event.pedal, 1);
        assert_eq!(event.angle, 4.5);
        assert!(!event.sudden_acceleration);
    }

    #[test]
    fn sensor_event_keeps_unrecognized_pedal_values() {
        let event: SensorEvent = serde_json::from_str(
            r#"{"pedal":7,"angle":30,"timestamp":1,"sudden_acceleration":true}"#,
        )
        .expect("event");
        assert_eq!(PedalState::from_raw(event.pedal), None);
        assert_eq!(event.angle, 30.0);
    }

    #[test]
    fn sensor_event_accepts_integral_float_pedal() {
        let event: SensorEvent =
            serde_json::from_str(r#"{"pedal":1.0,"angle":12.5,"timestamp":5}"#).expect("event");
        assert_eq!(event.pedal, 1);
        assert_eq!(PedalState::from_raw(event.pedal), Some(PedalState::Accelerating));

        let idle: SensorEvent =
            serde_json::from_str(r#"{"pedal":-1.0,"angle":0,"timestamp":6}"#).expect("event");
        assert_eq!(idle.pedal, PEDAL_IDLE);
    }

    #[test]
    fn sensor_event_rejects_fractional_pedal() {
        let err = serde_json::from_str::<SensorEvent>(r#"{"pedal":0.5,"angle":1,"timestamp":1}"#)
            .expect_err("fractional pedal");
        assert!(err.to_string().contains("not an integral number"));
    }

    #[test]
    fn sensor_event_defaults_missing_or_null_angle_to_rest() {
        let missing: SensorEvent =
            serde_json::from_str(r#"{"pedal":0,"timestamp":1}"#).expect("event");
        assert_eq!(missing.angle, 0.0);

        let null: SensorEvent =
            serde_json::from_str(r#"{"pedal":0,"angle":null,"timestamp":1}"#).expect("event");
        assert_eq!(null.angle, 0.0);
    }

    #[test]
    fn sensor_event_keeps_missing_or_null_timestamp_as_nan() {
        let missing: SensorEvent =
            serde_json::from_str(r#"{"pedal":1,"angle":3}"#).expect("event");
        assert!(missing.timestamp.is_nan());

        let null: SensorEvent =
            serde_json::from_str(r#"{"pedal":1,"angle":3,"timestamp":null}"#).expect("event");
        assert!(null.timestamp.is_nan());
    }
}
