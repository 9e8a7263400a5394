//! JSON payloads exchanged with the robot and the game server.

use serde::{Deserialize, Deserializer, Serialize};

use crate::drive::MotorOutput;
use crate::link::error::DecodeError;

/// Key under which the game server may nest its status body.
pub const STATUS_ENVELOPE_KEY: &str = "estado_jogo";

/// Outbound motor command; motor 1 drives the left side, motor 2 the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub motor1_vel: i32,
    pub motor2_vel: i32,
}

impl MotorCommand {
    pub fn stop() -> Self {
        Self {
            motor1_vel: 0,
            motor2_vel: 0,
        }
    }

    /// Truncates toward zero, so the command never exceeds the smoothed value.
    pub fn from_output(output: MotorOutput) -> Self {
        Self {
            motor1_vel: output.left as i32,
            motor2_vel: output.right as i32,
        }
    }

    #[cfg(test)]
    pub fn is_stop(&self) -> bool {
        self.motor1_vel == 0 && self.motor2_vel == 0
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound game status. Missing keys read as `false`; other values by JSON truthiness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMessage {
    #[serde(deserialize_with = "truthy")]
    pub power_active: bool,
    #[serde(deserialize_with = "truthy")]
    pub game_over: bool,
}

// null, 0, "" and empty containers are false; everything else is true
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    })
}

/// Decodes a status payload, flat or nested under [`STATUS_ENVELOPE_KEY`].
pub fn decode_status(text: &str) -> Result<StatusMessage, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let body = match value {
        serde_json::Value::Object(mut map) => match map.remove(STATUS_ENVELOPE_KEY) {
            Some(inner) => inner,
            None => serde_json::Value::Object(map),
        },
        _ => return Err(DecodeError::NotAnObject),
    };

    if !body.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_encodes_expected_keys() {
        let command = MotorCommand {
            motor1_vel: -37,
            motor2_vel: 37,
        };
        assert_eq!(
            command.encode().unwrap(),
            r#"{"motor1_vel":-37,"motor2_vel":37}"#
        );
    }

    #[test]
    fn command_truncates_toward_zero() {
        let command = MotorCommand::from_output(MotorOutput {
            left: -37.5,
            right: 29.99,
        });
        assert_eq!(command.motor1_vel, -37);
        assert_eq!(command.motor2_vel, 29);
        assert!(MotorCommand::stop().is_stop());
    }

    #[test]
    fn decodes_flat_and_nested_status() {
        let flat = decode_status(r#"{"power_active": true, "game_over": false}"#).unwrap();
        assert_eq!(
            flat,
            StatusMessage {
                power_active: true,
                game_over: false
            }
        );

        let nested =
            decode_status(r#"{"estado_jogo": {"game_over": true}, "placar": 12}"#).unwrap();
        assert_eq!(
            nested,
            StatusMessage {
                power_active: false,
                game_over: true
            }
        );
    }

    #[test]
    fn unknown_keys_default_to_false() {
        let status = decode_status(r#"{"score": 3, "lives": 2}"#).unwrap();
        assert_eq!(status, StatusMessage::default());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(decode_status("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_status("[1, 2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(
            decode_status(r#"{"estado_jogo": "running"}"#),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn loosely_typed_flags_follow_truthiness() {
        let status = decode_status(r#"{"power_active": 1, "game_over": "yes"}"#).unwrap();
        assert!(status.power_active);
        assert!(status.game_over);

        let status = decode_status(r#"{"power_active": null, "game_over": 0}"#).unwrap();
        assert_eq!(status, StatusMessage::default());

        let nested = decode_status(r#"{"estado_jogo": {"game_over": 1}}"#).unwrap();
        assert!(nested.game_over);
    }
}
