//! Channel definitions and reading validation.
//!
//! Each sensor channel has a raw payload schema (what the device actually
//! publishes) and a canonical reading (what gets buffered and persisted,
//! including derived fields). Validation deserializes the raw schema out
//! of the decoded JSON payload and converts it into the canonical form;
//! a missing or wrong-typed required field rejects the whole message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IngestError;
use crate::units;

/// One logical sensor stream with its own topic, schema, buffer slot and
/// target table. The set is fixed at startup.
///
/// The fire-and-forget control log is not a `Channel`: it has no buffer
/// and no flush timer (see [`validate_control`] and the router).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    FrontDoor,
    BackDoor,
    MeetingRoom1,
    MeetingRoom2,
    MeetingRoom1Fan,
    PowerBox,
    ServerRoom,
    AirConditioner,
    Dl303,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::FrontDoor,
        Channel::BackDoor,
        Channel::MeetingRoom1,
        Channel::MeetingRoom2,
        Channel::MeetingRoom1Fan,
        Channel::PowerBox,
        Channel::ServerRoom,
        Channel::AirConditioner,
        Channel::Dl303,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn name(self) -> &'static str {
        match self {
            Channel::FrontDoor => "front-door",
            Channel::BackDoor => "back-door",
            Channel::MeetingRoom1 => "meeting-room-1",
            Channel::MeetingRoom2 => "meeting-room-2",
            Channel::MeetingRoom1Fan => "meeting-room-1-fan",
            Channel::PowerBox => "power-box",
            Channel::ServerRoom => "server-room",
            Channel::AirConditioner => "air-conditioner",
            Channel::Dl303 => "dl303",
        }
    }

    /// Target table for this channel's snapshot rows.
    pub fn table(self) -> &'static str {
        match self {
            Channel::FrontDoor => "front_door",
            Channel::BackDoor => "back_door",
            Channel::MeetingRoom1 => "meeting_room_1",
            Channel::MeetingRoom2 => "meeting_room_2",
            Channel::MeetingRoom1Fan => "meeting_room_1_fan",
            Channel::PowerBox => "power_box",
            Channel::ServerRoom => "server_room",
            Channel::AirConditioner => "air_conditioner",
            Channel::Dl303 => "dl303",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Validate a decoded payload against this channel's schema and build
    /// the canonical reading, computing derived fields.
    pub fn validate(self, raw: &Value) -> Result<Reading, IngestError> {
        match self {
            Channel::FrontDoor | Channel::BackDoor => {
                let raw: DoorRaw = deserialize(self, raw)?;
                Ok(Reading::Door(raw.into()))
            }
            Channel::MeetingRoom1 | Channel::MeetingRoom2 => {
                let raw: MeetingRoomRaw = deserialize(self, raw)?;
                Ok(Reading::MeetingRoom(raw.into()))
            }
            Channel::MeetingRoom1Fan => {
                let raw: FanRaw = deserialize(self, raw)?;
                Ok(Reading::Fan(FanReading { fan_0: raw.fan_0 }))
            }
            Channel::PowerBox => {
                let raw: PowerRaw = deserialize(self, raw)?;
                Ok(Reading::Power(raw.into()))
            }
            Channel::ServerRoom => {
                let raw: ServerRoomRaw = deserialize(self, raw)?;
                Ok(Reading::ServerRoom(ServerRoomReading {
                    temperature: raw.temperature,
                    humidity: raw.humidity,
                }))
            }
            Channel::AirConditioner => {
                let raw: StatusRaw = deserialize(self, raw)?;
                Ok(Reading::Status(StatusReading {
                    status: units::status_is_on(&raw.status),
                }))
            }
            Channel::Dl303 => {
                let raw: Dl303Raw = deserialize(self, raw)?;
                Ok(Reading::Dl303(raw.into()))
            }
        }
    }
}

/// Validate a control-log payload. Control messages carry only a status
/// string and are persisted immediately by the router, never buffered.
pub fn validate_control(raw: &Value) -> Result<StatusReading, IngestError> {
    let parsed: StatusRaw = StatusRaw::deserialize(raw).map_err(|e| malformed(CONTROL_LOG_NAME, raw, e))?;
    Ok(StatusReading {
        status: units::control_is_on(&parsed.status),
    })
}

pub const CONTROL_LOG_NAME: &str = "ac-control-log";
pub const CONTROL_LOG_TABLE: &str = "ac_control_log";

fn deserialize<'de, T: Deserialize<'de>>(channel: Channel, raw: &'de Value) -> Result<T, IngestError> {
    T::deserialize(raw).map_err(|e| malformed(channel.name(), raw, e))
}

fn malformed(channel: &'static str, raw: &Value, err: serde_json::Error) -> IngestError {
    IngestError::MalformedReading {
        channel,
        reason: err.to_string(),
        payload: raw.to_string(),
    }
}

/// A validated, normalized sensor update. Immutable once constructed;
/// serializes untagged to the flat column map that gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Door(DoorReading),
    MeetingRoom(MeetingRoomReading),
    Fan(FanReading),
    Power(PowerReading),
    ServerRoom(ServerRoomReading),
    Status(StatusReading),
    Dl303(Dl303Reading),
}

impl Reading {
    /// The all-defaults reading a flush tick persists when no message
    /// arrived for the channel since the last flush.
    pub fn default_for(channel: Channel) -> Reading {
        match channel {
            Channel::FrontDoor | Channel::BackDoor => Reading::Door(DoorReading::default()),
            Channel::MeetingRoom1 | Channel::MeetingRoom2 => {
                Reading::MeetingRoom(MeetingRoomReading::default())
            }
            Channel::MeetingRoom1Fan => Reading::Fan(FanReading::default()),
            Channel::PowerBox => Reading::Power(PowerReading::default()),
            Channel::ServerRoom => Reading::ServerRoom(ServerRoomReading::default()),
            Channel::AirConditioner => Reading::Status(StatusReading::default()),
            Channel::Dl303 => Reading::Dl303(Dl303Reading::default()),
        }
    }
}

// Raw payload schemas. Field names match the JSON keys the devices publish.

#[derive(Debug, Deserialize)]
struct DoorRaw {
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
    #[serde(rename = "CO2")]
    co2: f64,
    #[serde(rename = "TVOC")]
    tvoc: f64,
    fan_0: String,
    fan_1: String,
}

#[derive(Debug, Deserialize)]
struct MeetingRoomRaw {
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
    #[serde(rename = "CO2")]
    co2: f64,
    #[serde(rename = "TVOC")]
    tvoc: f64,
}

#[derive(Debug, Deserialize)]
struct FanRaw {
    fan_0: String,
}

#[derive(Debug, Deserialize)]
struct PowerRaw {
    #[serde(rename = "IN_A")]
    in_a: f64,
    #[serde(rename = "IN_B")]
    in_b: f64,
    #[serde(rename = "IN_C")]
    in_c: f64,
    #[serde(rename = "IN_Avg")]
    in_avg: f64,
}

#[derive(Debug, Deserialize)]
struct ServerRoomRaw {
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct StatusRaw {
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct Dl303Raw {
    #[serde(rename = "TemperatureC")]
    temperature: f64,
    #[serde(rename = "Humidity")]
    humidity: f64,
    #[serde(rename = "DewPointC")]
    dew_point: f64,
    #[serde(rename = "CO2")]
    co2: f64,
}

// Canonical readings. Field names double as persisted column names.

/// Door-side IAQ unit with two fan relays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DoorReading {
    pub temperature: f64,
    pub humidity: f64,
    pub co2: f64,
    pub tvoc: f64,
    pub fan_0: String,
    pub fan_1: String,
}

impl From<DoorRaw> for DoorReading {
    fn from(raw: DoorRaw) -> Self {
        DoorReading {
            temperature: raw.temperature,
            humidity: raw.humidity,
            co2: raw.co2,
            tvoc: raw.tvoc,
            fan_0: raw.fan_0,
            fan_1: raw.fan_1,
        }
    }
}

/// Meeting-room IAQ unit; carries both the raw and the calibrated CO2.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeetingRoomReading {
    pub temperature: f64,
    pub humidity: f64,
    pub co2: f64,
    pub tvoc: f64,
    pub co2_adjusted: f64,
}

impl From<MeetingRoomRaw> for MeetingRoomReading {
    fn from(raw: MeetingRoomRaw) -> Self {
        MeetingRoomReading {
            temperature: raw.temperature,
            humidity: raw.humidity,
            co2: raw.co2,
            tvoc: raw.tvoc,
            co2_adjusted: units::calibrate_co2(raw.co2),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanReading {
    pub fan_0: String,
}

/// Three-phase power meter; per-phase kW and the total are derived from
/// line currents at validation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerReading {
    pub in_a: f64,
    pub in_b: f64,
    pub in_c: f64,
    pub in_avg: f64,
    pub kw_a: f64,
    pub kw_b: f64,
    pub kw_c: f64,
    pub kw_tot: f64,
}

impl From<PowerRaw> for PowerReading {
    fn from(raw: PowerRaw) -> Self {
        let kw_a = units::current_to_kilowatts(raw.in_a);
        let kw_b = units::current_to_kilowatts(raw.in_b);
        let kw_c = units::current_to_kilowatts(raw.in_c);
        PowerReading {
            in_a: raw.in_a,
            in_b: raw.in_b,
            in_c: raw.in_c,
            in_avg: raw.in_avg,
            kw_a,
            kw_b,
            kw_c,
            kw_tot: kw_a + kw_b + kw_c,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerRoomReading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Normalized on/off state, persisted as a boolean for both the buffered
/// air-conditioner channel and the immediate control log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReading {
    pub status: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dl303Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub dew_point: f64,
    pub co2: f64,
}

impl From<Dl303Raw> for Dl303Reading {
    fn from(raw: Dl303Raw) -> Self {
        Dl303Reading {
            temperature: raw.temperature,
            humidity: raw.humidity,
            dew_point: raw.dew_point,
            co2: raw.co2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_door_reading_valid() {
        let raw = json!({
            "Temperature": 25.1, "Humidity": 60.2, "CO2": 410, "TVOC": 12,
            "fan_0": "1", "fan_1": "0"
        });
        let reading = Channel::FrontDoor.validate(&raw).unwrap();
        assert_eq!(
            reading,
            Reading::Door(DoorReading {
                temperature: 25.1,
                humidity: 60.2,
                co2: 410.0,
                tvoc: 12.0,
                fan_0: "1".to_string(),
                fan_1: "0".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let raw = json!({"Temperature": 25.1, "Humidity": 60.2});
        let err = Channel::FrontDoor.validate(&raw).unwrap_err();
        let IngestError::MalformedReading { channel, payload, .. } = err;
        assert_eq!(channel, "front-door");
        assert!(payload.contains("25.1"));
    }

    #[test]
    fn test_wrong_typed_field_rejected() {
        let raw = json!({
            "Temperature": "hot", "Humidity": 60.2, "CO2": 410, "TVOC": 12,
            "fan_0": "1", "fan_1": "0"
        });
        assert!(Channel::FrontDoor.validate(&raw).is_err());
    }

    #[test]
    fn test_empty_object_rejected_everywhere() {
        let raw = json!({});
        for channel in Channel::ALL {
            assert!(channel.validate(&raw).is_err(), "{}", channel.name());
        }
    }

    #[test]
    fn test_extra_fields_ignored() {
        let raw = json!({"Temperature": 21.0, "Humidity": 45.0, "Hostname": "ac-unit"});
        assert!(Channel::ServerRoom.validate(&raw).is_ok());
    }

    #[test]
    fn test_meeting_room_co2_calibration() {
        let raw = json!({"Temperature": 22.0, "Humidity": 50.0, "CO2": 700.0, "TVOC": 3.0});
        let Reading::MeetingRoom(reading) = Channel::MeetingRoom1.validate(&raw).unwrap() else {
            panic!("wrong reading variant");
        };
        assert!((reading.co2_adjusted - 200.0).abs() < 1e-9);
        assert_eq!(reading.co2, 700.0);
    }

    #[test]
    fn test_power_box_derivation() {
        let raw = json!({"IN_A": 10, "IN_B": 10, "IN_C": 10, "IN_Avg": 10});
        let Reading::Power(reading) = Channel::PowerBox.validate(&raw).unwrap() else {
            panic!("wrong reading variant");
        };
        let expected_phase = (10.0 / 1.732) * 220.0 / 1000.0;
        assert!((reading.kw_a - expected_phase).abs() < 1e-9);
        assert!((reading.kw_b - expected_phase).abs() < 1e-9);
        assert!((reading.kw_c - expected_phase).abs() < 1e-9);
        let relative = (reading.kw_tot - 3.0 * expected_phase).abs() / reading.kw_tot;
        assert!(relative < 1e-9);
        // Sanity against the known meter values
        assert!((reading.kw_a - 1.2702).abs() < 1e-4);
        assert!((reading.kw_tot - 3.8105).abs() < 1e-4);
    }

    #[test]
    fn test_status_normalization() {
        for (raw, expected) in [("On", true), ("ON", true), ("on", false), ("off", false), ("", false)] {
            let value = json!({"Status": raw});
            let Reading::Status(reading) = Channel::AirConditioner.validate(&value).unwrap() else {
                panic!("wrong reading variant");
            };
            assert_eq!(reading.status, expected, "Status = {raw:?}");
        }
    }

    #[test]
    fn test_control_log_normalization() {
        for (raw, expected) in [("ON", true), ("On", false), ("OFF", false)] {
            let value = json!({"Status": raw});
            assert_eq!(validate_control(&value).unwrap().status, expected, "Status = {raw:?}");
        }
        assert!(validate_control(&json!({})).is_err());
    }

    #[test]
    fn test_integer_payloads_coerce_to_float() {
        let raw = json!({"TemperatureC": 24, "Humidity": 55, "DewPointC": 14, "CO2": 420});
        let Reading::Dl303(reading) = Channel::Dl303.validate(&raw).unwrap() else {
            panic!("wrong reading variant");
        };
        assert_eq!(reading.temperature, 24.0);
        assert_eq!(reading.co2, 420.0);
    }

    #[test]
    fn test_reading_serializes_to_flat_column_map() {
        let reading = Reading::Power(PowerReading::default());
        let value = serde_json::to_value(&reading).unwrap();
        let map = value.as_object().unwrap();
        assert!(map.contains_key("in_a"));
        assert!(map.contains_key("kw_tot"));
        assert_eq!(map.len(), 8);
    }
}
