//! Topic routing and message dispatch.
//!
//! The router owns the mapping from concrete leaf topics to channels. A
//! broad wildcard subscription means plenty of unrelated topics arrive
//! here; those are dropped silently. Buffered channels validate and
//! overwrite their slot; the control-log channel validates and persists
//! immediately on a detached task so dispatch never waits on the sink.

use std::sync::Arc;

use chrono::FixedOffset;
use serde_json::Value;
use tracing::{error, trace};

use crate::buffer::BufferStore;
use crate::flush::wall_clock;
use crate::reading::{self, Channel, Reading};
use crate::sink::{Record, Sink};

/// Absolute topic of the standalone DL303 sensor (own topic root, not
/// under the device-group prefix).
pub const DL303_TOPIC: &str = "DL303/Info";

pub struct Router {
    buffers: Arc<BufferStore>,
    sink: Arc<dyn Sink>,
    prefix: String,
    offset: FixedOffset,
}

impl Router {
    pub fn new(
        buffers: Arc<BufferStore>,
        sink: Arc<dyn Sink>,
        prefix: String,
        offset: FixedOffset,
    ) -> Self {
        Self {
            buffers,
            sink,
            prefix,
            offset,
        }
    }

    /// Topic filters to subscribe at connect time: the DL303's own topic
    /// plus a wildcard over the whole device group.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![DL303_TOPIC.to_string(), format!("{}/#", self.prefix)]
    }

    /// Map a concrete topic to its buffered channel, by exact match.
    fn route(&self, topic: &str) -> Option<Channel> {
        if topic == DL303_TOPIC {
            return Some(Channel::Dl303);
        }
        match self.leaf(topic)? {
            "IAQ/1" => Some(Channel::BackDoor),
            "IAQ/2" => Some(Channel::FrontDoor),
            "IAQ/3" => Some(Channel::MeetingRoom1Fan),
            "MeetingRoom/1" => Some(Channel::MeetingRoom1),
            "MeetingRoom/2" => Some(Channel::MeetingRoom2),
            "PowerBox" => Some(Channel::PowerBox),
            "Air_Condiction/A" => Some(Channel::ServerRoom),
            "Air_Condiction/A/switch" => Some(Channel::AirConditioner),
            _ => None,
        }
    }

    fn leaf<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    fn is_control_topic(&self, topic: &str) -> bool {
        self.leaf(topic) == Some("Air_Condiction/A/control")
    }

    /// Entry point for every inbound broker message.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        let raw = decode_payload(payload);

        if self.is_control_topic(topic) {
            self.handle_control(&raw);
            return;
        }

        let Some(channel) = self.route(topic) else {
            trace!(topic, "no channel for topic, dropping");
            return;
        };

        match channel.validate(&raw) {
            Ok(valid) => self.buffers.store(channel, valid),
            Err(e) => error!(error = %e, "discarding reading"),
        }
    }

    /// Control messages are audit-log entries: one row per valid message,
    /// written as soon as it arrives, no buffer, no timer.
    fn handle_control(&self, raw: &Value) {
        let status = match reading::validate_control(raw) {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "discarding control message");
                return;
            }
        };
        let record = Record::new(
            reading::CONTROL_LOG_TABLE,
            wall_clock(self.offset),
            &Reading::Status(status),
        );
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.insert(&record).await {
                error!(error = %e, "control log insert failed");
            }
        });
    }
}

/// Decode a payload as UTF-8 JSON; anything undecodable becomes an empty
/// object, which then fails required-field validation downstream.
fn decode_payload(payload: &[u8]) -> Value {
    match serde_json::from_slice(payload) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => Value::Object(serde_json::Map::new()),
    }
}
