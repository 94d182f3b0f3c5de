//! Last-write-wins buffer slots, one per channel.
//!
//! The dispatch path overwrites a slot on every valid message; a flush
//! tick takes whatever is there and leaves the slot empty. Each slot has
//! its own lock so channels never contend with each other, and a store
//! and a take on the same channel serialize — a flushed reading is never
//! a mix of two messages, and no reading is flushed twice.

use std::sync::Mutex;

use crate::reading::{Channel, Reading};

pub struct BufferStore {
    slots: [Mutex<Option<Reading>>; Channel::COUNT],
}

impl BufferStore {
    pub fn new() -> Self {
        BufferStore {
            slots: std::array::from_fn(|_| Mutex::new(None)),
        }
    }

    /// Overwrite the channel's slot with the latest valid reading.
    pub fn store(&self, channel: Channel, reading: Reading) {
        *self.lock(channel) = Some(reading);
    }

    /// Atomically return the current reading (if any) and clear the slot.
    pub fn take(&self, channel: Channel) -> Option<Reading> {
        self.lock(channel).take()
    }

    fn lock(&self, channel: Channel) -> std::sync::MutexGuard<'_, Option<Reading>> {
        // A poisoned slot still holds a coherent Option; keep going.
        self.slots[channel.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BufferStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{FanReading, StatusReading};

    #[test]
    fn test_take_clears_slot() {
        let buffers = BufferStore::new();
        buffers.store(
            Channel::MeetingRoom1Fan,
            Reading::Fan(FanReading { fan_0: "1".into() }),
        );
        assert!(buffers.take(Channel::MeetingRoom1Fan).is_some());
        assert!(buffers.take(Channel::MeetingRoom1Fan).is_none());
    }

    #[test]
    fn test_store_overwrites() {
        let buffers = BufferStore::new();
        buffers.store(
            Channel::AirConditioner,
            Reading::Status(StatusReading { status: false }),
        );
        buffers.store(
            Channel::AirConditioner,
            Reading::Status(StatusReading { status: true }),
        );
        assert_eq!(
            buffers.take(Channel::AirConditioner),
            Some(Reading::Status(StatusReading { status: true }))
        );
    }

    #[test]
    fn test_slots_are_independent() {
        let buffers = BufferStore::new();
        buffers.store(
            Channel::MeetingRoom1Fan,
            Reading::Fan(FanReading { fan_0: "0".into() }),
        );
        for channel in Channel::ALL {
            if channel != Channel::MeetingRoom1Fan {
                assert!(buffers.take(channel).is_none(), "{}", channel.name());
            }
        }
        assert!(buffers.take(Channel::MeetingRoom1Fan).is_some());
    }
}
