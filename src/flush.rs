//! Periodic snapshot flush.
//!
//! One independent timer task per channel. On every tick the channel's
//! buffer slot is taken and a row is written, whether or not a message
//! arrived since the last flush — an empty slot persists the channel's
//! default reading. That matches the deployed snapshotting behavior,
//! debatable as it is: consumers see one row per period per channel, and
//! a quiet channel produces rows of defaults. On insert failure the tick's
//! reading is already gone from the buffer and is lost; there is no retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::buffer::BufferStore;
use crate::reading::{Channel, Reading};
use crate::sink::{Record, Sink};

/// Wall-clock timestamp in the configured fixed offset, formatted the way
/// the channel tables store it.
pub fn wall_clock(offset: FixedOffset) -> String {
    Utc::now()
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Spawn one flush task per channel. The tasks run until the process
/// exits; a slow insert on one channel never delays another channel's
/// timer or the dispatch path.
pub fn spawn_flush_tasks(
    buffers: Arc<BufferStore>,
    sink: Arc<dyn Sink>,
    period: Duration,
    offset: FixedOffset,
) -> Vec<JoinHandle<()>> {
    Channel::ALL
        .iter()
        .map(|&channel| {
            let buffers = Arc::clone(&buffers);
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // interval fires immediately; skip that so the first row
                // lands one full period after startup.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    flush_channel(&buffers, sink.as_ref(), channel, offset).await;
                }
            })
        })
        .collect()
}

/// One flush tick for one channel: take the buffer slot, build the
/// snapshot record with a fresh timestamp, insert it.
pub async fn flush_channel(
    buffers: &BufferStore,
    sink: &dyn Sink,
    channel: Channel,
    offset: FixedOffset,
) {
    let reading = buffers
        .take(channel)
        .unwrap_or_else(|| Reading::default_for(channel));
    let record = Record::new(channel.table(), wall_clock(offset), &reading);
    match sink.insert(&record).await {
        Ok(()) => debug!(channel = channel.name(), "snapshot persisted"),
        Err(e) => error!(
            channel = channel.name(),
            error = %e,
            "snapshot insert failed, reading for this tick is lost"
        ),
    }
}
