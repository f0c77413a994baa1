use std::time::Duration;

use dust_ask_protocol::StreamEvent;
use serde::{Deserialize, Serialize};

/// An event delivered by a preset stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetEvent {
    /// How long to wait after the previous event, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// The event to deliver.
    pub event: StreamEvent,
}

impl PresetEvent {
    /// An event delivered right after the previous one.
    #[inline]
    pub fn now(event: StreamEvent) -> Self {
        Self { delay_ms: 0, event }
    }

    /// An event delivered `delay` after the previous one.
    #[inline]
    pub fn after(delay: Duration, event: StreamEvent) -> Self {
        Self {
            delay_ms: delay.as_millis() as u64,
            event,
        }
    }

    #[inline]
    pub(crate) fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// The preset event stream of the agent reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetStream {
    /// Events in delivery order.
    pub events: Vec<PresetEvent>,
}

impl PresetStream {
    /// Creates a stream delivering `events` without delay.
    #[inline]
    pub fn with_events(events: impl IntoIterator<Item = StreamEvent>) -> Self {
        Self {
            events: events.into_iter().map(PresetEvent::now).collect(),
        }
    }

    /// Creates a stream from timed events.
    #[inline]
    pub fn with_timed_events(
        events: impl IntoIterator<Item = PresetEvent>,
    ) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}
