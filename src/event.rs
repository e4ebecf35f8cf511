//! Event types delivered to media query listeners.
//!
//! `dispatch_event` only accepts instances of [`MediaEvent`]. Anything else a
//! caller might pass is modelled by [`EventArg::Value`] and rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type name that listeners respond to.
pub const CHANGE_EVENT: &str = "change";

/// An event object, analogous to a browser `MediaQueryListEvent`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEvent {
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub matches: bool,
    pub media: String,
    /// Milliseconds elapsed since the owning engine was created.
    #[serde(rename = "timeStamp")]
    pub time_stamp: i64,
}

impl MediaEvent {
    /// Creates an event of an arbitrary type.
    #[must_use]
    pub fn new(event_type: impl Into<String>, origin: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            matches: false,
            media: String::new(),
            time_stamp: elapsed_ms(origin),
        }
    }

    /// Creates a `"change"` event for a media query.
    #[must_use]
    pub fn change(media: impl Into<String>, matches: bool, origin: DateTime<Utc>) -> Self {
        Self {
            matches,
            media: media.into(),
            ..Self::new(CHANGE_EVENT, origin)
        }
    }

    /// Returns true if this is a `"change"` event.
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.event_type == CHANGE_EVENT
    }
}

fn elapsed_ms(origin: DateTime<Utc>) -> i64 {
    (Utc::now() - origin).num_milliseconds().max(0)
}

/// The argument passed to `dispatch_event`.
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    /// An instance of the event type.
    Event(MediaEvent),
    /// Any other value, such as a plain object that merely looks like an event.
    Value(serde_json::Value),
}

impl EventArg {
    /// The event, if this argument is one.
    #[must_use]
    pub const fn as_event(&self) -> Option<&MediaEvent> {
        match self {
            Self::Event(e) => Some(e),
            Self::Value(_) => None,
        }
    }
}

impl From<MediaEvent> for EventArg {
    fn from(event: MediaEvent) -> Self {
        Self::Event(event)
    }
}

impl From<serde_json::Value> for EventArg {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}
