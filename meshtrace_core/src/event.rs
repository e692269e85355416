// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trace events and the stream visitor.
//!
//! [`TraceEvent`] is the set of events a core can record into its packet.
//! Each has a one-byte id and a fixed-size payload:
//!
//! | id | event | payload |
//! |----|-------|---------|
//! | 0 | [`TraceEvent::Start`] | none |
//! | 1 | [`TraceEvent::Progress`] | `value: u32` |
//!
//! [`StreamSink`] receives decoded packets and events from a collector.
//! All methods default to no-ops, so implementing only the callbacks you
//! care about is fine.

use crate::coord::SlotIndex;
use crate::packet::PacketContext;
use crate::time::Timestamp;

/// Id of [`TraceEvent::Start`].
pub const EVENT_START: u8 = 0;
/// Id of [`TraceEvent::Progress`].
pub const EVENT_PROGRESS: u8 = 1;

/// An event recorded into a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// Marks the start of the timed region. Recorded right after the packet
    /// is opened.
    Start,
    /// A workload progress value (for the running-sum job, the sum so far).
    Progress {
        /// The recorded value.
        value: u32,
    },
}

impl TraceEvent {
    /// Returns the wire id.
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::Start => EVENT_START,
            Self::Progress { .. } => EVENT_PROGRESS,
        }
    }

    /// Returns the event name used in metadata and exports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress { .. } => "progress",
        }
    }

    /// Returns the payload size in bytes for the event with `id`, or `None`
    /// for unknown ids.
    #[must_use]
    pub const fn payload_len_of(id: u8) -> Option<usize> {
        match id {
            EVENT_START => Some(0),
            EVENT_PROGRESS => Some(4),
            _ => None,
        }
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub const fn payload_len(&self) -> usize {
        match self {
            Self::Start => 0,
            Self::Progress { .. } => 4,
        }
    }

    /// Writes the payload into `out`, which is exactly
    /// [`payload_len`](Self::payload_len) bytes long.
    pub(crate) fn write_payload(&self, out: &mut [u8]) {
        match self {
            Self::Start => {}
            Self::Progress { value } => out.copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// Decodes the payload of the event with `id`.
    ///
    /// `payload` must be exactly [`payload_len_of`](Self::payload_len_of)
    /// bytes long.
    pub(crate) fn read_payload(id: u8, payload: &[u8]) -> Option<Self> {
        match id {
            EVENT_START => Some(Self::Start),
            EVENT_PROGRESS => {
                let bytes: [u8; 4] = payload.try_into().ok()?;
                Some(Self::Progress {
                    value: u32::from_le_bytes(bytes),
                })
            }
            _ => None,
        }
    }
}

/// A decoded event with its timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordedEvent {
    /// Clock value when the event was recorded.
    pub timestamp: Timestamp,
    /// The event.
    pub event: TraceEvent,
}

/// Receives decoded packets from a collector.
pub trait StreamSink {
    /// Called before the events of the packet in `slot`.
    fn on_packet_begin(&mut self, slot: SlotIndex, context: &PacketContext) {
        _ = (slot, context);
    }

    /// Called for each event of the packet in `slot`, in recording order.
    fn on_event(&mut self, slot: SlotIndex, event: &RecordedEvent) {
        _ = (slot, event);
    }

    /// Called after the last event of the packet in `slot`.
    fn on_packet_end(&mut self, slot: SlotIndex, context: &PacketContext) {
        _ = (slot, context);
    }
}

/// A [`StreamSink`] that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl StreamSink for NoopSink {}
