// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reading a finished region back into per-core streams.

use meshtrace_core::coord::{CORE_COUNT, CoreCoordinate, SlotIndex, Topology};
use meshtrace_core::error::DecodeError;
use meshtrace_core::event::{RecordedEvent, StreamSink};
use meshtrace_core::packet::{PacketContext, PacketView};
use meshtrace_core::region::SharedRegion;
use meshtrace_core::time::{Timebase, Timestamp};

/// A published slot failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    /// The slot does not hold a well-formed packet.
    #[error("slot {slot}: {source}")]
    Decode {
        /// The offending slot.
        slot: SlotIndex,
        /// What the reader rejected.
        source: DecodeError,
    },
    /// The packet's `(row, col)` context is not the coordinate that maps to
    /// its slot.
    #[error("slot {slot} belongs to {expected:?} but holds a packet from ({row}, {col})")]
    ContextMismatch {
        /// The offending slot.
        slot: SlotIndex,
        /// Coordinate that maps to the slot.
        expected: CoreCoordinate,
        /// Row recorded in the packet.
        row: u8,
        /// Column recorded in the packet.
        col: u8,
    },
}

/// One core's decoded packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreStream {
    /// Slot the packet was read from.
    pub slot: SlotIndex,
    /// Coordinate of the core that owns the slot.
    pub coord: CoreCoordinate,
    /// Packet header and context.
    pub context: PacketContext,
    /// Events in recording order.
    pub events: Vec<RecordedEvent>,
}

impl CoreStream {
    /// Returns the cycles between packet open and close.
    #[must_use]
    pub fn duration_cycles(&self) -> u32 {
        self.context
            .timestamp_end
            .saturating_cycles_since(self.context.timestamp_begin)
    }
}

/// All decoded streams of a run.
#[derive(Clone, Debug)]
pub struct Trace {
    /// Streams of published slots, in slot order.
    pub streams: Vec<CoreStream>,
    /// Slots that held no packet.
    pub missing: Vec<SlotIndex>,
    /// Cycles-to-nanoseconds ratio of the core timers.
    pub timebase: Timebase,
}

impl Trace {
    /// Returns whether every slot produced a stream.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.streams.len() == CORE_COUNT
    }

    /// Returns the total number of events across all streams.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.streams.iter().map(|s| s.events.len()).sum()
    }

    /// Returns the earliest packet-open timestamp.
    #[must_use]
    pub fn earliest(&self) -> Option<Timestamp> {
        self.streams.iter().map(|s| s.context.timestamp_begin).min()
    }

    /// Returns the latest packet-close timestamp.
    #[must_use]
    pub fn latest(&self) -> Option<Timestamp> {
        self.streams.iter().map(|s| s.context.timestamp_end).max()
    }

    /// Feeds every stream to `sink`, in slot order.
    pub fn replay(&self, sink: &mut dyn StreamSink) {
        for stream in &self.streams {
            sink.on_packet_begin(stream.slot, &stream.context);
            for event in &stream.events {
                sink.on_event(stream.slot, event);
            }
            sink.on_packet_end(stream.slot, &stream.context);
        }
    }
}

/// Decodes and validates every slot of `region`.
///
/// Empty slots are reported in [`Trace::missing`]. A slot that holds a
/// malformed packet, or a packet whose context disagrees with the slot's
/// coordinate, fails the whole collection.
pub fn collect(
    region: &SharedRegion,
    topology: &Topology,
    timebase: Timebase,
) -> Result<Trace, CollectError> {
    let mut streams = Vec::with_capacity(CORE_COUNT);
    let mut missing = Vec::new();

    for i in 0..CORE_COUNT {
        let slot = SlotIndex(i);
        let Some(packet) = region.slot(slot) else {
            log::warn!("slot {slot} is empty");
            missing.push(slot);
            continue;
        };
        streams.push(decode_slot(slot, packet, topology)?);
    }

    let trace = Trace {
        streams,
        missing,
        timebase,
    };
    log::info!(
        "collected {} streams with {} events ({} slots missing)",
        trace.streams.len(),
        trace.event_count(),
        trace.missing.len()
    );
    Ok(trace)
}

fn decode_slot(
    slot: SlotIndex,
    packet: &[u8],
    topology: &Topology,
) -> Result<CoreStream, CollectError> {
    let decode = |source| CollectError::Decode { slot, source };
    let view = PacketView::parse(packet).map_err(decode)?;
    let context = *view.context();

    // `slot` is below CORE_COUNT, so the inverse mapping always exists.
    let expected = topology.coordinate_of(slot).unwrap_or_default();
    if u16::from(context.row) != expected.row || u16::from(context.col) != expected.col {
        return Err(CollectError::ContextMismatch {
            slot,
            expected,
            row: context.row,
            col: context.col,
        });
    }

    let events = view
        .events()
        .collect::<Result<Vec<_>, _>>()
        .map_err(decode)?;
    if events.len() != usize::from(context.events) {
        log::warn!(
            "slot {slot}: header counts {} events, found {}",
            context.events,
            events.len()
        );
    }
    Ok(CoreStream {
        slot,
        coord: expected,
        context,
        events,
    })
}
