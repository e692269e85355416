// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Every error here is terminal for the core that hits it: there is no retry
//! and no partial result. [`node::run_and_halt`](crate::node::run_and_halt)
//! logs the error and parks the core.

use crate::coord::SlotIndex;
use crate::packet::{EncoderState, Operation};

/// A core's coordinate or the configured geometry does not fit the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The coordinate lies outside the participant rectangle.
    #[error("core ({row}, {col}) lies outside the participant rectangle")]
    OutsideRectangle {
        /// Resolved row.
        row: u16,
        /// Resolved column.
        col: u16,
    },
    /// The rectangle does not hold exactly 16 cores or does not fit the fields.
    #[error("a {rows}x{cols} participant rectangle does not fit the mesh")]
    Geometry {
        /// Configured rows.
        rows: u16,
        /// Configured columns.
        cols: u16,
    },
    /// The identifier bit fields are empty, too wide, or overflow 16 bits.
    #[error("invalid identifier fields: row at {row_shift}, col at {col_shift}, {field_bits} bits")]
    FieldLayout {
        /// Row field offset.
        row_shift: u8,
        /// Column field offset.
        col_shift: u8,
        /// Field width.
        field_bits: u8,
    },
}

/// The packet encoder refused an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// Writing would run past the end of the packet buffer.
    #[error("packet full: {needed} bytes needed, {available} available")]
    Capacity {
        /// Bytes the operation would write.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// An operation was called in a state that does not allow it.
    #[error("{operation:?} is not allowed while the packet is {state:?}")]
    ContractViolation {
        /// The rejected operation.
        operation: Operation,
        /// The encoder state at the time of the call.
        state: EncoderState,
    },
}

/// Copying a packet into the shared region failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The slot index is past the end of the region.
    #[error("slot {0} is outside the shared region")]
    SlotOutOfRange(SlotIndex),
    /// The slot was already written during this run.
    #[error("slot {0} was already published")]
    AlreadyPublished(SlotIndex),
    /// Another writer is publishing to the same slot right now.
    #[error("slot {0} is being published concurrently")]
    Busy(SlotIndex),
}

/// A published slot does not hold a well-formed packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The data ends before a field does.
    #[error("packet truncated at byte {offset}")]
    Truncated {
        /// Offset of the incomplete field.
        offset: usize,
    },
    /// The packet does not start with the magic number.
    #[error("bad packet magic {0:#010x}")]
    BadMagic(u32),
    /// The recorded sizes are inconsistent with each other or the slot.
    #[error("inconsistent sizes: content {content_bits} bits, packet {packet_bits} bits, slot {len} bytes")]
    BadSize {
        /// Recorded content size.
        content_bits: u32,
        /// Recorded packet size.
        packet_bits: u32,
        /// Length of the data handed to the reader.
        len: usize,
    },
    /// An event record carries an id the reader does not know.
    #[error("unknown event id {id} at byte {offset}")]
    UnknownEvent {
        /// The event id.
        id: u8,
        /// Offset of the event record.
        offset: usize,
    },
}

/// A terminal per-core failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The core's coordinate is outside the deployed rectangle.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// The packet encoder failed.
    #[error(transparent)]
    Packet(#[from] PacketError),
    /// Publishing the finished packet failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// A hardware capability is missing.
    #[error("hardware absent: {0}")]
    HardwareAbsent(&'static str),
}
