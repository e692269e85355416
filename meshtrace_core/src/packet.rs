// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size binary trace packets.
//!
//! [`PacketEncoder`] writes one packet into a caller-owned buffer under a
//! strict open / record / close discipline. [`PacketView`] reads a finished
//! packet back.
//!
//! # Layout
//!
//! All fields are little-endian and byte-aligned.
//!
//! ```text
//! offset  size  field
//!      0     4  magic            0xC1FC1FC1
//!      4     4  timestamp_begin  clock at open
//!      8     4  timestamp_end    clock at close
//!     12     4  content_size     bits written, header included
//!     16     4  packet_size      bits in the buffer
//!     20     1  row              context field
//!     21     1  col              context field
//!     22     2  events           number of event records
//!     24     …  event records    id: u8, timestamp: u32, payload
//! ```
//!
//! Bytes past `content_size` are zero.
//!
//! # State machine
//!
//! ```text
//! new ──► Ready ──open──► Opened ──record_event*──► Opened ──close──► Closed
//! ```
//!
//! Calling an operation in any other state fails with
//! [`PacketError::ContractViolation`] and leaves the buffer unchanged.
//! A record that does not fit fails with [`PacketError::Capacity`] before
//! anything is written; there is no rotation to a second packet.

use crate::clock::TimestampSource;
use crate::error::{DecodeError, PacketError};
use crate::event::{RecordedEvent, TraceEvent};
use crate::time::Timestamp;

/// Size of one packet and of one shared-region slot, in bytes.
pub const PACKET_SIZE: usize = 512;

/// First four bytes of every packet.
pub const PACKET_MAGIC: u32 = 0xC1FC_1FC1;

/// Size of the packet header and context, in bytes.
pub const HEADER_SIZE: usize = 24;

/// Size of an event record without its payload, in bytes.
pub const EVENT_HEADER_SIZE: usize = 5;

const OFF_MAGIC: usize = 0;
const OFF_TS_BEGIN: usize = 4;
const OFF_TS_END: usize = 8;
const OFF_CONTENT: usize = 12;
const OFF_PACKET: usize = 16;
const OFF_ROW: usize = 20;
const OFF_COL: usize = 21;
const OFF_EVENTS: usize = 22;

/// Where the encoder is in the packet lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncoderState {
    /// Bound to a buffer; no packet open yet.
    Ready,
    /// Header written; events may be recorded.
    Opened,
    /// Finalized; the buffer may be published.
    Closed,
}

/// An encoder operation, reported by [`PacketError::ContractViolation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`PacketEncoder::open`].
    Open,
    /// [`PacketEncoder::record_event`].
    RecordEvent,
    /// [`PacketEncoder::close`].
    Close,
}

/// Decoded packet header and context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketContext {
    /// Clock value when the packet was opened.
    pub timestamp_begin: Timestamp,
    /// Clock value when the packet was closed.
    pub timestamp_end: Timestamp,
    /// Bits of header and events.
    pub content_bits: u32,
    /// Bits in the whole packet buffer.
    pub packet_bits: u32,
    /// Row context field.
    pub row: u8,
    /// Column context field.
    pub col: u8,
    /// Number of event records.
    pub events: u16,
}

impl PacketContext {
    /// Returns the number of bytes holding header and events.
    #[must_use]
    pub const fn content_len(&self) -> usize {
        (self.content_bits / 8) as usize
    }
}

/// Writes one trace packet into a fixed buffer.
///
/// Creating the encoder binds the buffer and the timestamp source; the
/// whole buffer length is the packet size.
#[derive(Debug)]
pub struct PacketEncoder<'b, C> {
    buf: &'b mut [u8],
    clock: C,
    state: EncoderState,
    cursor: usize,
    events: u16,
    begin: Timestamp,
}

impl<'b, C: TimestampSource> PacketEncoder<'b, C> {
    /// Binds the encoder to `buf` and `clock`.
    pub fn new(buf: &'b mut [u8], clock: C) -> Self {
        Self {
            buf,
            clock,
            state: EncoderState::Ready,
            cursor: 0,
            events: 0,
            begin: Timestamp(0),
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EncoderState {
        self.state
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cursor
    }

    /// Returns whether nothing has been written yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Returns the number of events recorded so far.
    #[must_use]
    pub const fn event_count(&self) -> u16 {
        self.events
    }

    /// Returns the bytes still free in the buffer.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn expect_state(&self, expected: EncoderState, operation: Operation) -> Result<(), PacketError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PacketError::ContractViolation {
                operation,
                state: self.state,
            })
        }
    }

    /// Writes the packet header and the `(row, col)` context.
    pub fn open(&mut self, row: u8, col: u8) -> Result<(), PacketError> {
        self.expect_state(EncoderState::Ready, Operation::Open)?;
        if self.buf.len() < HEADER_SIZE {
            return Err(PacketError::Capacity {
                needed: HEADER_SIZE,
                available: self.buf.len(),
            });
        }

        let begin = self.clock.now();
        let packet_bits = u32::try_from(self.buf.len().saturating_mul(8)).unwrap_or(u32::MAX);

        self.buf.fill(0);
        put_u32(self.buf, OFF_MAGIC, PACKET_MAGIC);
        put_u32(self.buf, OFF_TS_BEGIN, begin.cycles());
        put_u32(self.buf, OFF_PACKET, packet_bits);
        self.buf[OFF_ROW] = row;
        self.buf[OFF_COL] = col;

        self.cursor = HEADER_SIZE;
        self.events = 0;
        self.begin = begin;
        self.state = EncoderState::Opened;
        log::debug!("packet opened for ({row}, {col}) at {begin:?}");
        Ok(())
    }

    /// Appends `event`, stamped with the current clock value.
    ///
    /// Returns the timestamp written.
    pub fn record_event(&mut self, event: &TraceEvent) -> Result<Timestamp, PacketError> {
        self.expect_state(EncoderState::Opened, Operation::RecordEvent)?;

        let needed = EVENT_HEADER_SIZE + event.payload_len();
        let available = self.remaining();
        if needed > available {
            return Err(PacketError::Capacity { needed, available });
        }

        let timestamp = self.clock.now();
        let start = self.cursor;
        self.buf[start] = event.id();
        put_u32(self.buf, start + 1, timestamp.cycles());
        event.write_payload(&mut self.buf[start + EVENT_HEADER_SIZE..start + needed]);

        self.cursor += needed;
        self.events = self.events.saturating_add(1);
        Ok(timestamp)
    }

    /// Finalizes the packet: end timestamp, content size and event count.
    pub fn close(&mut self) -> Result<PacketContext, PacketError> {
        self.expect_state(EncoderState::Opened, Operation::Close)?;

        let end = self.clock.now();
        let content_bits = u32::try_from(self.cursor.saturating_mul(8)).unwrap_or(u32::MAX);
        put_u32(self.buf, OFF_TS_END, end.cycles());
        put_u32(self.buf, OFF_CONTENT, content_bits);
        self.buf[OFF_EVENTS..OFF_EVENTS + 2].copy_from_slice(&self.events.to_le_bytes());

        self.state = EncoderState::Closed;
        log::debug!(
            "packet closed at {end:?}: {} events, {} bytes",
            self.events,
            self.cursor
        );
        Ok(PacketContext {
            timestamp_begin: self.begin,
            timestamp_end: end,
            content_bits,
            packet_bits: u32::try_from(self.buf.len().saturating_mul(8)).unwrap_or(u32::MAX),
            row: self.buf[OFF_ROW],
            col: self.buf[OFF_COL],
            events: self.events,
        })
    }
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(data: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated { offset })?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_context(data: &[u8]) -> Result<PacketContext, DecodeError> {
    if data.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated { offset: data.len() });
    }
    let magic = get_u32(data, OFF_MAGIC)?;
    if magic != PACKET_MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    Ok(PacketContext {
        timestamp_begin: Timestamp(get_u32(data, OFF_TS_BEGIN)?),
        timestamp_end: Timestamp(get_u32(data, OFF_TS_END)?),
        content_bits: get_u32(data, OFF_CONTENT)?,
        packet_bits: get_u32(data, OFF_PACKET)?,
        row: data[OFF_ROW],
        col: data[OFF_COL],
        events: u16::from_le_bytes([data[OFF_EVENTS], data[OFF_EVENTS + 1]]),
    })
}

/// A validated, closed packet.
#[derive(Clone, Copy, Debug)]
pub struct PacketView<'a> {
    data: &'a [u8],
    context: PacketContext,
}

impl<'a> PacketView<'a> {
    /// Parses the packet at the start of `data`.
    ///
    /// Rejects data that does not start with [`PACKET_MAGIC`], packets that
    /// were never closed, and sizes that do not fit `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self, DecodeError> {
        let context = read_context(data)?;
        let bad_size = DecodeError::BadSize {
            content_bits: context.content_bits,
            packet_bits: context.packet_bits,
            len: data.len(),
        };
        if context.content_bits % 8 != 0 || context.packet_bits % 8 != 0 {
            return Err(bad_size);
        }
        let content = context.content_len();
        let packet = (context.packet_bits / 8) as usize;
        if content < HEADER_SIZE || content > packet || packet > data.len() {
            return Err(bad_size);
        }
        Ok(Self {
            data: &data[..content],
            context,
        })
    }

    /// Returns the decoded header and context.
    #[must_use]
    pub const fn context(&self) -> &PacketContext {
        &self.context
    }

    /// Returns the header and event bytes.
    #[must_use]
    pub const fn content(&self) -> &'a [u8] {
        self.data
    }

    /// Iterates over the event records.
    #[must_use]
    pub fn events(&self) -> EventIter<'a> {
        EventIter {
            data: self.data,
            pos: HEADER_SIZE,
        }
    }
}

/// Iterator over the event records of a [`PacketView`].
///
/// Yields an error and then stops if a record is malformed.
#[derive(Clone, Debug)]
pub struct EventIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Iterator for EventIter<'_> {
    type Item = Result<RecordedEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let offset = self.pos;
        let result = self.decode_at(offset);
        if result.is_err() {
            self.pos = self.data.len();
        }
        Some(result)
    }
}

impl EventIter<'_> {
    fn decode_at(&mut self, offset: usize) -> Result<RecordedEvent, DecodeError> {
        let id = self.data[offset];
        let payload_len =
            TraceEvent::payload_len_of(id).ok_or(DecodeError::UnknownEvent { id, offset })?;
        let timestamp = Timestamp(get_u32(self.data, offset + 1)?);
        let start = offset + EVENT_HEADER_SIZE;
        let payload = self
            .data
            .get(start..start + payload_len)
            .ok_or(DecodeError::Truncated { offset: start })?;
        let event =
            TraceEvent::read_payload(id, payload).ok_or(DecodeError::UnknownEvent { id, offset })?;
        self.pos = start + payload_len;
        Ok(RecordedEvent { timestamp, event })
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::clock::tests::StepTimer;
    use crate::clock::{ClockSource, FnClock};

    fn running_clock(step: u32) -> ClockSource<StepTimer> {
        let mut clock = ClockSource::new(StepTimer::new(step));
        clock.init();
        clock.start();
        clock
    }

    #[test]
    fn record_before_open_is_rejected() {
        let mut buf = [0_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 0));
        assert_eq!(
            enc.record_event(&TraceEvent::Start),
            Err(PacketError::ContractViolation {
                operation: Operation::RecordEvent,
                state: EncoderState::Ready,
            })
        );
        assert_eq!(
            enc.close(),
            Err(PacketError::ContractViolation {
                operation: Operation::Close,
                state: EncoderState::Ready,
            })
        );
        assert!(buf.iter().all(|b| *b == 0), "buffer untouched");
    }

    #[test]
    fn record_after_close_is_rejected() {
        let mut buf = [0_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 5));
        enc.open(32, 8).unwrap();
        enc.close().unwrap();
        assert_eq!(
            enc.record_event(&TraceEvent::Progress { value: 1 }),
            Err(PacketError::ContractViolation {
                operation: Operation::RecordEvent,
                state: EncoderState::Closed,
            })
        );
        assert!(enc.open(32, 8).is_err(), "a closed encoder cannot reopen");
        assert!(enc.close().is_err(), "close is single-shot");
    }

    #[test]
    fn header_only_packet_is_well_formed() {
        let mut buf = [0xAA_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 77));
        enc.open(33, 9).unwrap();
        let ctx = enc.close().unwrap();
        assert_eq!(ctx.events, 0);
        assert_eq!(ctx.content_len(), HEADER_SIZE);

        let view = PacketView::parse(&buf).unwrap();
        assert_eq!(view.context().row, 33);
        assert_eq!(view.context().col, 9);
        assert_eq!(view.context().timestamp_begin, Timestamp(77));
        assert_eq!(view.context().timestamp_end, Timestamp(77));
        assert_eq!(view.context().packet_bits, 4096);
        assert_eq!(view.events().count(), 0);
        assert!(buf[HEADER_SIZE..].iter().all(|b| *b == 0), "padding is zero");
    }

    #[test]
    fn running_sum_scenario() {
        let clock = running_clock(3);
        let mut buf = [0_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, &clock);
        enc.open(32, 8).unwrap();
        enc.record_event(&TraceEvent::Start).unwrap();
        let mut sum = 0_u32;
        for i in 0..32 {
            sum += i;
            enc.record_event(&TraceEvent::Progress { value: sum }).unwrap();
        }
        let ctx = enc.close().unwrap();
        assert_eq!(ctx.events, 33);
        assert_eq!(
            ctx.content_len(),
            HEADER_SIZE + EVENT_HEADER_SIZE + 32 * (EVENT_HEADER_SIZE + 4)
        );

        let view = PacketView::parse(&buf).unwrap();
        assert_eq!((view.context().row, view.context().col), (32, 8));
        let events: Vec<_> = view.events().map(Result::unwrap).collect();
        assert_eq!(events.len(), 33);
        assert_eq!(events[0].event, TraceEvent::Start);

        let sums: Vec<u32> = events[1..]
            .iter()
            .map(|e| match e.event {
                TraceEvent::Progress { value } => value,
                TraceEvent::Start => panic!("unexpected start marker"),
            })
            .collect();
        assert_eq!(&sums[..4], &[0, 1, 3, 6]);
        assert_eq!(sums[31], 496);

        let mut prev = view.context().timestamp_begin;
        for e in &events {
            assert!(e.timestamp >= prev, "timestamps must not decrease");
            prev = e.timestamp;
        }
        assert!(view.context().timestamp_end >= prev);
    }

    #[test]
    fn capacity_overflow_fails_without_writing() {
        let mut buf = [0_u8; HEADER_SIZE + 2 * (EVENT_HEADER_SIZE + 4) + 3];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 1));
        enc.open(32, 8).unwrap();
        enc.record_event(&TraceEvent::Progress { value: 1 }).unwrap();
        enc.record_event(&TraceEvent::Progress { value: 2 }).unwrap();
        let before = enc.len();
        assert_eq!(
            enc.record_event(&TraceEvent::Progress { value: 3 }),
            Err(PacketError::Capacity {
                needed: EVENT_HEADER_SIZE + 4,
                available: 3,
            })
        );
        assert_eq!(enc.len(), before, "failed record leaves cursor in place");
        assert_eq!(enc.event_count(), 2);
        let ctx = enc.close().unwrap();
        assert_eq!(ctx.events, 2);
    }

    #[test]
    fn full_packet_hits_capacity_deterministically() {
        let mut buf = [0_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 1));
        enc.open(32, 8).unwrap();
        let mut recorded = 0;
        let err = loop {
            match enc.record_event(&TraceEvent::Progress { value: recorded }) {
                Ok(_) => recorded += 1,
                Err(e) => break e,
            }
        };
        assert_eq!(recorded as usize, (PACKET_SIZE - HEADER_SIZE) / (EVENT_HEADER_SIZE + 4));
        assert!(matches!(err, PacketError::Capacity { .. }));
    }

    #[test]
    fn buffer_smaller_than_header_cannot_open() {
        let mut buf = [0_u8; HEADER_SIZE - 1];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 1));
        assert_eq!(
            enc.open(0, 0),
            Err(PacketError::Capacity {
                needed: HEADER_SIZE,
                available: HEADER_SIZE - 1,
            })
        );
        assert_eq!(enc.state(), EncoderState::Ready);
    }

    #[test]
    fn parse_rejects_empty_and_unclosed_slots() {
        let empty = [0_u8; PACKET_SIZE];
        assert_eq!(PacketView::parse(&empty).unwrap_err(), DecodeError::BadMagic(0));

        let mut buf = [0_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 1));
        enc.open(32, 8).unwrap();
        assert!(matches!(
            PacketView::parse(&buf),
            Err(DecodeError::BadSize { content_bits: 0, .. })
        ));

        assert_eq!(
            PacketView::parse(&buf[..10]).unwrap_err(),
            DecodeError::Truncated { offset: 10 }
        );
    }

    #[test]
    fn unknown_event_stops_iteration() {
        let mut buf = [0_u8; PACKET_SIZE];
        let mut enc = PacketEncoder::new(&mut buf, FnClock(|| 1));
        enc.open(32, 8).unwrap();
        enc.record_event(&TraceEvent::Start).unwrap();
        enc.record_event(&TraceEvent::Start).unwrap();
        enc.close().unwrap();
        // Corrupt the second record's id.
        buf[HEADER_SIZE + EVENT_HEADER_SIZE] = 0xEE;

        let view = PacketView::parse(&buf).unwrap();
        let items: Vec<_> = view.events().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(
            items[1],
            Err(DecodeError::UnknownEvent {
                id: 0xEE,
                offset: HEADER_SIZE + EVENT_HEADER_SIZE,
            })
        );
    }
}
