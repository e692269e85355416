// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`StreamSink`] and writes one line per
//! packet boundary and per event to a [`Write`](std::io::Write) destination
//! (default: stderr). Timestamps are converted to microseconds using a
//! [`Timebase`].

use std::io::Write;

use meshtrace_core::coord::SlotIndex;
use meshtrace_core::event::{RecordedEvent, StreamSink, TraceEvent};
use meshtrace_core::packet::PacketContext;
use meshtrace_core::time::{Timebase, Timestamp};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Returns the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn us(&self, t: Timestamp) -> f64 {
        self.timebase.cycles_to_micros(u64::from(t.cycles()))
    }
}

impl<W: Write> StreamSink for PrettyPrintSink<W> {
    fn on_packet_begin(&mut self, slot: SlotIndex, c: &PacketContext) {
        let _ = writeln!(
            self.writer,
            "[packet:begin] slot={slot} core=({}, {}) at {:.3}µs",
            c.row,
            c.col,
            self.us(c.timestamp_begin),
        );
    }

    fn on_event(&mut self, slot: SlotIndex, e: &RecordedEvent) {
        let at = self.us(e.timestamp);
        let _ = match e.event {
            TraceEvent::Start => writeln!(self.writer, "[start] slot={slot} at {at:.3}µs"),
            TraceEvent::Progress { value } => writeln!(
                self.writer,
                "[progress] slot={slot} value={value} at {at:.3}µs"
            ),
        };
    }

    fn on_packet_end(&mut self, slot: SlotIndex, c: &PacketContext) {
        let _ = writeln!(
            self.writer,
            "[packet:end] slot={slot} events={} content={}B at {:.3}µs",
            c.events,
            c.content_len(),
            self.us(c.timestamp_end),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_print_progress() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_event(
            SlotIndex(4),
            &RecordedEvent {
                timestamp: Timestamp(2_000),
                event: TraceEvent::Progress { value: 496 },
            },
        );
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("[progress]"), "got: {output}");
        assert!(output.contains("slot=4"), "got: {output}");
        assert!(output.contains("value=496"), "got: {output}");
        assert!(output.contains("2.000µs"), "got: {output}");
    }

    #[test]
    fn packet_lines() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::MHZ_600);
        let ctx = PacketContext {
            timestamp_begin: Timestamp(0),
            timestamp_end: Timestamp(600),
            content_bits: 24 * 8,
            packet_bits: 512 * 8,
            row: 35,
            col: 11,
            events: 0,
        };
        sink.on_packet_begin(SlotIndex(15), &ctx);
        sink.on_packet_end(SlotIndex(15), &ctx);
        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("core=(35, 11)"), "got: {output}");
        assert!(lines[1].contains("content=24B at 1.000µs"), "got: {output}");
    }
}
