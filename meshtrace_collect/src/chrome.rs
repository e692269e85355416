// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] writes a collected [`Trace`] as [Chrome Trace Event Format][spec]
//! JSON. Each core gets its own `tid`, named after its coordinate. A packet
//! becomes a `B`/`E` span and each event an instant inside it.
//!
//! Every core starts its clock on release from the same barrier, so
//! timestamps from different cores share one time axis.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use meshtrace_core::coord::SlotIndex;
use meshtrace_core::event::{RecordedEvent, StreamSink, TraceEvent};
use meshtrace_core::packet::PacketContext;
use meshtrace_core::time::{Timebase, Timestamp};

use crate::collect::Trace;

const PID: u32 = 0;

/// A [`StreamSink`] that builds Chrome trace event objects.
#[derive(Debug)]
pub struct ChromeTraceExporter {
    timebase: Timebase,
    events: Vec<Value>,
}

impl ChromeTraceExporter {
    /// Creates an exporter converting cycles with `timebase`.
    #[must_use]
    pub fn new(timebase: Timebase) -> Self {
        Self {
            timebase,
            events: Vec::new(),
        }
    }

    /// Returns the events built so far.
    #[must_use]
    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Writes the events as a pretty-printed JSON array.
    pub fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(writer, &self.events)?;
        Ok(())
    }

    fn us(&self, t: Timestamp) -> f64 {
        self.timebase.cycles_to_micros(u64::from(t.cycles()))
    }
}

impl StreamSink for ChromeTraceExporter {
    fn on_packet_begin(&mut self, slot: SlotIndex, c: &PacketContext) {
        self.events.push(json!({
            "ph": "M",
            "name": "thread_name",
            "pid": PID,
            "tid": slot.get(),
            "args": { "name": format!("core ({}, {})", c.row, c.col) },
        }));
        self.events.push(json!({
            "ph": "B",
            "name": "packet",
            "cat": "Packet",
            "ts": self.us(c.timestamp_begin),
            "pid": PID,
            "tid": slot.get(),
            "args": { "row": c.row, "col": c.col },
        }));
    }

    fn on_event(&mut self, slot: SlotIndex, e: &RecordedEvent) {
        let args = match e.event {
            TraceEvent::Start => json!({}),
            TraceEvent::Progress { value } => json!({ "value": value }),
        };
        self.events.push(json!({
            "ph": "i",
            "name": e.event.name(),
            "cat": "Event",
            "ts": self.us(e.timestamp),
            "pid": PID,
            "tid": slot.get(),
            "s": "t",
            "args": args,
        }));
    }

    fn on_packet_end(&mut self, slot: SlotIndex, c: &PacketContext) {
        self.events.push(json!({
            "ph": "E",
            "name": "packet",
            "cat": "Packet",
            "ts": self.us(c.timestamp_end),
            "pid": PID,
            "tid": slot.get(),
            "args": {
                "events": c.events,
                "content_bytes": c.content_len(),
            },
        }));
    }
}

/// Exports `trace` as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(trace: &Trace, writer: &mut dyn Write) -> io::Result<()> {
    let mut exporter = ChromeTraceExporter::new(trace.timebase);
    trace.replay(&mut exporter);
    exporter.write(writer)
}
