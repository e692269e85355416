// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-core trace capture for a 16-core mesh processor.
//!
//! `meshtrace_core` is the code every participating core runs. It is
//! `no_std` and allocation-free: a packet is built in a stack buffer and
//! copied once into a shared region.
//!
//! # Architecture
//!
//! ```text
//!   Platform (hal)
//!       │ core id, timer, interrupts, wired-AND, idle
//!       ▼
//!   Topology::coordinates ──► (row, col)
//!       │
//!   ClockSource::init ──► BarrierSync::rendezvous ──► ClockSource::start
//!       │
//!   PacketEncoder::open ──► record_event* ──► close
//!       │
//!   Topology::slot_index ──► SharedRegion::publish
//! ```
//!
//! **[`hal`]**: the hardware capability traits a target implements.
//!
//! **[`coord`]**: identifier fields, the participant rectangle, and the
//! bijective coordinate-to-slot mapping.
//!
//! **[`clock`]**: an increasing clock over a countdown timer.
//!
//! **[`barrier`]**: the one-shot wired-AND rendezvous that aligns clocks.
//!
//! **[`packet`]**: the fixed-size packet encoder and reader.
//!
//! **[`event`]**: event types and the [`StreamSink`](event::StreamSink)
//! visitor used by collectors.
//!
//! **[`region`]**: write-once per-core output slots.
//!
//! **[`workload`]**: the traced job.
//!
//! **[`node`]**: the per-core program tying it together.
//!
//! **[`time`]**: timestamps and cycle-to-nanosecond conversion.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[cfg(test)]
extern crate alloc;

pub mod barrier;
pub mod clock;
pub mod coord;
pub mod error;
pub mod event;
pub mod hal;
pub mod node;
pub mod packet;
pub mod region;
pub mod time;
pub mod workload;

pub use error::Error;
