// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collection, pretty-printing, and export of published meshtrace packets.
//!
//! Once every core has finished, a host reads the shared region back:
//!
//! - [`collect()`] decodes each slot and checks that the packet's `(row, col)`
//!   context maps to the slot it was found in.
//! - [`pretty::PrettyPrintSink`] writes one line per event.
//! - [`chrome::export`] writes Chrome Trace Event Format JSON, one track per
//!   core.
//! - [`metadata::write_ctf_dir`] writes a TSDL `metadata` file plus raw
//!   `stream_<slot>` files.
//!
//! The sinks implement [`StreamSink`](meshtrace_core::event::StreamSink) and
//! are driven by [`Trace::replay`].

pub mod chrome;
mod collect;
pub mod metadata;
pub mod pretty;

pub use collect::{CollectError, CoreStream, Trace, collect};
pub use metadata::{write_streams, write_tsdl};
