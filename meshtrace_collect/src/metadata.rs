// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CTF-style trace directories.
//!
//! [`write_tsdl`] describes the packet layout in CTF 1.8 TSDL, and
//! [`write_streams`] dumps each published slot verbatim as `stream_<slot>`.
//! Together they form a directory that CTF readers can open.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use meshtrace_core::event::{EVENT_PROGRESS, EVENT_START};
use meshtrace_core::packet::PACKET_MAGIC;
use meshtrace_core::region::SharedRegion;
use meshtrace_core::time::Timebase;

/// Writes the TSDL metadata for packets timed with `timebase`.
pub fn write_tsdl(writer: &mut dyn Write, timebase: Timebase) -> io::Result<()> {
    write!(
        writer,
        r#"/* CTF 1.8 */

typealias integer {{ size = 8; align = 8; signed = false; }} := uint8_t;
typealias integer {{ size = 16; align = 8; signed = false; }} := uint16_t;
typealias integer {{ size = 32; align = 8; signed = false; }} := uint32_t;
typealias integer {{ size = 32; align = 8; signed = false; map = clock.core_timer.value; }} := core_clock_t;

trace {{
    major = 1;
    minor = 8;
    byte_order = le;
    packet.header := struct {{
        uint32_t magic;
    }};
}};

env {{
    domain = "bare";
    tracer_name = "meshtrace";
}};

clock {{
    name = core_timer;
    freq = {freq};
    offset = 0;
}};

stream {{
    packet.context := struct {{
        core_clock_t timestamp_begin;
        core_clock_t timestamp_end;
        uint32_t content_size;
        uint32_t packet_size;
        uint8_t row;
        uint8_t col;
        uint16_t events;
    }};
    event.header := struct {{
        uint8_t id;
        core_clock_t timestamp;
    }};
}};

event {{
    name = "start";
    id = {start};
}};

event {{
    name = "progress";
    id = {progress};
    fields := struct {{
        uint32_t value;
    }};
}};
"#,
        freq = timebase.frequency_hz(),
        start = EVENT_START,
        progress = EVENT_PROGRESS,
    )
}

/// Writes every published slot of `region` to `dir/stream_<slot>`.
///
/// Creates `dir` if needed. Returns the number of streams written.
pub fn write_streams(region: &SharedRegion, dir: &Path) -> io::Result<usize> {
    fs::create_dir_all(dir)?;
    let mut written = 0;
    for (slot, packet) in region.iter() {
        let path = dir.join(format!("stream_{slot}"));
        fs::write(&path, packet)?;
        log::debug!("wrote {}", path.display());
        written += 1;
    }
    Ok(written)
}

/// Writes `metadata` and all streams of `region` into `dir`.
pub fn write_ctf_dir(region: &SharedRegion, dir: &Path, timebase: Timebase) -> io::Result<usize> {
    fs::create_dir_all(dir)?;
    let mut metadata = fs::File::create(dir.join("metadata"))?;
    write_tsdl(&mut metadata, timebase)?;
    metadata.flush()?;
    let n = write_streams(region, dir)?;
    log::info!("wrote CTF trace with {n} streams to {}", dir.display());
    Ok(n)
}
