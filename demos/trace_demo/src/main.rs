// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated 16-core run that exercises the whole tracing pipeline.
//!
//! Every simulated core meets the others at the wired-AND barrier, records a
//! running sum into its packet, and publishes it. The demo then collects the
//! region, prints it, and writes
//!
//! - `<out>/trace.json`, a Chrome trace with one track per core, and
//! - `<out>/ctf/`, TSDL metadata plus one raw stream per core.
//!
//! `<out>` is the first argument, or `trace_out` if none is given.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;

use anyhow::{Context, bail};

use meshtrace_core::region::SharedRegion;
use meshtrace_sim::{ChipConfig, TimerModel, run_chip};

use meshtrace_collect::metadata::write_ctf_dir;
use meshtrace_collect::pretty::PrettyPrintSink;

static OUTBUF: SharedRegion = SharedRegion::new();

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let out_dir = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("trace_out"), PathBuf::from);

    let config = ChipConfig::e16();
    let TimerModel::Wallclock { timebase } = config.timer else {
        bail!("the demo expects a wall-clock timer");
    };

    let run = run_chip(&config, &OUTBUF).context("simulated chip failed to run")?;
    for (core, err) in run.failures() {
        log::error!("{core:?} failed: {err}");
    }
    if !OUTBUF.is_complete() {
        bail!(
            "only {} of {} cores published",
            OUTBUF.published_count(),
            run.reports.len()
        );
    }

    let trace = meshtrace_collect::collect(&OUTBUF, &config.topology, timebase)
        .context("published region failed validation")?;

    let mut pretty = PrettyPrintSink::with_writer(std::io::stdout().lock(), timebase);
    trace.replay(&mut pretty);

    if let (Some(first), Some(last)) = (trace.earliest(), trace.latest()) {
        let span = last.saturating_cycles_since(first);
        log::info!(
            "{} events over {span} cycles ({:.1}µs)",
            trace.event_count(),
            timebase.cycles_to_micros(u64::from(span))
        );
    }

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let json_path = out_dir.join("trace.json");
    let file =
        File::create(&json_path).with_context(|| format!("creating {}", json_path.display()))?;
    let mut writer = BufWriter::new(file);
    meshtrace_collect::chrome::export(&trace, &mut writer)?;
    writer.flush()?;
    log::info!("wrote {}", json_path.display());

    write_ctf_dir(&OUTBUF, &out_dir.join("ctf"), timebase)?;
    Ok(())
}
