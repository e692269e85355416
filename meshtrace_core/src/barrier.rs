// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Start-of-run rendezvous over the wired-AND line.
//!
//! Every core raises the wired-AND line and idles. The line only fires once
//! all cores have raised it, so the interrupt wakes every core at (almost)
//! the same moment. Clocks are started right after [`BarrierSync::rendezvous`]
//! returns, which aligns timestamps across cores.
//!
//! The interrupt must be deliverable before the core idles, so the order is:
//!
//! 1. unmask interrupts globally
//! 2. attach a no-op handler to [`WAND_LINE`]
//! 3. unmask [`WAND_LINE`]
//! 4. raise the wired-AND line
//! 5. idle until the interrupt arrives
//! 6. clear the line's latched status bit

use crate::hal::{InterruptController, IrqLine, Platform, WAND_LINE};

fn on_wand(_line: IrqLine) {}

/// A one-shot barrier across all participating cores.
///
/// [`rendezvous`](Self::rendezvous) consumes the barrier, so a core can only
/// use it once per run.
#[derive(Debug)]
#[must_use = "a barrier does nothing until `rendezvous` is called"]
pub struct BarrierSync {
    line: IrqLine,
}

impl BarrierSync {
    /// Creates a barrier on [`WAND_LINE`].
    pub const fn new() -> Self {
        Self { line: WAND_LINE }
    }

    /// Blocks until every participating core has called `rendezvous`.
    ///
    /// On return the line's status bit is clear.
    pub fn rendezvous<P: Platform + ?Sized>(self, hw: &mut P) {
        let line = self.line;
        hw.set_global_mask(false);
        hw.attach(line, on_wand);
        hw.set_line_mask(line, false);
        log::debug!("{:?}: waiting at barrier on {line:?}", hw.core_id());

        hw.signal();
        hw.idle();

        clear_status(hw, line);
        log::debug!("{:?}: released from barrier", hw.core_id());
    }
}

impl Default for BarrierSync {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_status<I: InterruptController + ?Sized>(hw: &mut I, line: IrqLine) {
    let status = hw.read_status();
    hw.write_status(status & !line.bit());
}
