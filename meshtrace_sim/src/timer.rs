// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated countdown timer.

use std::cell::Cell;
use std::time::Instant;

use meshtrace_core::hal::CountdownTimer;
use meshtrace_core::time::Timebase;

use crate::chip::WiredAndLine;
use crate::config::TimerModel;

/// A per-core countdown timer following a [`TimerModel`].
///
/// The counter wraps at zero, like the hardware register.
#[derive(Debug)]
pub struct SimTimer<'c> {
    model: TimerModel,
    loaded: u32,
    started: Option<Instant>,
    reads: Cell<u32>,
    line: Option<&'c WiredAndLine>,
}

impl<'c> SimTimer<'c> {
    /// Creates a stopped timer holding zero.
    #[must_use]
    pub const fn new(model: TimerModel) -> Self {
        Self {
            model,
            loaded: 0,
            started: None,
            reads: Cell::new(0),
            line: None,
        }
    }

    /// Reports every start of this timer to `line`, together with the
    /// line's arrival count at that moment.
    #[must_use]
    pub const fn watching(mut self, line: &'c WiredAndLine) -> Self {
        self.line = Some(line);
        self
    }

    /// Returns whether the timer is counting.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.started.is_some()
    }

    fn elapsed_cycles(&self, started: Instant) -> u32 {
        match self.model {
            TimerModel::Wallclock { timebase } => wall_cycles(started, timebase),
            TimerModel::Stepped { step } => {
                let n = self.reads.get();
                self.reads.set(n.wrapping_add(1));
                n.wrapping_mul(step)
            }
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the hardware counter is 32 bits and wraps"
)]
fn wall_cycles(started: Instant, timebase: Timebase) -> u32 {
    if timebase.numer == 0 {
        return 0;
    }
    let nanos = started.elapsed().as_nanos();
    (nanos * u128::from(timebase.denom) / u128::from(timebase.numer)) as u32
}

impl CountdownTimer for SimTimer<'_> {
    const MAX: u32 = u32::MAX;

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.loaded = self.loaded.wrapping_sub(self.elapsed_cycles(started));
        }
        self.reads.set(0);
    }

    fn set(&mut self, value: u32) {
        self.loaded = value;
        if self.started.is_some() {
            self.started = Some(Instant::now());
            self.reads.set(0);
        }
    }

    fn start(&mut self) {
        if self.started.is_none() {
            if let Some(line) = self.line {
                line.note_clock_start();
            }
            self.started = Some(Instant::now());
            self.reads.set(0);
        }
    }

    fn get(&self) -> u32 {
        match self.started {
            Some(started) => self.loaded.wrapping_sub(self.elapsed_cycles(started)),
            None => self.loaded,
        }
    }
}
