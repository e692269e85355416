// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated cores, the shared wired-AND line, and the chip runner.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use meshtrace_core::Error;
use meshtrace_core::hal::{
    CoreId, CoreIdentity, Idle, InterruptController, IrqHandler, IrqLine, Platform, WAND_LINE,
    WiredAnd,
};
use meshtrace_core::node::{self, Receipt};
use meshtrace_core::region::SharedRegion;

use crate::config::ChipConfig;
use crate::timer::SimTimer;
use crate::SimError;

/// Number of interrupt lines a simulated core has.
pub const IRQ_LINES: usize = 10;

#[derive(Debug)]
struct LineState {
    participants: usize,
    arrivals: usize,
    fired: bool,
    clock_starts: Vec<usize>,
}

/// The chip-wide wired-AND line.
///
/// Fires once every participant has signalled, and stays fired.
#[derive(Debug)]
pub struct WiredAndLine {
    state: Mutex<LineState>,
    fired: Condvar,
}

impl WiredAndLine {
    /// Creates a line shared by `participants` cores.
    #[must_use]
    pub const fn new(participants: usize) -> Self {
        Self {
            state: Mutex::new(LineState {
                participants,
                arrivals: 0,
                fired: participants == 0,
                clock_starts: Vec::new(),
            }),
            fired: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns how many cores have signalled.
    #[must_use]
    pub fn arrivals(&self) -> usize {
        self.lock().arrivals
    }

    /// Returns whether the line has fired.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.lock().fired
    }

    /// Returns the arrival count seen by each clock start, in start order.
    #[must_use]
    pub fn arrivals_at_clock_starts(&self) -> Vec<usize> {
        self.lock().clock_starts.clone()
    }

    pub(crate) fn note_clock_start(&self) {
        let mut state = self.lock();
        let arrivals = state.arrivals;
        state.clock_starts.push(arrivals);
    }

    pub(crate) fn signal(&self) {
        let mut state = self.lock();
        state.arrivals += 1;
        if state.arrivals >= state.participants && !state.fired {
            state.fired = true;
            log::debug!("wired-AND fired after {} arrivals", state.arrivals);
            self.fired.notify_all();
        }
    }

    /// Waits until the line fires. Returns the arrival count at release, or
    /// `None` on timeout.
    fn wait(&self, timeout: Duration) -> Option<usize> {
        let guard = self.lock();
        let (state, result) = self
            .fired
            .wait_timeout_while(guard, timeout, |s| !s.fired)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && !state.fired {
            None
        } else {
            Some(state.arrivals)
        }
    }
}

/// What a simulated core observed during its run.
#[derive(Debug)]
pub struct CoreReport {
    /// The core's identifier.
    pub core: CoreId,
    /// What the per-core program returned.
    pub outcome: Result<Receipt, Error>,
    /// Final value of the core's status register.
    pub status: u32,
    /// Number of interrupt handlers the core ran.
    pub irqs_taken: u32,
    /// Whether the core idled without ever receiving an interrupt.
    pub stalled: bool,
}

/// One simulated core. Implements [`Platform`].
#[derive(Debug)]
pub struct SimCore<'c> {
    id: CoreId,
    line: &'c WiredAndLine,
    timer: Option<SimTimer<'c>>,
    global_masked: bool,
    line_masks: u32,
    handlers: [Option<IrqHandler>; IRQ_LINES],
    status: u32,
    signalled: bool,
    consumed: bool,
    irqs_taken: u32,
    stalled: bool,
    idle_timeout: Duration,
}

impl<'c> SimCore<'c> {
    /// Creates a core attached to `line`, with interrupts masked.
    #[must_use]
    pub fn new(id: CoreId, line: &'c WiredAndLine, config: &ChipConfig) -> Self {
        Self {
            id,
            line,
            timer: Some(SimTimer::new(config.timer).watching(line)),
            global_masked: true,
            line_masks: u32::MAX,
            handlers: [None; IRQ_LINES],
            status: 0,
            signalled: false,
            consumed: false,
            irqs_taken: 0,
            stalled: false,
            idle_timeout: config.idle_timeout,
        }
    }

    fn deliverable(&self, line: IrqLine) -> bool {
        !self.global_masked && self.line_masks & line.bit() == 0
    }

    /// Finishes the core, pairing its observations with `outcome`.
    #[must_use]
    pub fn into_report(self, outcome: Result<Receipt, Error>) -> CoreReport {
        CoreReport {
            core: self.id,
            outcome,
            status: self.status,
            irqs_taken: self.irqs_taken,
            stalled: self.stalled,
        }
    }
}

impl CoreIdentity for SimCore<'_> {
    fn core_id(&self) -> CoreId {
        self.id
    }
}

impl InterruptController for SimCore<'_> {
    fn set_global_mask(&mut self, masked: bool) {
        self.global_masked = masked;
    }

    fn set_line_mask(&mut self, line: IrqLine, masked: bool) {
        if masked {
            self.line_masks |= line.bit();
        } else {
            self.line_masks &= !line.bit();
        }
    }

    fn attach(&mut self, line: IrqLine, handler: IrqHandler) {
        match self.handlers.get_mut(usize::from(line.0)) {
            Some(slot) => *slot = Some(handler),
            None => log::warn!("{:?}: no interrupt line {}", self.id, line.0),
        }
    }

    fn read_status(&self) -> u32 {
        self.status
    }

    fn write_status(&mut self, value: u32) {
        self.status = value;
    }
}

impl WiredAnd for SimCore<'_> {
    fn signal(&mut self) {
        if !self.signalled {
            self.signalled = true;
            self.line.signal();
        }
    }
}

impl Idle for SimCore<'_> {
    fn idle(&mut self) {
        if !self.signalled || self.consumed {
            // Nothing can wake this core.
            thread::park_timeout(self.idle_timeout);
            self.stalled = true;
            return;
        }
        if self.line.wait(self.idle_timeout).is_none() {
            log::error!("{:?}: wired-AND never fired", self.id);
            self.stalled = true;
            return;
        }
        self.status |= WAND_LINE.bit();
        if !self.deliverable(WAND_LINE) {
            log::error!("{:?}: wired-AND fired while masked", self.id);
            self.stalled = true;
            return;
        }
        self.consumed = true;
        if let Some(handler) = self.handlers[usize::from(WAND_LINE.0)] {
            handler(WAND_LINE);
            self.irqs_taken += 1;
        }
    }
}

impl<'c> Platform for SimCore<'c> {
    type Timer = SimTimer<'c>;

    fn take_timer(&mut self) -> Option<SimTimer<'c>> {
        self.timer.take()
    }
}

/// The outcome of a whole-chip run.
#[derive(Debug)]
pub struct ChipRun {
    /// One report per core, in slot order of the topology.
    pub reports: Vec<CoreReport>,
    /// Wired-AND arrival count seen at each core's clock start, in start
    /// order.
    pub clock_start_arrivals: Vec<usize>,
}

impl ChipRun {
    /// Iterates over the receipts of cores that succeeded.
    pub fn receipts(&self) -> impl Iterator<Item = &Receipt> + '_ {
        self.reports.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    /// Iterates over the cores that failed and their errors.
    pub fn failures(&self) -> impl Iterator<Item = (CoreId, &Error)> + '_ {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.core, e)))
    }

    /// Returns whether every core published.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_ok())
    }
}

/// Runs one thread per participating core and waits for all of them.
///
/// Returns once every core has finished, so `region` is complete (or
/// final) when this returns.
pub fn run_chip(config: &ChipConfig, region: &SharedRegion) -> Result<ChipRun, SimError> {
    config.topology.validate()?;
    let topology = config.topology;
    let cores: Vec<CoreId> = topology
        .participants()
        .map(|c| topology.core_id_of(c))
        .collect();
    let line = WiredAndLine::new(cores.len());
    log::info!("running simulated chip with {} cores", cores.len());

    let reports = thread::scope(|s| {
        let mut handles = Vec::with_capacity(cores.len());
        for &id in &cores {
            let line = &line;
            let handle = thread::Builder::new()
                .name(format!("core-{:#05x}", id.0))
                .spawn_scoped(s, move || {
                    let mut core = SimCore::new(id, line, config);
                    let mut workload = config.workload;
                    let outcome = node::run(&mut core, &config.topology, region, &mut workload);
                    if let Err(e) = &outcome {
                        log::error!("{id:?}: {e}");
                    }
                    core.into_report(outcome)
                })?;
            handles.push((id, handle));
        }
        handles
            .into_iter()
            .map(|(id, h)| h.join().map_err(|_| SimError::CorePanicked(id)))
            .collect::<Result<Vec<_>, _>>()
    })?;

    log::info!(
        "simulated chip finished: {}/{} slots published",
        region.published_count(),
        cores.len()
    );
    Ok(ChipRun {
        reports,
        clock_start_arrivals: line.arrivals_at_clock_starts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_fires_on_last_arrival() {
        let line = WiredAndLine::new(2);
        line.signal();
        assert!(!line.has_fired());
        line.signal();
        assert!(line.has_fired());
        assert_eq!(line.arrivals(), 2);
        assert_eq!(line.wait(Duration::from_millis(1)), Some(2));
    }

    #[test]
    fn wait_times_out_when_someone_is_missing() {
        let line = WiredAndLine::new(2);
        line.signal();
        assert_eq!(line.wait(Duration::from_millis(5)), None);
    }

    #[test]
    fn masked_core_stalls() {
        let line = WiredAndLine::new(1);
        let config = ChipConfig {
            idle_timeout: Duration::from_millis(5),
            ..ChipConfig::deterministic()
        };
        let mut core = SimCore::new(CoreId(0x808), &line, &config);
        core.signal();
        core.idle();
        let report = core.into_report(Err(Error::HardwareAbsent("test")));
        assert!(report.stalled);
        assert_eq!(report.irqs_taken, 0);
        assert_eq!(report.status, WAND_LINE.bit(), "status latches even when masked");
    }

    #[test]
    fn timer_is_handed_out_once() {
        let line = WiredAndLine::new(1);
        let mut core = SimCore::new(CoreId(0), &line, &ChipConfig::deterministic());
        assert!(core.take_timer().is_some());
        assert!(core.take_timer().is_none());
    }
}
