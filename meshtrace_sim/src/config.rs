// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulation knobs.

use std::time::Duration;

use meshtrace_core::coord::Topology;
use meshtrace_core::time::Timebase;
use meshtrace_core::workload::RunningSum;

/// How a simulated countdown timer advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerModel {
    /// Counts host wall-clock time, converted to cycles through `timebase`.
    Wallclock {
        /// Cycles-to-nanoseconds ratio of the simulated timer.
        timebase: Timebase,
    },
    /// Moves down by `step` cycles on every read once started.
    ///
    /// Every core sees the same sequence, which makes runs reproducible.
    Stepped {
        /// Cycles per read.
        step: u32,
    },
}

/// Configuration for [`run_chip`](crate::run_chip).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipConfig {
    /// Mesh geometry; one simulated core per participant.
    pub topology: Topology,
    /// Timer behaviour.
    pub timer: TimerModel,
    /// The job every core runs.
    pub workload: RunningSum,
    /// How long a core idles without an interrupt before giving up.
    ///
    /// Hardware would wait forever; the simulator reports a stuck core
    /// instead of hanging the host.
    pub idle_timeout: Duration,
}

impl ChipConfig {
    /// A 16-core chip with a 600 MHz wall-clock timer and a busy-wait of
    /// one spin per identifier unit, so each core finishes at a different
    /// time.
    #[must_use]
    pub const fn e16() -> Self {
        Self {
            topology: Topology::e16(),
            timer: TimerModel::Wallclock {
                timebase: Timebase::MHZ_600,
            },
            workload: RunningSum::new(RunningSum::DEFAULT_ITERATIONS).with_spin(1),
            idle_timeout: Duration::from_secs(10),
        }
    }

    /// Like [`e16`](Self::e16) but with a stepped timer and no busy-wait.
    #[must_use]
    pub const fn deterministic() -> Self {
        Self {
            topology: Topology::e16(),
            timer: TimerModel::Stepped { step: 1 },
            workload: RunningSum::new(RunningSum::DEFAULT_ITERATIONS),
            idle_timeout: Duration::from_secs(10),
        }
    }

    /// Replaces the workload.
    #[must_use]
    pub const fn with_workload(mut self, workload: RunningSum) -> Self {
        self.workload = workload;
        self
    }

    /// Replaces the timer model.
    #[must_use]
    pub const fn with_timer(mut self, timer: TimerModel) -> Self {
        self.timer = timer;
        self
    }
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self::e16()
    }
}
