// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The traced job each core runs between open and close.

use crate::clock::TimestampSource;
use crate::error::PacketError;
use crate::event::TraceEvent;
use crate::hal::CoreId;
use crate::packet::PacketEncoder;

/// A job that records its progress into an open packet.
pub trait Workload {
    /// Runs the job on `core`, recording events into `encoder`.
    ///
    /// The packet is open on entry and must stay open on return.
    fn run<C: TimestampSource>(
        &mut self,
        core: CoreId,
        encoder: &mut PacketEncoder<'_, C>,
    ) -> Result<(), PacketError>;
}

/// Accumulates `0 + 1 + … + i` and records the sum after every step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunningSum {
    /// Number of steps, and of progress events recorded.
    pub iterations: u32,
    /// Busy-wait spins per step, multiplied by the raw core identifier so
    /// that every core finishes at a different time.
    pub spin_per_step: u32,
}

impl RunningSum {
    /// Steps in the standard job.
    pub const DEFAULT_ITERATIONS: u32 = 32;

    /// Creates a job with `iterations` steps and no busy-wait.
    #[must_use]
    pub const fn new(iterations: u32) -> Self {
        Self {
            iterations,
            spin_per_step: 0,
        }
    }

    /// Sets the busy-wait per step.
    #[must_use]
    pub const fn with_spin(mut self, spin_per_step: u32) -> Self {
        self.spin_per_step = spin_per_step;
        self
    }

    /// Returns the value recorded at step `i`.
    #[must_use]
    pub const fn sum_at(i: u32) -> u32 {
        // Triangular numbers; wraps for very long runs.
        (i.wrapping_mul(i.wrapping_add(1))) / 2
    }
}

impl Default for RunningSum {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

impl Workload for RunningSum {
    fn run<C: TimestampSource>(
        &mut self,
        core: CoreId,
        encoder: &mut PacketEncoder<'_, C>,
    ) -> Result<(), PacketError> {
        let spins = self.spin_per_step.saturating_mul(u32::from(core.0));
        let mut sum = 0_u32;
        for i in 0..self.iterations {
            sum = sum.wrapping_add(i);
            for _ in 0..spins {
                core::hint::spin_loop();
            }
            encoder.record_event(&TraceEvent::Progress { value: sum })?;
        }
        log::trace!("{core:?}: running sum finished at {sum}");
        Ok(())
    }
}
