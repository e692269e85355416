// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware capability contract for platform integrations.
//!
//! The tracing core never touches registers directly. Each target provides
//! the following pieces through the traits in this module:
//!
//! - **Identity**: [`CoreIdentity`] reads the opaque identifier the chip
//!   assigns to the running core. [`Topology`](crate::coord::Topology) splits
//!   it into a row/column coordinate.
//!
//! - **Timer**: [`CountdownTimer`] is a free-running counter that counts
//!   *down* from [`CountdownTimer::MAX`]. [`ClockSource`](crate::clock::ClockSource)
//!   turns it into an increasing clock.
//!
//! - **Interrupts**: [`InterruptController`] covers the global mask, per-line
//!   masks, handler attachment and the status register.
//!
//! - **Wired-AND line**: [`WiredAnd::signal`] asserts this core's input to a
//!   line that only fires once every participant has asserted it.
//!
//! - **Idle**: [`Idle::idle`] enters the low-power wait state until an
//!   unmasked interrupt is taken.
//!
//! [`Platform`] bundles all of them. A simulated chip lives in
//! `meshtrace_sim`; a bare-metal port implements the same traits over MMIO.

use core::fmt;

/// Opaque hardware-assigned core identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CoreId(pub u16);

impl fmt::Debug for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoreId({:#05x})", self.0)
    }
}

/// An interrupt line number. The status register bit for line `n` is `1 << n`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct IrqLine(pub u8);

impl IrqLine {
    /// Returns the status-register bit for this line.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << self.0
    }
}

/// The wired-AND barrier interrupt line.
pub const WAND_LINE: IrqLine = IrqLine(3);

/// An interrupt service routine. Receives the line that fired.
pub type IrqHandler = fn(IrqLine);

/// Reads the identifier of the running core.
pub trait CoreIdentity {
    /// Returns this core's hardware identifier.
    fn core_id(&self) -> CoreId;
}

/// A hardware timer that counts downward.
pub trait CountdownTimer {
    /// Largest countable value; the timer is reset to this before a run.
    const MAX: u32;

    /// Stops counting. The current value is retained.
    fn stop(&mut self);

    /// Loads `value` into the counter.
    fn set(&mut self, value: u32);

    /// Starts counting down from the current value.
    fn start(&mut self);

    /// Returns the current raw (downward) counter value.
    fn get(&self) -> u32;
}

/// Interrupt masking, dispatch and status register access.
pub trait InterruptController {
    /// Masks (`true`) or unmasks (`false`) all interrupts.
    fn set_global_mask(&mut self, masked: bool);

    /// Masks (`true`) or unmasks (`false`) a single line.
    fn set_line_mask(&mut self, line: IrqLine, masked: bool);

    /// Installs `handler` as the service routine for `line`.
    fn attach(&mut self, line: IrqLine, handler: IrqHandler);

    /// Reads the core status register.
    fn read_status(&self) -> u32;

    /// Writes the core status register.
    fn write_status(&mut self, value: u32);
}

/// Access to the chip-wide wired-AND line.
pub trait WiredAnd {
    /// Asserts this core's input to the wired-AND line.
    ///
    /// The line fires on every participant once all of them have asserted.
    fn signal(&mut self);
}

/// Low-power wait.
pub trait Idle {
    /// Waits until an unmasked interrupt is taken.
    ///
    /// The attached handler runs before this returns. If no interrupt ever
    /// arrives, this never returns.
    fn idle(&mut self);
}

/// Everything a core needs from its hardware.
pub trait Platform: CoreIdentity + InterruptController + WiredAnd + Idle {
    /// The countdown timer used as the trace clock.
    type Timer: CountdownTimer;

    /// Hands out the trace timer.
    ///
    /// Returns `None` if the timer is absent or was already taken.
    fn take_timer(&mut self) -> Option<Self::Timer>;
}
