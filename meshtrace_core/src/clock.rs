// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Increasing trace clock over a countdown timer.
//!
//! [`ClockSource`] owns a [`CountdownTimer`] and presents it as a clock that
//! increases over the run:
//!
//! ```text
//! now = u32::MAX - raw
//! ```
//!
//! The timer is loaded with its maximum and stopped by [`ClockSource::init`]
//! before the barrier, and started by [`ClockSource::start`] right after it,
//! so every core's clock starts counting at the same moment.
//!
//! A run must finish within one countdown period. Once the raw counter
//! wraps, `now` jumps back and timestamps stop being monotonic; runs that
//! long are not supported.

use crate::hal::CountdownTimer;
use crate::time::Timestamp;

/// Something that produces packet timestamps.
///
/// The packet encoder calls [`now`](Self::now) once when a packet is
/// opened, once per recorded event, and once when it is closed.
pub trait TimestampSource {
    /// Returns the current clock value.
    fn now(&self) -> Timestamp;
}

impl<S: TimestampSource + ?Sized> TimestampSource for &S {
    #[inline]
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Adapts a closure into a [`TimestampSource`].
#[derive(Clone, Copy, Debug)]
pub struct FnClock<F>(pub F);

impl<F: Fn() -> u32> TimestampSource for FnClock<F> {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp((self.0)())
    }
}

/// Lifecycle of a [`ClockSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockState {
    /// Created; the timer is in an unknown state.
    Unset,
    /// Stopped and loaded with the maximum value.
    Initialized,
    /// Counting.
    Running,
}

/// An increasing clock built on a countdown timer.
#[derive(Debug)]
pub struct ClockSource<T> {
    timer: T,
    state: ClockState,
}

impl<T: CountdownTimer> ClockSource<T> {
    /// Wraps `timer`. Call [`init`](Self::init) before use.
    #[must_use]
    pub const fn new(timer: T) -> Self {
        Self {
            timer,
            state: ClockState::Unset,
        }
    }

    /// Stops the timer and loads it with [`CountdownTimer::MAX`].
    pub fn init(&mut self) {
        self.timer.stop();
        self.timer.set(T::MAX);
        self.state = ClockState::Initialized;
        log::debug!("clock initialized at {:#x}", T::MAX);
    }

    /// Starts counting.
    ///
    /// Must follow [`init`](Self::init) and be called once.
    pub fn start(&mut self) {
        debug_assert_eq!(
            self.state,
            ClockState::Initialized,
            "clock started without init or started twice"
        );
        self.timer.start();
        self.state = ClockState::Running;
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ClockState {
        self.state
    }

    /// Returns `u32::MAX - raw`, which increases as the timer counts down.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Timestamp {
        Timestamp(u32::MAX.wrapping_sub(self.timer.get()))
    }

    /// Gives back the wrapped timer.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.timer
    }
}

impl<T: CountdownTimer> TimestampSource for ClockSource<T> {
    #[inline]
    fn now(&self) -> Timestamp {
        Self::now(self)
    }
}
