// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packet timestamps and cycle-to-nanosecond conversion.
//!
//! [`Timestamp`] is the 32-bit, increasing clock value recorded in packets.
//! It is what [`ClockSource::now`](crate::clock::ClockSource::now) returns
//! after converting the countdown timer's raw reading.
//!
//! [`Timebase`] carries the rational conversion factor from timer cycles to
//! nanoseconds (`nanoseconds = cycles * numer / denom`). Collectors use it to
//! place packets from different cores on a common time axis.

use core::fmt;

/// A clock reading in timer cycles, increasing over a run.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// Returns the raw cycle value.
    #[inline]
    #[must_use]
    pub const fn cycles(self) -> u32 {
        self.0
    }

    /// Returns the number of cycles elapsed since `earlier`, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_cycles_since(self, earlier: Self) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Rational conversion factor from timer cycles to nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the cycles-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the cycles-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// A timebase where cycles are already nanoseconds (1:1).
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// A 600 MHz core clock (5/3 ns per cycle).
    pub const MHZ_600: Self = Self { numer: 5, denom: 3 };

    /// Returns the clock frequency in Hz implied by this timebase.
    #[inline]
    #[must_use]
    pub const fn frequency_hz(self) -> u64 {
        if self.numer == 0 {
            return 0;
        }
        1_000_000_000 * self.denom as u64 / self.numer as u64
    }

    /// Converts a cycle count to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to u64::MAX before narrowing"
    )]
    pub const fn cycles_to_nanos(self, cycles: u64) -> u64 {
        if self.denom == 0 {
            return u64::MAX;
        }
        // u64 * u32 / u32 cannot overflow u128.
        let wide = cycles as u128 * self.numer as u128 / self.denom as u128;
        if wide > u64::MAX as u128 {
            u64::MAX
        } else {
            wide as u64
        }
    }

    /// Converts a cycle count to fractional microseconds.
    #[inline]
    #[must_use]
    pub fn cycles_to_micros(self, cycles: u64) -> f64 {
        self.cycles_to_nanos(cycles) as f64 / 1000.0
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}
