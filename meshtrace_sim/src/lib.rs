// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A simulated 16-core mesh chip for hosted runs and tests.
//!
//! Each participating core runs [`meshtrace_core::node::run`] on its own host
//! thread. [`SimCore`] implements the [`Platform`](meshtrace_core::hal::Platform)
//! traits: interrupts and the status register are per-core state, the
//! wired-AND line is a [`Mutex`](std::sync::Mutex) and
//! [`Condvar`](std::sync::Condvar) shared by all cores, and the countdown
//! timer follows a [`TimerModel`].
//!
//! ```no_run
//! use meshtrace_core::region::SharedRegion;
//! use meshtrace_sim::{ChipConfig, run_chip};
//!
//! let region = SharedRegion::new();
//! let run = run_chip(&ChipConfig::e16(), &region).unwrap();
//! assert!(run.all_ok());
//! assert!(region.is_complete());
//! ```

mod chip;
mod config;
mod timer;

pub use chip::{ChipRun, CoreReport, IRQ_LINES, SimCore, WiredAndLine, run_chip};
pub use config::{ChipConfig, TimerModel};
pub use timer::SimTimer;

use meshtrace_core::error::TopologyError;
use meshtrace_core::hal::CoreId;

/// A chip run could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The configured topology is invalid.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// A core thread could not be started.
    #[error("failed to spawn core thread")]
    Spawn(#[from] std::io::Error),
    /// A core thread panicked.
    #[error("core {0:?} panicked")]
    CorePanicked(CoreId),
}
