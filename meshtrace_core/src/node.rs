// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-core program.
//!
//! [`run`] is what every participating core executes, start to finish:
//!
//! ```text
//! take timer ─► clock init ─► barrier ─► clock start
//!     ─► open(row, col) ─► Start ─► workload ─► close
//!     ─► slot_index ─► publish
//! ```
//!
//! The packet is built in a local buffer and copied into the shared region
//! only after it is closed, so the region never sees a half-written packet.
//! [`run_and_halt`] wraps [`run`] for bare-metal entry points that must not
//! return.

use crate::barrier::BarrierSync;
use crate::clock::ClockSource;
use crate::coord::{CoreCoordinate, SlotIndex, Topology};
use crate::error::{Error, TopologyError};
use crate::event::TraceEvent;
use crate::hal::{CoreId, Platform};
use crate::packet::{PACKET_SIZE, PacketContext, PacketEncoder};
use crate::region::Publisher;
use crate::workload::Workload;

/// What a core published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// The core's hardware identifier.
    pub core: CoreId,
    /// The coordinate resolved from it.
    pub coord: CoreCoordinate,
    /// The slot the packet went to.
    pub slot: SlotIndex,
    /// The closed packet's context.
    pub context: PacketContext,
}

/// Runs the traced program on one core and publishes its packet.
pub fn run<P, R, W>(
    hw: &mut P,
    topology: &Topology,
    region: &R,
    workload: &mut W,
) -> Result<Receipt, Error>
where
    P: Platform + ?Sized,
    R: Publisher + ?Sized,
    W: Workload + ?Sized,
{
    let core = hw.core_id();
    let coord = topology.coordinates(core);
    let (row, col) = context_fields(coord)?;

    let timer = hw
        .take_timer()
        .ok_or(Error::HardwareAbsent("countdown timer"))?;
    let mut clock = ClockSource::new(timer);
    clock.init();

    BarrierSync::new().rendezvous(hw);
    clock.start();

    let mut buf = [0_u8; PACKET_SIZE];
    let mut encoder = PacketEncoder::new(&mut buf, &clock);
    encoder.open(row, col)?;
    encoder.record_event(&TraceEvent::Start)?;
    workload.run(core, &mut encoder)?;
    let context = encoder.close()?;

    let slot = topology.slot_index(coord)?;
    region.publish(slot, &buf)?;
    log::info!(
        "{core:?} at {coord:?} published {} events to slot {slot}",
        context.events
    );

    Ok(Receipt {
        core,
        coord,
        slot,
        context,
    })
}

/// Runs [`run`] and then parks the core forever.
///
/// Errors are logged; there is nobody to return them to.
pub fn run_and_halt<P, R, W>(hw: &mut P, topology: &Topology, region: &R, workload: &mut W) -> !
where
    P: Platform + ?Sized,
    R: Publisher + ?Sized,
    W: Workload + ?Sized,
{
    if let Err(e) = run(hw, topology, region, workload) {
        log::error!("{:?}: trace run failed: {e}", hw.core_id());
    }
    loop {
        hw.idle();
    }
}

/// Narrows a coordinate to the `u8` context fields.
fn context_fields(coord: CoreCoordinate) -> Result<(u8, u8), TopologyError> {
    match (u8::try_from(coord.row), u8::try_from(coord.col)) {
        (Ok(row), Ok(col)) => Ok((row, col)),
        _ => Err(TopologyError::OutsideRectangle {
            row: coord.row,
            col: coord.col,
        }),
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::clock::tests::StepTimer;
    use crate::error::PublishError;
    use crate::hal::{
        CoreIdentity, CountdownTimer, Idle, InterruptController, IrqHandler, IrqLine, WAND_LINE,
        WiredAnd,
    };
    use crate::time::Timestamp;
    use crate::packet::PacketView;
    use crate::region::SharedRegion;
    use crate::workload::RunningSum;

    /// A single-core platform whose wired-AND fires immediately.
    struct Solo {
        id: CoreId,
        timer: Option<StepTimer>,
        status: u32,
        signals: Cell<u32>,
    }

    impl Solo {
        fn new(id: u16) -> Self {
            Self {
                id: CoreId(id),
                timer: Some(StepTimer::new(2)),
                status: 0,
                signals: Cell::new(0),
            }
        }
    }

    impl CoreIdentity for Solo {
        fn core_id(&self) -> CoreId {
            self.id
        }
    }

    impl InterruptController for Solo {
        fn set_global_mask(&mut self, _masked: bool) {}
        fn set_line_mask(&mut self, _line: IrqLine, _masked: bool) {}
        fn attach(&mut self, _line: IrqLine, _handler: IrqHandler) {}
        fn read_status(&self) -> u32 {
            self.status
        }
        fn write_status(&mut self, value: u32) {
            self.status = value;
        }
    }

    impl WiredAnd for Solo {
        fn signal(&mut self) {
            self.signals.set(self.signals.get() + 1);
            self.status |= crate::hal::WAND_LINE.bit();
        }
    }

    impl Idle for Solo {
        fn idle(&mut self) {}
    }

    impl Platform for Solo {
        type Timer = StepTimer;
        fn take_timer(&mut self) -> Option<StepTimer> {
            self.timer.take()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Stop,
        Set(u32),
        Start,
        Get,
        GlobalMask(bool),
        Attach(IrqLine),
        LineMask(IrqLine, bool),
        Signal,
        Idle,
        WriteStatus(u32),
    }

    type Log = Rc<RefCell<Vec<Step>>>;

    /// A timer that logs every access into the platform's step log.
    struct LoggedTimer {
        log: Log,
        value: Cell<u32>,
        running: bool,
    }

    impl CountdownTimer for LoggedTimer {
        const MAX: u32 = u32::MAX;

        fn stop(&mut self) {
            self.log.borrow_mut().push(Step::Stop);
            self.running = false;
        }

        fn set(&mut self, value: u32) {
            self.log.borrow_mut().push(Step::Set(value));
            self.value.set(value);
        }

        fn start(&mut self) {
            self.log.borrow_mut().push(Step::Start);
            self.running = true;
        }

        fn get(&self) -> u32 {
            self.log.borrow_mut().push(Step::Get);
            let v = self.value.get();
            if self.running {
                self.value.set(v.wrapping_sub(1));
            }
            v
        }
    }

    /// A single-core platform that shares one step log with its timer.
    struct Logged {
        log: Log,
        timer: Option<LoggedTimer>,
        status: u32,
    }

    impl Logged {
        fn new() -> Self {
            let log = Log::default();
            Self {
                timer: Some(LoggedTimer {
                    log: Rc::clone(&log),
                    value: Cell::new(0x55),
                    running: false,
                }),
                log,
                status: 0,
            }
        }

        fn push(&self, step: Step) {
            self.log.borrow_mut().push(step);
        }
    }

    impl CoreIdentity for Logged {
        fn core_id(&self) -> CoreId {
            CoreId(0x808)
        }
    }

    impl InterruptController for Logged {
        fn set_global_mask(&mut self, masked: bool) {
            self.push(Step::GlobalMask(masked));
        }
        fn set_line_mask(&mut self, line: IrqLine, masked: bool) {
            self.push(Step::LineMask(line, masked));
        }
        fn attach(&mut self, line: IrqLine, _handler: IrqHandler) {
            self.push(Step::Attach(line));
        }
        fn read_status(&self) -> u32 {
            self.status
        }
        fn write_status(&mut self, value: u32) {
            self.push(Step::WriteStatus(value));
            self.status = value;
        }
    }

    impl WiredAnd for Logged {
        fn signal(&mut self) {
            self.push(Step::Signal);
        }
    }

    impl Idle for Logged {
        fn idle(&mut self) {
            self.push(Step::Idle);
            self.status |= WAND_LINE.bit();
        }
    }

    impl Platform for Logged {
        type Timer = LoggedTimer;
        fn take_timer(&mut self) -> Option<LoggedTimer> {
            self.timer.take()
        }
    }

    #[test]
    fn clock_starts_only_after_the_barrier_releases() {
        let region = SharedRegion::new();
        let mut hw = Logged::new();
        let receipt = run(&mut hw, &Topology::e16(), &region, &mut RunningSum::default()).unwrap();

        let log = hw.log.borrow();
        let start = log
            .iter()
            .position(|s| *s == Step::Start)
            .expect("clock started");
        assert_eq!(
            log[..=start],
            [
                Step::Stop,
                Step::Set(u32::MAX),
                Step::GlobalMask(false),
                Step::Attach(WAND_LINE),
                Step::LineMask(WAND_LINE, false),
                Step::Signal,
                Step::Idle,
                Step::WriteStatus(0),
                Step::Start,
            ]
        );
        assert_eq!(log.iter().filter(|s| **s == Step::Start).count(), 1);
        assert!(log[start + 1..].iter().all(|s| *s == Step::Get));

        // The first read after start is the first timestamp of the packet.
        assert_eq!(receipt.context.timestamp_begin, Timestamp(0));
    }

    #[test]
    fn publishes_to_the_mapped_slot() {
        let topology = Topology::e16();
        let region = SharedRegion::new();
        // row 33, col 10 -> slot 6
        let mut hw = Solo::new((33 << 6) | 10);
        let receipt = run(&mut hw, &topology, &region, &mut RunningSum::default()).unwrap();

        assert_eq!(receipt.slot, SlotIndex(6));
        assert_eq!(receipt.context.events, 33);
        assert_eq!(hw.signals.get(), 1);
        assert_eq!(hw.status, 0, "barrier status bit cleared");
        assert_eq!(region.published_count(), 1);

        let packet = region.slot(SlotIndex(6)).unwrap();
        let view = PacketView::parse(packet).unwrap();
        assert_eq!(*view.context(), receipt.context);
        assert_eq!((view.context().row, view.context().col), (33, 10));
    }

    #[test]
    fn outside_rectangle_publishes_nothing() {
        let topology = Topology::e16();
        let region = SharedRegion::new();
        let mut hw = Solo::new((31 << 6) | 8);
        let err = run(&mut hw, &topology, &region, &mut RunningSum::default()).unwrap_err();
        assert_eq!(
            err,
            Error::Topology(TopologyError::OutsideRectangle { row: 31, col: 8 })
        );
        assert_eq!(region.published_count(), 0);
    }

    #[test]
    fn missing_timer_is_reported() {
        let region = SharedRegion::new();
        let mut hw = Solo::new(0x808);
        hw.timer = None;
        let err = run(&mut hw, &Topology::e16(), &region, &mut RunningSum::default()).unwrap_err();
        assert_eq!(err, Error::HardwareAbsent("countdown timer"));
    }

    #[test]
    fn second_run_on_same_slot_is_rejected() {
        let region = SharedRegion::new();
        let mut first = Solo::new(0x808);
        let mut second = Solo::new(0x808);
        run(&mut first, &Topology::e16(), &region, &mut RunningSum::default()).unwrap();
        let err = run(&mut second, &Topology::e16(), &region, &mut RunningSum::default())
            .unwrap_err();
        assert_eq!(
            err,
            Error::Publish(PublishError::AlreadyPublished(SlotIndex(0)))
        );
    }

    #[test]
    fn workload_overflow_aborts_before_publishing() {
        let region = SharedRegion::new();
        let mut hw = Solo::new(0x808);
        let err = run(&mut hw, &Topology::e16(), &region, &mut RunningSum::new(500)).unwrap_err();
        assert!(matches!(err, Error::Packet(_)));
        assert!(!region.is_published(SlotIndex(0)));
    }
}
